//! Reconciliation error types

use netforge_cloud::CloudError;
use thiserror::Error;

/// Errors surfaced by one reconciliation or teardown pass.
///
/// Configuration errors are fatal for the pass and must not be retried by
/// the caller without changing the spec; cloud errors carry the failing
/// operation and resource so the outer control loop can decide.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no NAT gateway available in availability zone {zone}")]
    NoNatGatewayInZone { zone: String },

    #[error("teardown incomplete: {}", join_errors(.0))]
    Teardown(Vec<ReconcileError>),
}

fn join_errors(errors: &[ReconcileError]) -> String {
    errors
        .iter()
        .map(|err| err.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ReconcileError {
    pub fn is_config(&self) -> bool {
        matches!(self, ReconcileError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
