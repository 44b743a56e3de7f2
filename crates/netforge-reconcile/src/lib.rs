//! netforge reconciliation engine
//!
//! Converges a cloud account's network infrastructure to a declarative
//! [`NetworkSpec`] and tears it down again on deletion. One call to
//! [`NetworkReconciler::reconcile`] is one pass: resources are reconciled
//! in strict dependency order (network → subnets → gateways → routes →
//! security groups), each step is idempotent, and the accumulated result
//! is written into the caller's [`NetworkStatus`].
//!
//! The engine never talks to a cloud SDK directly; it drives any
//! [`NetworkCloud`] implementation. Resources it creates are marked with
//! the cluster ownership tag, and resources it did not create are never
//! mutated or deleted. Supplying an existing network ID in the spec
//! switches the whole engine into discovery-only (unmanaged) mode.

pub mod error;

mod ensure;
mod gateways;
mod network;
mod routes;
mod security_groups;
mod subnets;

pub use error::{ReconcileError, Result};

use netforge_cloud::{BackoffPolicy, NetworkCloud};
use netforge_core::{NetworkSpec, NetworkStatus, SecurityGroupRole};

/// Default API server port used for security group rules.
pub const DEFAULT_API_SERVER_PORT: u16 = 6443;

/// Per-cluster configuration of the engine.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Cluster name, used in ownership tags and resource names.
    pub name: String,

    /// Port the API server listens on.
    pub api_server_port: u16,
}

impl ClusterConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_server_port: DEFAULT_API_SERVER_PORT,
        }
    }

    pub fn with_api_server_port(mut self, port: u16) -> Self {
        self.api_server_port = port;
        self
    }
}

/// Converges one cluster's network infrastructure.
///
/// The reconciler holds no per-pass state of its own: spec and status are
/// supplied by the caller on every invocation, so a single reconciler can
/// be reused across passes. Single-writer access to the spec/status pair
/// is the caller's responsibility.
pub struct NetworkReconciler<C> {
    cloud: C,
    cluster: ClusterConfig,
    /// Schedule for tag visibility retries.
    backoff: BackoffPolicy,
    /// Schedule for resource state waits (network available, NAT
    /// gateway available/deleted).
    wait: BackoffPolicy,
}

impl<C: NetworkCloud> NetworkReconciler<C> {
    pub fn new(cloud: C, cluster: ClusterConfig) -> Self {
        Self {
            cloud,
            cluster,
            backoff: BackoffPolicy::default(),
            wait: BackoffPolicy::slow(),
        }
    }

    /// Override the retry schedules.
    pub fn with_backoff(mut self, backoff: BackoffPolicy, wait: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self.wait = wait;
        self
    }

    pub fn cloud(&self) -> &C {
        &self.cloud
    }

    /// Run one reconciliation pass.
    ///
    /// Safe to re-invoke after a mid-pass failure: every create checks
    /// for an existing resource by stable identity first, so nothing is
    /// double-created.
    pub async fn reconcile(&self, spec: &NetworkSpec, status: &mut NetworkStatus) -> Result<()> {
        self.validate(spec)?;

        self.reconcile_network(spec, status).await?;
        self.reconcile_subnets(spec, status).await?;
        self.reconcile_internet_gateway(spec, status).await?;
        let nat_by_subnet = self.reconcile_nat_gateways(spec, status).await?;
        self.reconcile_route_tables(spec, status, &nat_by_subnet)
            .await?;
        self.reconcile_security_groups(spec, status).await?;

        tracing::info!(cluster = %self.cluster.name, "network reconciliation complete");
        Ok(())
    }

    /// Tear down everything this cluster owns, in reverse dependency
    /// order. A no-op for unmanaged networks. Deletion of an
    /// already-deleted resource counts as success, so the whole call is
    /// idempotent and resumable.
    pub async fn delete(&self, status: &mut NetworkStatus) -> Result<()> {
        if status.network.is_none() {
            tracing::debug!(cluster = %self.cluster.name, "no network recorded, nothing to delete");
            return Ok(());
        }
        if status.is_unmanaged() {
            tracing::debug!(cluster = %self.cluster.name, "unmanaged network, skipping teardown");
            *status = NetworkStatus::default();
            return Ok(());
        }

        self.delete_security_groups(status).await?;
        self.delete_route_tables(status).await?;
        self.delete_nat_gateways(status).await?;
        self.delete_internet_gateways(status).await?;
        self.delete_subnets(status).await?;
        self.delete_network(status).await?;

        tracing::info!(cluster = %self.cluster.name, "network teardown complete");
        Ok(())
    }

    /// Configuration checks that must fail before any mutating call.
    fn validate(&self, spec: &NetworkSpec) -> Result<()> {
        let overrides = &spec.security_group_overrides;
        if !overrides.is_empty() {
            let missing: Vec<&str> = SecurityGroupRole::ALL
                .iter()
                .filter(|role| !overrides.contains_key(*role))
                .map(|role| role.suffix())
                .collect();
            if !missing.is_empty() {
                return Err(ReconcileError::Config(format!(
                    "security group overrides must cover every role, missing: {}",
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }
}
