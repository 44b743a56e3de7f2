//! Cloud boundary error types

use thiserror::Error;

/// Errors surfaced by a cloud backend.
///
/// `NotFound` doubles as the "not yet visible" signal of eventually
/// consistent APIs: a resource described immediately after creation may
/// legitimately produce it, which is why it is the retryable class.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} {id} is not yet {want}")]
    NotReady {
        kind: &'static str,
        id: String,
        want: &'static str,
    },

    #[error("{operation} failed for {resource}: {message}")]
    Api {
        operation: &'static str,
        resource: String,
        message: String,
    },

    #[error("timed out waiting for {0}")]
    Timeout(String),
}

impl CloudError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CloudError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn not_ready(kind: &'static str, id: impl Into<String>, want: &'static str) -> Self {
        CloudError::NotReady {
            kind,
            id: id.into(),
            want,
        }
    }

    pub fn api(
        operation: &'static str,
        resource: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CloudError::Api {
            operation,
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound { .. })
    }

    /// Whether the retry harness should try again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CloudError::NotFound { .. } | CloudError::NotReady { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
