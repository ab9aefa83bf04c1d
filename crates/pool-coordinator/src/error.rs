//! Error types for the coordinator crate.

use thiserror::Error;

/// Errors that can occur while looking up or updating cluster objects.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    KubeApi(#[from] kube::Error),

    /// Node not present in the local cache.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Lease not present in the local cache.
    #[error("Lease not found: {0}")]
    LeaseNotFound(String),

    /// An admission payload could not be interpreted as a pod.
    #[error("Invalid pod payload: {0}")]
    InvalidPod(String),

    /// JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object metadata error.
    #[error("Object error: {0}")]
    Core(#[from] pool_coordinator_core::CoreError),

    /// The API server refused a write.
    #[error("Update rejected: {0}")]
    UpdateRejected(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoordinatorError {
    /// Check if this error is retriable.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::KubeApi(_)
                | Self::NodeNotFound(_)
                | Self::LeaseNotFound(_)
                | Self::UpdateRejected(_)
        )
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NodeNotFound(_) | Self::LeaseNotFound(_) => 404,
            Self::UpdateRejected(_) => 409,
            Self::InvalidPod(_) | Self::Serialization(_) | Self::Core(_) | Self::Config(_) => 400,
            Self::KubeApi(_) => 503,
        }
    }
}

/// A specialized Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;
