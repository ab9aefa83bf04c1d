//! Types for the coordinator crate.

use std::time::Duration;

use pool_coordinator_core::constants::{
    LEASE_LIVENESS_WINDOW, NODE_CONTROLLER_IDENTITY, NODE_LEASE_NAMESPACE, POOL_ALIVE_NODE_RATIO,
};
use serde::{Deserialize, Serialize};

/// Kind of write an admission request guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Object creation.
    Create,
    /// Object update.
    Update,
    /// Object deletion, including evictions.
    Delete,
    /// Connect (exec, attach, port-forward).
    Connect,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
        };
        f.write_str(s)
    }
}

/// One pod admission request, stripped of its transport envelope.
#[derive(Debug, Clone)]
pub struct PodAdmissionRequest {
    /// Request UID, echoed back in the response.
    pub uid: String,
    /// The guarded operation.
    pub operation: Operation,
    /// Identity of the caller.
    pub username: String,
    /// Pod as it was before the operation (set for `Update` and `Delete`).
    pub old_object: Option<serde_json::Value>,
    /// Pod as it will be after the operation (set for `Create` and `Update`).
    pub object: Option<serde_json::Value>,
}

/// Classification of an admission outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionCode {
    /// The operation may proceed.
    Accepted,
    /// Policy refuses the operation.
    Forbidden,
    /// The request itself could not be evaluated.
    BadRequest,
}

impl DecisionCode {
    /// HTTP status code reported in the admission result.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Accepted => 202,
            Self::Forbidden => 403,
            Self::BadRequest => 400,
        }
    }
}

/// Outcome of evaluating an admission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the operation may proceed.
    pub allowed: bool,
    /// Human-readable reason.
    pub reason: String,
    /// Outcome classification.
    pub code: DecisionCode,
}

impl Decision {
    /// Allow the operation.
    #[must_use]
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            code: DecisionCode::Accepted,
        }
    }

    /// Refuse the operation on policy grounds.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            code: DecisionCode::Forbidden,
        }
    }

    /// Refuse a request that could not be evaluated.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            code: DecisionCode::BadRequest,
        }
    }
}

/// Encoding of a [`Mutation`] patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchType {
    /// RFC 6902 JSON Patch.
    JsonPatch,
}

/// A structural change to apply to the admitted pod.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// Operations turning the submitted pod into the mutated pod.
    pub patch: json_patch::Patch,
    /// How `patch` is encoded.
    pub patch_type: PatchType,
}

/// Configuration for the coordinator service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Address the webhook server listens on.
    pub listen_addr: String,
    /// Namespace holding node heartbeat leases.
    pub lease_namespace: String,
    /// A lease renewed more recently than this marks its node alive.
    pub lease_liveness_window_seconds: u64,
    /// Minimum fraction of alive nodes for a pool to accept transitions.
    /// Carried for pool-level policies; no decision reads it yet.
    pub pool_alive_ratio: f64,
    /// Identity whose deletions are subject to eviction policy.
    pub node_controller_identity: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            lease_namespace: NODE_LEASE_NAMESPACE.to_string(),
            lease_liveness_window_seconds: LEASE_LIVENESS_WINDOW.as_secs(),
            pool_alive_ratio: POOL_ALIVE_NODE_RATIO,
            node_controller_identity: NODE_CONTROLLER_IDENTITY.to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `LISTEN_ADDR`: webhook listen address
    /// - `LEASE_NAMESPACE`: namespace holding node leases
    /// - `LEASE_LIVENESS_WINDOW_SECONDS`: lease freshness window
    /// - `POOL_ALIVE_RATIO`: pool alive ratio
    /// - `NODE_CONTROLLER_IDENTITY`: identity of the node lifecycle controller
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("LISTEN_ADDR") {
            config.listen_addr = val;
        }
        if let Ok(val) = std::env::var("LEASE_NAMESPACE") {
            config.lease_namespace = val;
        }
        if let Ok(val) = std::env::var("LEASE_LIVENESS_WINDOW_SECONDS") {
            if let Ok(n) = val.parse() {
                config.lease_liveness_window_seconds = n;
            }
        }
        if let Ok(val) = std::env::var("POOL_ALIVE_RATIO") {
            if let Ok(n) = val.parse() {
                config.pool_alive_ratio = n;
            }
        }
        if let Ok(val) = std::env::var("NODE_CONTROLLER_IDENTITY") {
            config.node_controller_identity = val;
        }

        config
    }

    /// The lease liveness window as a `Duration`.
    #[must_use]
    pub fn lease_liveness_window(&self) -> Duration {
        Duration::from_secs(self.lease_liveness_window_seconds)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the liveness window is zero or the pool ratio lies
    /// outside `0.0..=1.0`.
    pub fn validate(&self) -> crate::Result<()> {
        if self.lease_liveness_window_seconds == 0 {
            return Err(crate::CoordinatorError::Config(
                "lease liveness window must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.pool_alive_ratio) {
            return Err(crate::CoordinatorError::Config(format!(
                "pool alive ratio {} is outside 0.0..=1.0",
                self.pool_alive_ratio
            )));
        }
        if self.node_controller_identity.is_empty() {
            return Err(crate::CoordinatorError::Config(
                "node controller identity must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
