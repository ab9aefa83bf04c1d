//! Admission decisions for pod deletion and creation.
//!
//! The delete path protects workloads on autonomous or pool-reachable edge
//! nodes from being evicted by the node lifecycle controller while the node is
//! merely cut off from the API server. Ordinary deletions by anyone else pass
//! straight through. Rules are evaluated top-down and the first match wins:
//!
//! 1. anything but a delete is accepted,
//! 2. the prior pod must parse and its node must be known,
//! 3. callers other than the node lifecycle controller are accepted,
//! 4. autonomous nodes keep their pods,
//! 5. pods pinned to their node stay,
//! 6. pods pinned to their pool stay while the node's lease is fresh,
//! 7. everything else is accepted.
//!
//! The create/update path injects unreachable and not-ready tolerations into
//! pods that ask for them.
//!
//! Evaluation is synchronous and reads only the local caches.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use pool_coordinator_core::constants::POD_AVAILABLE_TOLERATE;
use pool_coordinator_core::lease::lease_is_alive;
use pool_coordinator_core::node::node_is_in_autonomy;
use pool_coordinator_core::pod::{
    edge_tolerations, merge_tolerations, pod_availability, pod_availability_value, pod_node_name,
};
use pool_coordinator_core::PodAvailability;
use tracing::{debug, info, warn};

use crate::cache::{LeaseLookup, NodeLookup};
use crate::types::{CoordinatorConfig, Decision, Mutation, Operation, PatchType, PodAdmissionRequest};
use crate::{CoordinatorError, Result};

/// Reason given for operations other than delete on the validate path.
pub const MSG_NON_DELETE: &str = "non-delete operation always accepted";
/// Reason given for deletions not issued by the node lifecycle controller.
pub const MSG_DELETE_BY_OTHERS: &str = "validated pod deletion";
/// Reason given when the node is annotated autonomous.
pub const MSG_NODE_AUTONOMY: &str = "node autonomy annotated, eviction aborted";
/// Reason given when the pod must stay on its node.
pub const MSG_POD_AVAILABLE_NODE: &str = "pod should exist on the specific node, eviction aborted";
/// Reason given when the pod is pool-bound and its node is still alive.
pub const MSG_POOL_NODE_ALIVE: &str = "node is actually alive in a pool, eviction aborted";
/// Reason given when the pod is pool-bound and its node is gone.
pub const MSG_POOL_NODE_NOT_ALIVE: &str = "node is not alive in a pool, eviction approved";
/// Reason given when no eviction rule applies.
pub const MSG_DELETE_VALIDATED: &str = "pod deletion validated";
/// Reason given when a pod does not ask for toleration injection.
pub const MSG_NO_MUTATION: &str = "no need of mutation";
/// Reason given when the pod already tolerates unreachable and not-ready nodes.
pub const MSG_TOLERATIONS_EXIST: &str = "tolerations already existed";
/// Reason given when tolerations were injected.
pub const MSG_TOLERATIONS_INJECTED: &str = "tolerations injected";

/// Evaluates pod admission requests against cached node and lease state.
pub struct AdmissionEngine {
    nodes: Arc<dyn NodeLookup>,
    leases: Arc<dyn LeaseLookup>,
    node_controller_identity: String,
    liveness_window: Duration,
}

impl AdmissionEngine {
    /// Create an engine reading from the given lookups.
    #[must_use]
    pub fn new(
        nodes: Arc<dyn NodeLookup>,
        leases: Arc<dyn LeaseLookup>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            nodes,
            leases,
            node_controller_identity: config.node_controller_identity.clone(),
            liveness_window: config.lease_liveness_window(),
        }
    }

    /// Decide whether a pod deletion or eviction may proceed.
    #[must_use]
    pub fn evaluate_delete(&self, request: &PodAdmissionRequest) -> Decision {
        self.evaluate_delete_at(request, Utc::now())
    }

    /// [`evaluate_delete`](Self::evaluate_delete) with an explicit clock.
    #[must_use]
    pub fn evaluate_delete_at(&self, request: &PodAdmissionRequest, now: DateTime<Utc>) -> Decision {
        if request.operation != Operation::Delete {
            return Decision::allow(MSG_NON_DELETE);
        }

        let pod = match parse_pod(request.old_object.as_ref()) {
            Ok(pod) => pod,
            Err(e) => {
                warn!(uid = %request.uid, error = %e, "Could not parse pod in admission request");
                return Decision::invalid(format!(
                    "could not parse pod in admission review request: {e}"
                ));
            }
        };

        let node_name = pod_node_name(&pod).unwrap_or_default();
        let node = match self.nodes.get_node(node_name) {
            Ok(node) => node,
            Err(e) => {
                warn!(uid = %request.uid, node = %node_name, error = %e, "Could not get node for pod");
                return Decision::invalid(format!("could not get node object: {node_name}"));
            }
        };

        if !self.is_node_controller(&request.username) {
            return Decision::allow(MSG_DELETE_BY_OTHERS);
        }

        if node_is_in_autonomy(&node) {
            info!(uid = %request.uid, node = %node_name, "Eviction refused, node is autonomous");
            return Decision::deny(MSG_NODE_AUTONOMY);
        }

        match pod_availability(&pod) {
            Some(PodAvailability::Node) => {
                info!(uid = %request.uid, node = %node_name, "Eviction refused, pod is node-bound");
                Decision::deny(MSG_POD_AVAILABLE_NODE)
            }
            Some(PodAvailability::Pool) => match self.node_is_alive(node_name, now) {
                Ok(true) => {
                    info!(uid = %request.uid, node = %node_name, "Eviction refused, node lease is fresh");
                    Decision::deny(MSG_POOL_NODE_ALIVE)
                }
                Ok(false) => {
                    info!(uid = %request.uid, node = %node_name, "Eviction approved, node lease expired");
                    Decision::allow(MSG_POOL_NODE_NOT_ALIVE)
                }
                Err(e) => {
                    warn!(uid = %request.uid, node = %node_name, error = %e, "Could not get node lease");
                    Decision::invalid(format!("could not get lease object: {node_name}"))
                }
            },
            Some(PodAvailability::Tolerate) | None => Decision::allow(MSG_DELETE_VALIDATED),
        }
    }

    /// Decide whether a created or updated pod needs tolerations injected.
    ///
    /// Returns the patch to apply, if any, alongside the decision.
    #[must_use]
    pub fn evaluate_mutate(&self, request: &PodAdmissionRequest) -> (Option<Mutation>, Decision) {
        if !matches!(request.operation, Operation::Create | Operation::Update) {
            return (
                None,
                Decision::allow(format!("Operation {} is accepted always", request.operation)),
            );
        }

        let pod = match parse_pod(request.object.as_ref()) {
            Ok(pod) => pod,
            Err(e) => {
                warn!(uid = %request.uid, error = %e, "Could not parse pod in admission request");
                return (
                    None,
                    Decision::invalid(format!(
                        "could not parse pod in admission review request: {e}"
                    )),
                );
            }
        };

        if pod_availability_value(&pod) != Some(POD_AVAILABLE_TOLERATE) {
            return (None, Decision::allow(MSG_NO_MUTATION));
        }

        match tolerations_patch(&pod) {
            Ok(Some(patch)) => {
                debug!(uid = %request.uid, ops = patch.0.len(), "Injecting tolerations");
                (
                    Some(Mutation {
                        patch,
                        patch_type: PatchType::JsonPatch,
                    }),
                    Decision::allow(MSG_TOLERATIONS_INJECTED),
                )
            }
            Ok(None) => (None, Decision::allow(MSG_TOLERATIONS_EXIST)),
            Err(e) => {
                warn!(uid = %request.uid, error = %e, "Could not build toleration patch");
                (
                    None,
                    Decision::invalid(format!("could not merge tolerations: {e}")),
                )
            }
        }
    }

    fn is_node_controller(&self, username: &str) -> bool {
        username.contains(&self.node_controller_identity)
    }

    /// Whether the node's lease was renewed within the liveness window.
    ///
    /// # Errors
    ///
    /// Returns an error if the lease is not cached.
    pub fn node_is_alive(&self, node_name: &str, now: DateTime<Utc>) -> Result<bool> {
        let lease = self.leases.get_lease(node_name)?;
        Ok(lease_is_alive(&lease, now, self.liveness_window))
    }
}

fn parse_pod(raw: Option<&serde_json::Value>) -> Result<Pod> {
    let raw = raw.ok_or_else(|| CoordinatorError::InvalidPod("no pod in request".to_string()))?;
    serde_json::from_value(raw.clone()).map_err(|e| CoordinatorError::InvalidPod(e.to_string()))
}

/// JSON Patch adding the edge tolerations, or `None` if nothing is missing.
fn tolerations_patch(pod: &Pod) -> Result<Option<json_patch::Patch>> {
    let existing = pod
        .spec
        .as_ref()
        .and_then(|s| s.tolerations.as_deref())
        .unwrap_or_default();
    let (merged, changed) = merge_tolerations(existing, &edge_tolerations());
    if !changed {
        return Ok(None);
    }

    let mut mutated = pod.clone();
    mutated.spec.get_or_insert_with(Default::default).tolerations = Some(merged);

    let original = serde_json::to_value(pod)?;
    let mutated = serde_json::to_value(&mutated)?;
    Ok(Some(json_patch::diff(&original, &mutated)))
}
