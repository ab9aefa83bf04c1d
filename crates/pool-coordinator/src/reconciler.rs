//! Node taint reconciliation.
//!
//! Keeps the reserved "not schedulable" taint on a node exactly while its
//! lease is being renewed by a delegate. Both directions are idempotent and
//! best-effort: a failed lookup or update is logged and dropped, and the node
//! converges on the next transition for it.

use std::sync::Arc;

use pool_coordinator_core::constants::TAINT_NODE_NOT_SCHEDULABLE;
use pool_coordinator_core::node::{
    delete_taints_by_key, node_taints, not_schedulable_taint, taint_key_exists,
};
use pool_coordinator_core::Transition;
use tracing::{debug, error, info};

use crate::cache::NodeLookup;
use crate::k8s::NodeUpdater;

/// What a reconciliation call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// An update was submitted.
    Updated,
    /// The node already had the desired taints.
    Unchanged,
    /// The lookup or update failed and was abandoned.
    Failed,
}

/// Adds and removes the reserved taint on nodes.
pub struct TaintReconciler {
    nodes: Arc<dyn NodeLookup>,
    updater: Arc<dyn NodeUpdater>,
}

impl TaintReconciler {
    /// Create a reconciler reading from `nodes` and writing through `updater`.
    #[must_use]
    pub fn new(nodes: Arc<dyn NodeLookup>, updater: Arc<dyn NodeUpdater>) -> Self {
        Self { nodes, updater }
    }

    /// Apply a delegation transition to its node.
    pub async fn apply(&self, node: &str, transition: Transition) -> ReconcileOutcome {
        match transition {
            Transition::Delegated => self.mark_unschedulable(node).await,
            Transition::Restored => self.mark_schedulable(node).await,
        }
    }

    /// Ensure the node carries the reserved taint.
    pub async fn mark_unschedulable(&self, name: &str) -> ReconcileOutcome {
        let node = match self.nodes.get_node(name) {
            Ok(node) => node,
            Err(e) => {
                error!(node = %name, error = %e, "Failed to look up node for tainting");
                return ReconcileOutcome::Failed;
            }
        };

        if taint_key_exists(node_taints(&node), TAINT_NODE_NOT_SCHEDULABLE) {
            debug!(node = %name, "Node already tainted not schedulable");
            return ReconcileOutcome::Unchanged;
        }

        let mut updated = (*node).clone();
        updated
            .spec
            .get_or_insert_with(Default::default)
            .taints
            .get_or_insert_with(Vec::new)
            .push(not_schedulable_taint());

        self.submit(name, updated, "Tainted node not schedulable")
            .await
    }

    /// Ensure the node carries no reserved taint.
    pub async fn mark_schedulable(&self, name: &str) -> ReconcileOutcome {
        let node = match self.nodes.get_node(name) {
            Ok(node) => node,
            Err(e) => {
                error!(node = %name, error = %e, "Failed to look up node for untainting");
                return ReconcileOutcome::Failed;
            }
        };

        let (remaining, deleted) = delete_taints_by_key(node_taints(&node), TAINT_NODE_NOT_SCHEDULABLE);
        if !deleted {
            debug!(node = %name, "Node carries no not-schedulable taint");
            return ReconcileOutcome::Unchanged;
        }

        let mut updated = (*node).clone();
        updated.spec.get_or_insert_with(Default::default).taints = Some(remaining);

        self.submit(name, updated, "Removed not-schedulable taint from node")
            .await
    }

    async fn submit(
        &self,
        name: &str,
        node: k8s_openapi::api::core::v1::Node,
        success: &str,
    ) -> ReconcileOutcome {
        match self.updater.update_node(node).await {
            Ok(()) => {
                info!(node = %name, "{success}");
                ReconcileOutcome::Updated
            }
            Err(e) => {
                error!(
                    node = %name,
                    error = %e,
                    retriable = e.is_retriable(),
                    "Failed to update node taints"
                );
                ReconcileOutcome::Failed
            }
        }
    }
}
