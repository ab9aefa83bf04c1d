//! Helpers for reading and editing `Node` objects.
//!
//! All functions take borrowed snapshots; edits return new taint lists so
//! callers decide when to copy the node they came from.

use k8s_openapi::api::core::v1::{Node, Taint};

use crate::constants::{ANNOTATION_NODE_AUTONOMY, LABEL_NODEPOOL, TAINT_NODE_NOT_SCHEDULABLE};
use crate::error::{CoreError, Result};

/// Name of the node.
///
/// # Errors
///
/// Returns [`CoreError::MissingName`] if the node has no `metadata.name`.
pub fn node_name(node: &Node) -> Result<&str> {
    node.metadata
        .name
        .as_deref()
        .ok_or(CoreError::MissingName("node"))
}

/// Whether the node is annotated as autonomous.
#[must_use]
pub fn node_is_in_autonomy(node: &Node) -> bool {
    node.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_NODE_AUTONOMY))
        .is_some_and(|v| v == "true")
}

/// The nodepool the node is labelled with, if any.
#[must_use]
pub fn node_pool(node: &Node) -> Option<&str> {
    node.metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(LABEL_NODEPOOL))
        .map(String::as_str)
}

/// Taints currently on the node.
#[must_use]
pub fn node_taints(node: &Node) -> &[Taint] {
    node.spec
        .as_ref()
        .and_then(|s| s.taints.as_deref())
        .unwrap_or_default()
}

/// Whether any taint in `taints` has the given key.
#[must_use]
pub fn taint_key_exists(taints: &[Taint], key: &str) -> bool {
    taints.iter().any(|t| t.key == key)
}

/// Remove every taint with the given key.
///
/// Returns the remaining taints and whether anything was removed.
#[must_use]
pub fn delete_taints_by_key(taints: &[Taint], key: &str) -> (Vec<Taint>, bool) {
    let kept: Vec<Taint> = taints.iter().filter(|t| t.key != key).cloned().collect();
    let deleted = kept.len() != taints.len();
    (kept, deleted)
}

/// The taint placed on nodes only reachable through a delegated heartbeat.
#[must_use]
pub fn not_schedulable_taint() -> Taint {
    Taint {
        key: TAINT_NODE_NOT_SCHEDULABLE.to_string(),
        value: Some("true".to_string()),
        effect: "NoSchedule".to_string(),
        time_added: None,
    }
}
