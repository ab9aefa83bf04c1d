//! Pod availability annotation and toleration merging.

use std::str::FromStr;

use k8s_openapi::api::core::v1::{Pod, Toleration};

use crate::constants::{
    ANNOTATION_POD_AVAILABLE, POD_AVAILABLE_NODE, POD_AVAILABLE_POOL, POD_AVAILABLE_TOLERATE,
    TAINT_NODE_NOT_READY, TAINT_NODE_UNREACHABLE,
};
use crate::error::CoreError;

/// Value of the pod availability annotation.
///
/// The eviction policy reads `Node` and `Pool`; toleration injection reads
/// `Tolerate`. The two readings share one annotation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodAvailability {
    /// The pod must stay on its node.
    Node,
    /// The pod may only move once its node is really gone.
    Pool,
    /// The pod should tolerate unreachable and not-ready nodes.
    Tolerate,
}

impl FromStr for PodAvailability {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            POD_AVAILABLE_NODE => Ok(Self::Node),
            POD_AVAILABLE_POOL => Ok(Self::Pool),
            POD_AVAILABLE_TOLERATE => Ok(Self::Tolerate),
            other => Err(CoreError::UnknownAvailability(other.to_string())),
        }
    }
}

/// Raw value of the availability annotation on a pod.
#[must_use]
pub fn pod_availability_value(pod: &Pod) -> Option<&str> {
    pod.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_POD_AVAILABLE))
        .map(String::as_str)
}

/// Parsed availability annotation; unknown values read as absent.
#[must_use]
pub fn pod_availability(pod: &Pod) -> Option<PodAvailability> {
    let raw = pod_availability_value(pod)?;
    match raw.parse() {
        Ok(availability) => Some(availability),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring pod availability annotation");
            None
        }
    }
}

/// Node the pod is bound to.
#[must_use]
pub fn pod_node_name(pod: &Pod) -> Option<&str> {
    pod.spec
        .as_ref()
        .and_then(|s| s.node_name.as_deref())
        .filter(|n| !n.is_empty())
}

/// Tolerations that keep a pod bound while its node is unreachable or not ready.
#[must_use]
pub fn edge_tolerations() -> Vec<Toleration> {
    [TAINT_NODE_UNREACHABLE, TAINT_NODE_NOT_READY]
        .into_iter()
        .map(|key| Toleration {
            key: Some(key.to_string()),
            operator: Some("Exists".to_string()),
            effect: Some("NoExecute".to_string()),
            ..Default::default()
        })
        .collect()
}

/// Whether toleration `wide` tolerates everything `narrow` does.
///
/// An empty key with operator `Exists` matches every key, and an empty effect
/// matches every effect. For `NoExecute`, a bounded `tolerationSeconds` only
/// covers an addition bounded by no more than the same number of seconds.
#[must_use]
pub fn toleration_covers(wide: &Toleration, narrow: &Toleration) -> bool {
    if wide == narrow {
        return true;
    }

    let exists = wide.operator.as_deref() == Some("Exists");
    let wide_key = wide.key.as_deref().unwrap_or_default();
    if wide.key != narrow.key && !(exists && wide_key.is_empty()) {
        return false;
    }
    if !exists && wide.value != narrow.value {
        return false;
    }

    let wide_effect = wide.effect.as_deref().unwrap_or_default();
    if !wide_effect.is_empty() && wide.effect != narrow.effect {
        return false;
    }

    if wide_effect == "NoExecute" {
        if let Some(bound) = wide.toleration_seconds {
            return narrow.toleration_seconds.is_some_and(|s| s <= bound);
        }
    }
    true
}

/// Merge `additions` into `existing`.
///
/// An addition already covered by an existing toleration is skipped. Existing
/// tolerations the addition covers are replaced by it in place, so a bounded
/// `NoExecute` toleration gives way to an unbounded one. Returns the merged
/// list and whether it differs from `existing`.
#[must_use]
pub fn merge_tolerations(existing: &[Toleration], additions: &[Toleration]) -> (Vec<Toleration>, bool) {
    let mut merged = existing.to_vec();
    let mut changed = false;

    for add in additions {
        if merged.iter().any(|t| toleration_covers(t, add)) {
            continue;
        }

        let subsumed: Vec<usize> = merged
            .iter()
            .enumerate()
            .filter(|(_, t)| toleration_covers(add, t))
            .map(|(i, _)| i)
            .collect();
        match subsumed.split_first() {
            Some((&first, rest)) => {
                merged[first] = add.clone();
                for &i in rest.iter().rev() {
                    merged.remove(i);
                }
            }
            None => merged.push(add.clone()),
        }
        changed = true;
    }

    (merged, changed)
}
