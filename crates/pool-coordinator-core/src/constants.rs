//! Well-known keys, values and tuning constants.
//!
//! These must match what edge nodes, heartbeat proxies and pod authors write
//! into the cluster, so they are reproduced verbatim.

use std::time::Duration;

/// Node annotation marking a node as autonomous while disconnected.
pub const ANNOTATION_NODE_AUTONOMY: &str = "node.beta.openyurt.io/autonomy";

/// Node label carrying the name of the nodepool the node belongs to.
pub const LABEL_NODEPOOL: &str = "apps.openyurt.io/nodepool";

/// Pod annotation describing where the pod must stay available.
pub const ANNOTATION_POD_AVAILABLE: &str = "pod.beta.openyurt.io/available";

/// The pod must stay on its node.
pub const POD_AVAILABLE_NODE: &str = "node";

/// The pod may move, but only within its pool and only once the node is down.
pub const POD_AVAILABLE_POOL: &str = "pool";

/// The pod asks for unreachable/not-ready tolerations to be injected.
pub const POD_AVAILABLE_TOLERATE: &str = "true";

/// Lease annotation set by a heartbeat proxy renewing on behalf of a node.
pub const ANNOTATION_DELEGATE_HEARTBEAT: &str = "openyurt.io/delegate-heartbeat";

/// Value of [`ANNOTATION_DELEGATE_HEARTBEAT`] meaning the renewal was delegated.
pub const DELEGATE_HEARTBEAT_TRUE: &str = "true";

/// Taint placed on nodes that only reach the API server through a delegate.
pub const TAINT_NODE_NOT_SCHEDULABLE: &str = "node.openyurt.io/unschedulable";

/// Consecutive delegated lease renewals before a node is tainted.
pub const LEASE_DELEGATION_THRESHOLD: u32 = 4;

/// A lease renewed more recently than this marks its node as alive.
pub const LEASE_LIVENESS_WINDOW: Duration = Duration::from_secs(40);

/// Below this fraction of alive nodes a pool should stop accepting transitions.
///
/// Not consulted by any decision yet.
pub const POOL_ALIVE_NODE_RATIO: f64 = 0.3;

/// Identity the node lifecycle controller authenticates as.
pub const NODE_CONTROLLER_IDENTITY: &str = "system:serviceaccount:kube-system:node-controller";

/// Namespace holding per-node heartbeat leases.
pub const NODE_LEASE_NAMESPACE: &str = "kube-node-lease";

/// Taint key the node lifecycle controller uses for unreachable nodes.
pub const TAINT_NODE_UNREACHABLE: &str = "node.kubernetes.io/unreachable";

/// Taint key the node lifecycle controller uses for not-ready nodes.
pub const TAINT_NODE_NOT_READY: &str = "node.kubernetes.io/not-ready";
