//! The coordinator owns all in-memory state and dispatches typed watch events.
//!
//! Node events keep the node cache and nodepool index current. Lease events
//! keep the lease cache current and feed the delegation tracker, whose
//! transitions are applied to the node's taints.
//!
//! Nothing here is durable: after a restart the watch snapshots rebuild every
//! cache, index and counter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::Node;
use pool_coordinator_core::lease::{lease_is_alive, lease_is_delegated};
use pool_coordinator_core::node::node_pool;
use pool_coordinator_core::{DelegationTracker, NodePoolIndex};
use tracing::{debug, info, warn};

use crate::admission::AdmissionEngine;
use crate::cache::{LeaseCache, NodeCache};
use crate::k8s::NodeUpdater;
use crate::reconciler::TaintReconciler;
use crate::types::CoordinatorConfig;

/// A change to a node.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// A node appeared.
    Added(Node),
    /// A known node changed.
    Updated {
        /// The previously cached snapshot.
        old: Arc<Node>,
        /// The new object.
        new: Node,
    },
    /// A node was removed.
    Deleted(Node),
}

/// A change to a node heartbeat lease.
#[derive(Debug, Clone)]
pub enum LeaseEvent {
    /// A lease appeared.
    Added(Lease),
    /// A lease was renewed or otherwise changed.
    Updated {
        /// The previously cached snapshot.
        old: Arc<Lease>,
        /// The new object.
        new: Lease,
    },
    /// A lease was removed.
    Deleted(Lease),
}

/// Coordinates node taints, pool membership and admission decisions.
pub struct Coordinator {
    config: CoordinatorConfig,
    tracker: DelegationTracker,
    pools: NodePoolIndex,
    nodes: Arc<NodeCache>,
    leases: Arc<LeaseCache>,
    reconciler: TaintReconciler,
    admission: AdmissionEngine,
}

impl Coordinator {
    /// Create a coordinator with empty caches, writing nodes through `updater`.
    #[must_use]
    pub fn new(config: CoordinatorConfig, updater: Arc<dyn NodeUpdater>) -> Self {
        Self::with_caches(
            config,
            Arc::new(NodeCache::new()),
            Arc::new(LeaseCache::new()),
            updater,
        )
    }

    /// Create a coordinator over existing caches.
    #[must_use]
    pub fn with_caches(
        config: CoordinatorConfig,
        nodes: Arc<NodeCache>,
        leases: Arc<LeaseCache>,
        updater: Arc<dyn NodeUpdater>,
    ) -> Self {
        let reconciler = TaintReconciler::new(nodes.clone(), updater);
        let admission = AdmissionEngine::new(nodes.clone(), leases.clone(), &config);
        Self {
            config,
            tracker: DelegationTracker::new(),
            pools: NodePoolIndex::new(),
            nodes,
            leases,
            reconciler,
            admission,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// The admission engine reading this coordinator's caches.
    #[must_use]
    pub fn admission(&self) -> &AdmissionEngine {
        &self.admission
    }

    /// The delegation tracker.
    #[must_use]
    pub fn tracker(&self) -> &DelegationTracker {
        &self.tracker
    }

    /// The nodepool index.
    #[must_use]
    pub fn pools(&self) -> &NodePoolIndex {
        &self.pools
    }

    /// The node cache.
    #[must_use]
    pub fn node_cache(&self) -> &Arc<NodeCache> {
        &self.nodes
    }

    /// The lease cache.
    #[must_use]
    pub fn lease_cache(&self) -> &Arc<LeaseCache> {
        &self.leases
    }

    /// Apply a node event to the cache and pool index.
    pub fn handle_node_event(&self, event: NodeEvent) {
        match event {
            NodeEvent::Added(node) => {
                let Some(name) = node.metadata.name.clone() else {
                    warn!("Ignoring added node without a name");
                    return;
                };
                if let Some(pool) = node_pool(&node) {
                    debug!(node = %name, pool = %pool, "Node joined pool");
                    self.pools.add(pool, &name);
                }
                self.nodes.insert(name, node);
            }
            NodeEvent::Updated { old, new } => {
                let Some(name) = new.metadata.name.clone() else {
                    warn!("Ignoring updated node without a name");
                    return;
                };
                let old_pool = node_pool(&old);
                let new_pool = node_pool(&new);
                if old_pool != new_pool {
                    if let Some(pool) = old_pool {
                        self.pools.del(pool, &name);
                    }
                    if let Some(pool) = new_pool {
                        self.pools.add(pool, &name);
                    }
                    info!(
                        node = %name,
                        from = old_pool.unwrap_or("<none>"),
                        to = new_pool.unwrap_or("<none>"),
                        "Node changed pool"
                    );
                }
                self.nodes.insert(name, new);
            }
            NodeEvent::Deleted(node) => {
                let Some(name) = node.metadata.name.as_deref() else {
                    warn!("Ignoring deleted node without a name");
                    return;
                };
                // The cached copy carries the pool the index knows about.
                let cached = self.nodes.remove(name);
                let pool = cached
                    .as_deref()
                    .and_then(node_pool)
                    .or_else(|| node_pool(&node));
                if let Some(pool) = pool {
                    self.pools.del(pool, name);
                }
                self.tracker.forget(name);
                debug!(node = %name, "Node removed");
            }
        }
    }

    /// Apply a lease event, reconciling the node's taint on a transition.
    pub async fn handle_lease_event(&self, event: LeaseEvent) {
        match event {
            LeaseEvent::Added(lease) | LeaseEvent::Updated { new: lease, .. } => {
                let Some(name) = lease.metadata.name.clone() else {
                    warn!("Ignoring lease without a name");
                    return;
                };
                let delegated = lease_is_delegated(&lease);
                self.leases.insert(name.clone(), lease);
                self.observe(&name, delegated).await;
            }
            LeaseEvent::Deleted(lease) => {
                if let Some(name) = lease.metadata.name.as_deref() {
                    self.leases.remove(name);
                    debug!(node = %name, "Lease removed");
                }
            }
        }
    }

    /// Replace the node cache and pool index with a full listing.
    pub fn sync_nodes(&self, nodes: Vec<Node>) {
        self.pools.sync(&nodes);
        let count = nodes.len();
        self.nodes.replace_all(
            nodes
                .into_iter()
                .filter_map(|node| node.metadata.name.clone().map(|name| (name, node))),
        );
        info!(
            nodes = count,
            pools = self.pools.pools().len(),
            "Synced node snapshot"
        );
    }

    /// Replace the lease cache with a full listing and observe every lease.
    pub async fn sync_leases(&self, leases: Vec<Lease>) {
        let observations: Vec<(String, bool)> = leases
            .iter()
            .filter_map(|lease| {
                lease
                    .metadata
                    .name
                    .clone()
                    .map(|name| (name, lease_is_delegated(lease)))
            })
            .collect();

        self.leases.replace_all(
            leases
                .into_iter()
                .filter_map(|lease| lease.metadata.name.clone().map(|name| (name, lease))),
        );
        info!(leases = observations.len(), "Synced lease snapshot");

        for (name, delegated) in observations {
            self.observe(&name, delegated).await;
        }
    }

    /// Nodes in `pool` whose lease is within the liveness window at `now`.
    #[must_use]
    pub fn alive_nodes_in_pool(&self, pool: &str, now: DateTime<Utc>) -> usize {
        let window = self.config.lease_liveness_window();
        self.pools
            .nodes(pool)
            .iter()
            .filter_map(|name| self.leases.get(name))
            .filter(|lease| lease_is_alive(lease, now, window))
            .count()
    }

    async fn observe(&self, node: &str, delegated: bool) {
        let Some(transition) = self.tracker.observe(node, delegated) else {
            return;
        };
        info!(node = %node, transition = ?transition, "Node reachability changed");
        self.reconciler.apply(node, transition).await;
    }
}
