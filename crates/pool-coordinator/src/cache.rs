//! Local object caches for nodes and leases.
//!
//! Admission decisions and taint reconciliation read cluster state from these
//! caches rather than the API server, keeping request latency independent of
//! control-plane availability. The watch loops keep them current.
//!
//! Entries are stored as `Arc` snapshots: readers get an immutable view and
//! must clone before building any update.

use std::collections::HashMap;
use std::sync::Arc;

use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::Node;
use parking_lot::RwLock;

use crate::{CoordinatorError, Result};

/// Read-only access to nodes by name.
pub trait NodeLookup: Send + Sync {
    /// Get the latest known snapshot of a node.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::NodeNotFound`] if the node is unknown.
    fn get_node(&self, name: &str) -> Result<Arc<Node>>;
}

/// Read-only access to node heartbeat leases by node name.
pub trait LeaseLookup: Send + Sync {
    /// Get the latest known snapshot of a node's lease.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::LeaseNotFound`] if the lease is unknown.
    fn get_lease(&self, node_name: &str) -> Result<Arc<Lease>>;
}

/// A name-keyed cache of Kubernetes objects.
#[derive(Debug)]
pub struct ObjectCache<K> {
    cache: RwLock<HashMap<String, Arc<K>>>,
}

impl<K> Default for ObjectCache<K> {
    fn default() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }
}

impl<K> ObjectCache<K> {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the snapshot stored under `name`, if cached.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<K>> {
        self.cache.read().get(name).cloned()
    }

    /// Insert or replace an object, returning the previous snapshot.
    pub fn insert(&self, name: impl Into<String>, object: K) -> Option<Arc<K>> {
        self.cache.write().insert(name.into(), Arc::new(object))
    }

    /// Remove an object from the cache.
    pub fn remove(&self, name: &str) -> Option<Arc<K>> {
        self.cache.write().remove(name)
    }

    /// Check if an object is cached.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.cache.read().contains_key(name)
    }

    /// Get the number of cached objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Replace the whole content with a fresh listing.
    pub fn replace_all(&self, objects: impl IntoIterator<Item = (String, K)>) {
        let fresh = objects
            .into_iter()
            .map(|(name, object)| (name, Arc::new(object)))
            .collect();
        *self.cache.write() = fresh;
    }

    /// Get all cached names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.cache.read().keys().cloned().collect()
    }
}

/// Cache of `Node` objects.
pub type NodeCache = ObjectCache<Node>;

/// Cache of node heartbeat `Lease` objects.
pub type LeaseCache = ObjectCache<Lease>;

impl NodeLookup for NodeCache {
    fn get_node(&self, name: &str) -> Result<Arc<Node>> {
        self.get(name)
            .ok_or_else(|| CoordinatorError::NodeNotFound(name.to_string()))
    }
}

impl LeaseLookup for LeaseCache {
    fn get_lease(&self, node_name: &str) -> Result<Arc<Lease>> {
        self.get(node_name)
            .ok_or_else(|| CoordinatorError::LeaseNotFound(node_name.to_string()))
    }
}
