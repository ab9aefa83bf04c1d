//! Kubernetes write access.
//!
//! This module provides the [`NodeUpdater`] trait through which the taint
//! reconciler submits node changes, and the [`KubeNodeUpdater`] that sends
//! them to the API server.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, PostParams};
use kube::Client;
use tracing::debug;

use pool_coordinator_core::node::node_name;

use crate::Result;

/// Submits updated node objects to the cluster.
#[async_trait]
pub trait NodeUpdater: Send + Sync {
    /// Replace a node with the given object.
    ///
    /// # Errors
    ///
    /// Returns an error if the node has no name or the update is rejected.
    async fn update_node(&self, node: Node) -> Result<()>;
}

/// Node updater backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeNodeUpdater {
    client: Client,
}

impl KubeNodeUpdater {
    /// Create an updater using the given client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn nodes_api(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }
}

#[async_trait]
impl NodeUpdater for KubeNodeUpdater {
    async fn update_node(&self, node: Node) -> Result<()> {
        let name = node_name(&node)?.to_string();
        self.nodes_api()
            .replace(&name, &PostParams::default(), &node)
            .await?;
        debug!(node = %name, "Replaced node");
        Ok(())
    }
}

/// An in-memory node store for testing without a real Kubernetes cluster.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::cache::{NodeCache, NodeLookup};
    use crate::CoordinatorError;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// A node store that serves lookups and applies updates in memory.
    ///
    /// Updates are written back into the shared [`NodeCache`], standing in
    /// for the watch event the API server would send.
    #[derive(Default)]
    pub struct MockNodeApi {
        nodes: Arc<NodeCache>,
        updates: Mutex<Vec<Node>>,
        fail_updates: Mutex<bool>,
    }

    impl MockNodeApi {
        /// Create a mock over a fresh cache.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a mock writing into an existing cache.
        #[must_use]
        pub fn with_cache(nodes: Arc<NodeCache>) -> Self {
            Self {
                nodes,
                ..Default::default()
            }
        }

        /// Seed a node.
        pub fn insert(&self, node: Node) {
            let name = node.metadata.name.clone().unwrap_or_default();
            self.nodes.insert(name, node);
        }

        /// Make every following update fail.
        pub fn set_fail_updates(&self, fail: bool) {
            *self.fail_updates.lock() = fail;
        }

        /// Number of updates submitted so far.
        #[must_use]
        pub fn update_count(&self) -> usize {
            self.updates.lock().len()
        }

        /// Every node object submitted, in order.
        #[must_use]
        pub fn updates(&self) -> Vec<Node> {
            self.updates.lock().clone()
        }

        /// The cache this mock reads from and writes to.
        #[must_use]
        pub fn cache(&self) -> Arc<NodeCache> {
            Arc::clone(&self.nodes)
        }
    }

    impl NodeLookup for MockNodeApi {
        fn get_node(&self, name: &str) -> Result<Arc<Node>> {
            self.nodes.get_node(name)
        }
    }

    #[async_trait]
    impl NodeUpdater for MockNodeApi {
        async fn update_node(&self, node: Node) -> Result<()> {
            if *self.fail_updates.lock() {
                return Err(CoordinatorError::UpdateRejected(node_name(&node)?.to_string()));
            }
            let name = node_name(&node)?.to_string();
            self.updates.lock().push(node.clone());
            self.nodes.insert(name, node);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockNodeApi;
    use super::*;
    use crate::cache::NodeLookup;
    use crate::CoordinatorError;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn node(name: &str) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn mock_applies_updates() {
        let api = MockNodeApi::new();
        api.insert(node("n1"));

        let mut updated = node("n1");
        updated.metadata.resource_version = Some("7".to_string());
        api.update_node(updated).await.unwrap();

        assert_eq!(api.update_count(), 1);
        assert_eq!(
            api.get_node("n1").unwrap().metadata.resource_version.as_deref(),
            Some("7")
        );
    }

    #[tokio::test]
    async fn mock_rejects_unnamed_nodes() {
        let api = MockNodeApi::new();
        assert!(api.update_node(Node::default()).await.is_err());
        assert_eq!(api.update_count(), 0);
    }

    #[tokio::test]
    async fn mock_failure_switch() {
        let api = MockNodeApi::new();
        api.insert(node("n1"));
        api.set_fail_updates(true);

        let err = api.update_node(node("n1")).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::UpdateRejected(ref name) if name == "n1"));
        assert!(err.is_retriable());
        assert_eq!(api.update_count(), 0);
    }
}
