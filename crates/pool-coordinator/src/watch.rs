//! Watch loops feeding the coordinator.
//!
//! Each loop runs as a single task, so events of one kind are handled in
//! order. A full listing (`Init` .. `InitDone`) is buffered and handed over as
//! a snapshot; afterwards every `Apply` becomes an add or an update depending
//! on whether the object is already cached.

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::Node;
use kube::api::Api;
use kube::runtime::watcher::{self, watcher, Config as WatcherConfig};
use kube::Client;
use tracing::{error, info, warn};

use crate::coordinator::{Coordinator, LeaseEvent, NodeEvent};

/// Watch all nodes until the stream ends.
pub async fn run_node_watcher(client: Client, coordinator: Arc<Coordinator>) {
    let nodes: Api<Node> = Api::all(client);
    let watch = watcher(nodes, WatcherConfig::default());

    futures::pin_mut!(watch);

    info!("Starting node watcher");

    let mut snapshot: Option<Vec<Node>> = None;
    while let Some(event) = watch.next().await {
        match event {
            Ok(event) => apply_node_event(&coordinator, &mut snapshot, event),
            Err(e) => {
                error!(error = %e, "Node watcher error, will retry");
            }
        }
    }

    warn!("Node watcher exited unexpectedly");
}

/// Watch node leases in the configured namespace until the stream ends.
pub async fn run_lease_watcher(client: Client, coordinator: Arc<Coordinator>) {
    let namespace = coordinator.config().lease_namespace.clone();
    let leases: Api<Lease> = Api::namespaced(client, &namespace);
    let watch = watcher(leases, WatcherConfig::default());

    futures::pin_mut!(watch);

    info!(namespace = %namespace, "Starting lease watcher");

    let mut snapshot: Option<Vec<Lease>> = None;
    while let Some(event) = watch.next().await {
        match event {
            Ok(event) => apply_lease_event(&coordinator, &mut snapshot, event).await,
            Err(e) => {
                error!(error = %e, "Lease watcher error, will retry");
            }
        }
    }

    warn!("Lease watcher exited unexpectedly");
}

/// Feed one node watch event to the coordinator.
///
/// `snapshot` holds the listing in progress between `Init` and `InitDone`.
pub fn apply_node_event(
    coordinator: &Coordinator,
    snapshot: &mut Option<Vec<Node>>,
    event: watcher::Event<Node>,
) {
    match event {
        watcher::Event::Init => {
            *snapshot = Some(Vec::new());
        }
        watcher::Event::InitApply(node) => match snapshot.as_mut() {
            Some(buffer) => buffer.push(node),
            None => coordinator.handle_node_event(node_applied(coordinator, node)),
        },
        watcher::Event::InitDone => {
            coordinator.sync_nodes(snapshot.take().unwrap_or_default());
        }
        watcher::Event::Apply(node) => {
            coordinator.handle_node_event(node_applied(coordinator, node));
        }
        watcher::Event::Delete(node) => {
            coordinator.handle_node_event(NodeEvent::Deleted(node));
        }
    }
}

/// Feed one lease watch event to the coordinator.
pub async fn apply_lease_event(
    coordinator: &Coordinator,
    snapshot: &mut Option<Vec<Lease>>,
    event: watcher::Event<Lease>,
) {
    match event {
        watcher::Event::Init => {
            *snapshot = Some(Vec::new());
        }
        watcher::Event::InitApply(lease) => match snapshot.as_mut() {
            Some(buffer) => buffer.push(lease),
            None => {
                let event = lease_applied(coordinator, lease);
                coordinator.handle_lease_event(event).await;
            }
        },
        watcher::Event::InitDone => {
            coordinator
                .sync_leases(snapshot.take().unwrap_or_default())
                .await;
        }
        watcher::Event::Apply(lease) => {
            let event = lease_applied(coordinator, lease);
            coordinator.handle_lease_event(event).await;
        }
        watcher::Event::Delete(lease) => {
            coordinator.handle_lease_event(LeaseEvent::Deleted(lease)).await;
        }
    }
}

fn node_applied(coordinator: &Coordinator, node: Node) -> NodeEvent {
    let cached = node
        .metadata
        .name
        .as_deref()
        .and_then(|name| coordinator.node_cache().get(name));
    match cached {
        Some(old) => NodeEvent::Updated { old, new: node },
        None => NodeEvent::Added(node),
    }
}

fn lease_applied(coordinator: &Coordinator, lease: Lease) -> LeaseEvent {
    let cached = lease
        .metadata
        .name
        .as_deref()
        .and_then(|name| coordinator.lease_cache().get(name));
    match cached {
        Some(old) => LeaseEvent::Updated { old, new: lease },
        None => LeaseEvent::Added(lease),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::mock::MockNodeApi;
    use crate::types::CoordinatorConfig;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use pool_coordinator_core::constants::{ANNOTATION_DELEGATE_HEARTBEAT, LABEL_NODEPOOL};
    use std::collections::BTreeMap;

    fn coordinator() -> Coordinator {
        Coordinator::new(CoordinatorConfig::default(), Arc::new(MockNodeApi::new()))
    }

    fn meta(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn pooled_node(name: &str, pool: &str) -> Node {
        Node {
            metadata: ObjectMeta {
                labels: Some(BTreeMap::from([(LABEL_NODEPOOL.to_string(), pool.to_string())])),
                ..meta(name)
            },
            ..Default::default()
        }
    }

    fn delegated_lease(name: &str) -> Lease {
        Lease {
            metadata: ObjectMeta {
                annotations: Some(BTreeMap::from([(
                    ANNOTATION_DELEGATE_HEARTBEAT.to_string(),
                    "true".to_string(),
                )])),
                ..meta(name)
            },
            spec: None,
        }
    }

    #[test]
    fn node_listing_is_held_until_init_done() {
        let coordinator = coordinator();
        let mut snapshot = None;

        apply_node_event(&coordinator, &mut snapshot, watcher::Event::Init);
        apply_node_event(
            &coordinator,
            &mut snapshot,
            watcher::Event::InitApply(pooled_node("n1", "p1")),
        );
        apply_node_event(
            &coordinator,
            &mut snapshot,
            watcher::Event::InitApply(pooled_node("n2", "p1")),
        );
        assert!(coordinator.node_cache().is_empty());
        assert_eq!(coordinator.pools().count("p1"), 0);
        assert_eq!(snapshot.as_ref().map(Vec::len), Some(2));

        apply_node_event(&coordinator, &mut snapshot, watcher::Event::InitDone);
        assert!(snapshot.is_none());
        assert_eq!(coordinator.node_cache().len(), 2);
        assert_eq!(coordinator.pools().count("p1"), 2);
    }

    #[test]
    fn node_init_apply_without_listing_is_handled_directly() {
        let coordinator = coordinator();
        let mut snapshot = None;

        apply_node_event(
            &coordinator,
            &mut snapshot,
            watcher::Event::InitApply(pooled_node("n1", "p1")),
        );
        assert!(snapshot.is_none());
        assert!(coordinator.node_cache().contains("n1"));
        assert_eq!(coordinator.pools().nodes("p1"), vec!["n1"]);

        apply_node_event(
            &coordinator,
            &mut snapshot,
            watcher::Event::Delete(pooled_node("n1", "p1")),
        );
        assert!(coordinator.node_cache().is_empty());
        assert_eq!(coordinator.pools().count("p1"), 0);
    }

    #[tokio::test]
    async fn lease_listing_is_held_until_init_done() {
        let coordinator = coordinator();
        let mut snapshot = None;

        apply_lease_event(&coordinator, &mut snapshot, watcher::Event::Init).await;
        apply_lease_event(
            &coordinator,
            &mut snapshot,
            watcher::Event::InitApply(delegated_lease("n1")),
        )
        .await;
        assert!(coordinator.lease_cache().is_empty());
        assert_eq!(coordinator.tracker().counter("n1"), None);

        apply_lease_event(&coordinator, &mut snapshot, watcher::Event::InitDone).await;
        assert!(coordinator.lease_cache().contains("n1"));
        assert_eq!(coordinator.tracker().counter("n1"), Some(1));

        apply_lease_event(
            &coordinator,
            &mut snapshot,
            watcher::Event::Apply(delegated_lease("n1")),
        )
        .await;
        assert_eq!(coordinator.tracker().counter("n1"), Some(2));

        apply_lease_event(
            &coordinator,
            &mut snapshot,
            watcher::Event::Delete(delegated_lease("n1")),
        )
        .await;
        assert!(coordinator.lease_cache().is_empty());
    }

    #[test]
    fn apply_classifies_by_cache() {
        let coordinator = coordinator();
        let node = Node {
            metadata: meta("n1"),
            ..Default::default()
        };

        assert!(matches!(
            node_applied(&coordinator, node.clone()),
            NodeEvent::Added(_)
        ));
        coordinator.handle_node_event(NodeEvent::Added(node.clone()));
        assert!(matches!(
            node_applied(&coordinator, node),
            NodeEvent::Updated { .. }
        ));
    }

    #[tokio::test]
    async fn lease_apply_classifies_by_cache() {
        let coordinator = coordinator();
        let lease = Lease {
            metadata: meta("n1"),
            spec: None,
        };

        assert!(matches!(
            lease_applied(&coordinator, lease.clone()),
            LeaseEvent::Added(_)
        ));
        coordinator
            .handle_lease_event(LeaseEvent::Added(lease.clone()))
            .await;
        assert!(matches!(
            lease_applied(&coordinator, lease),
            LeaseEvent::Updated { .. }
        ));
    }
}
