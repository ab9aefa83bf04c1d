//! Nodepool membership index.
//!
//! Maps each pool label value to the set of node names carrying it. The index
//! is fed incrementally from node events; a node moving between pools is
//! handled by the caller as a `del` followed by an `add`, so readers may
//! briefly see it in neither pool.

use std::collections::{HashMap, HashSet};

use k8s_openapi::api::core::v1::Node;
use parking_lot::Mutex;

use crate::node::node_pool;

/// Pool name to node names.
#[derive(Debug, Default)]
pub struct NodePoolIndex {
    pools: Mutex<HashMap<String, HashSet<String>>>,
}

impl NodePoolIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `node` to `pool`. Adding twice is a no-op.
    pub fn add(&self, pool: &str, node: &str) {
        self.pools
            .lock()
            .entry(pool.to_string())
            .or_default()
            .insert(node.to_string());
    }

    /// Remove `node` from `pool`, dropping the pool once it is empty.
    pub fn del(&self, pool: &str, node: &str) {
        let mut pools = self.pools.lock();
        let Some(members) = pools.get_mut(pool) else {
            return;
        };
        members.remove(node);
        if members.is_empty() {
            pools.remove(pool);
        }
    }

    /// Number of nodes in `pool`.
    #[must_use]
    pub fn count(&self, pool: &str) -> usize {
        self.pools.lock().get(pool).map_or(0, HashSet::len)
    }

    /// Nodes in `pool`, in no particular order.
    #[must_use]
    pub fn nodes(&self, pool: &str) -> Vec<String> {
        self.pools
            .lock()
            .get(pool)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of all non-empty pools.
    #[must_use]
    pub fn pools(&self) -> Vec<String> {
        self.pools.lock().keys().cloned().collect()
    }

    /// Rebuild the index from a full node listing.
    ///
    /// Nodes without a pool label or without a name are skipped.
    pub fn sync<'a>(&self, nodes: impl IntoIterator<Item = &'a Node>) {
        let mut rebuilt: HashMap<String, HashSet<String>> = HashMap::new();
        for node in nodes {
            let (Some(pool), Some(name)) = (node_pool(node), node.metadata.name.as_deref()) else {
                continue;
            };
            rebuilt
                .entry(pool.to_string())
                .or_default()
                .insert(name.to_string());
        }
        *self.pools.lock() = rebuilt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::LABEL_NODEPOOL;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    fn node(name: &str, pool: Option<&str>) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: pool.map(|p| BTreeMap::from([(LABEL_NODEPOOL.to_string(), p.to_string())])),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn add_count_del() {
        let index = NodePoolIndex::new();
        index.add("pool1", "node1");
        index.add("pool1", "node2");
        index.add("pool2", "node3");
        index.add("pool2", "node4");
        index.add("pool2", "node5");

        assert_eq!(index.count("pool1"), 2);
        assert_eq!(index.count("pool2"), 3);

        index.del("pool2", "node4");
        assert_eq!(index.count("pool2"), 2);
        assert_eq!(sorted(index.nodes("pool2")), vec!["node3", "node5"]);

        index.del("pool1", "node1");
        index.del("pool1", "node2");
        assert_eq!(index.count("pool1"), 0);
        assert!(index.nodes("pool1").is_empty());
        assert_eq!(index.pools(), vec!["pool2".to_string()]);
    }

    #[test]
    fn add_and_del_are_idempotent() {
        let index = NodePoolIndex::new();
        index.add("pool1", "node1");
        index.add("pool1", "node1");
        assert_eq!(index.nodes("pool1"), vec!["node1".to_string()]);

        index.del("pool1", "node9");
        index.del("missing", "node1");
        assert_eq!(index.count("pool1"), 1);
    }

    #[test]
    fn count_matches_nodes() {
        let index = NodePoolIndex::new();
        let ops: [(bool, &str, &str); 8] = [
            (true, "a", "n1"),
            (true, "a", "n2"),
            (true, "a", "n1"),
            (false, "a", "n3"),
            (true, "b", "n3"),
            (false, "a", "n1"),
            (true, "b", "n3"),
            (false, "b", "n3"),
        ];
        for (add, pool, node) in ops {
            if add {
                index.add(pool, node);
            } else {
                index.del(pool, node);
            }
            for p in ["a", "b"] {
                let nodes = index.nodes(p);
                let unique: HashSet<_> = nodes.iter().collect();
                assert_eq!(index.count(p), nodes.len());
                assert_eq!(unique.len(), nodes.len());
            }
        }
        assert_eq!(index.pools(), vec!["a".to_string()]);
    }

    #[test]
    fn reassignment_moves_node() {
        let index = NodePoolIndex::new();
        index.add("east", "n1");
        index.del("east", "n1");
        index.add("west", "n1");
        assert_eq!(index.count("east"), 0);
        assert_eq!(index.nodes("west"), vec!["n1".to_string()]);
    }

    #[test]
    fn sync_replaces_contents() {
        let index = NodePoolIndex::new();
        index.add("stale", "gone");

        let nodes = vec![
            node("n1", Some("east")),
            node("n2", Some("east")),
            node("n3", Some("west")),
            node("n4", None),
        ];
        index.sync(&nodes);

        assert_eq!(index.count("stale"), 0);
        assert_eq!(sorted(index.nodes("east")), vec!["n1", "n2"]);
        assert_eq!(index.nodes("west"), vec!["n3".to_string()]);
        assert_eq!(sorted(index.pools()), vec!["east", "west"]);
    }
}
