//! Hysteresis over delegated lease renewals.
//!
//! A node whose lease is renewed by a heartbeat proxy is still running but
//! cannot reach the API server itself. One delegated renewal is not enough to
//! act on: the tracker counts consecutive delegated renewals per node and only
//! reports a transition once the count reaches the threshold, and again when a
//! direct renewal arrives after that.
//!
//! # Example
//!
//! ```
//! use pool_coordinator_core::{DelegationTracker, Transition};
//!
//! let tracker = DelegationTracker::new();
//! for _ in 0..3 {
//!     assert_eq!(tracker.observe("edge-1", true), None);
//! }
//! assert_eq!(tracker.observe("edge-1", true), Some(Transition::Delegated));
//! assert_eq!(tracker.observe("edge-1", true), None);
//! assert_eq!(tracker.observe("edge-1", false), Some(Transition::Restored));
//! ```

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::constants::LEASE_DELEGATION_THRESHOLD;

/// Reachability change reported by [`DelegationTracker::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The node has only been heard from through a delegate for `threshold`
    /// consecutive renewals.
    Delegated,
    /// The node renewed its own lease after having been delegated.
    Restored,
}

/// Per-node saturating counters of consecutive delegated renewals.
#[derive(Debug)]
pub struct DelegationTracker {
    threshold: u32,
    counters: Mutex<HashMap<String, u32>>,
}

impl Default for DelegationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DelegationTracker {
    /// Create a tracker using [`LEASE_DELEGATION_THRESHOLD`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_threshold(LEASE_DELEGATION_THRESHOLD)
    }

    /// Create a tracker with a custom threshold (at least 1).
    #[must_use]
    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// The configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Record one lease renewal for `node`.
    ///
    /// Returns a transition only on the renewal that crosses the threshold
    /// upwards, or on the first direct renewal after it was reached.
    pub fn observe(&self, node: &str, delegated: bool) -> Option<Transition> {
        let mut counters = self.counters.lock();
        let counter = counters.entry(node.to_string()).or_insert(0);
        let prior = *counter;

        if delegated {
            if prior >= self.threshold {
                return None;
            }
            *counter = prior + 1;
            (*counter == self.threshold).then_some(Transition::Delegated)
        } else {
            *counter = 0;
            (prior >= self.threshold).then_some(Transition::Restored)
        }
    }

    /// Current counter for `node`, if it has been observed.
    #[must_use]
    pub fn counter(&self, node: &str) -> Option<u32> {
        self.counters.lock().get(node).copied()
    }

    /// Whether `node` has reached the threshold.
    #[must_use]
    pub fn is_delegated(&self, node: &str) -> bool {
        self.counter(node).is_some_and(|c| c >= self.threshold)
    }

    /// Drop the counter for a node that left the cluster.
    pub fn forget(&self, node: &str) -> Option<u32> {
        self.counters.lock().remove(node)
    }

    /// Number of nodes with a counter.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.lock().len()
    }

    /// Whether no node has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.lock().is_empty()
    }
}
