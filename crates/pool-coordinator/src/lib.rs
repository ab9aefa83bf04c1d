//! Edge node coordination for hybrid cloud-edge clusters.
//!
//! Some edge nodes reach the control plane only through a heartbeat proxy
//! that renews their lease on their behalf. This crate keeps scheduling and
//! eviction consistent with that reality:
//!
//! - Nodes whose lease has been renewed by a delegate for several consecutive
//!   renewals get a "not schedulable" taint, removed again once the node
//!   renews its own lease.
//! - Evictions issued by the node lifecycle controller are refused for pods
//!   that should stay put (autonomous nodes, node-bound pods, pool-bound pods
//!   whose node is still alive).
//! - Pods that ask for it get unreachable and not-ready tolerations injected.
//!
//! # Architecture
//!
//! ```text
//!   node watcher ──► Coordinator ──► NodeCache / NodePoolIndex
//!  lease watcher ──►     │       ──► LeaseCache
//!                        │
//!                        ├──► DelegationTracker ──► TaintReconciler ──► API server
//!                        │
//!   webhook ───────► AdmissionEngine (reads caches only)
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature for an in-memory node store:
//!
//! ```ignore
//! use std::sync::Arc;
//! use pool_coordinator::{Coordinator, CoordinatorConfig, MockNodeApi};
//!
//! let api = Arc::new(MockNodeApi::new());
//! let coordinator = Coordinator::with_caches(
//!     CoordinatorConfig::default(),
//!     api.cache(),
//!     Arc::default(),
//!     api.clone(),
//! );
//! assert!(coordinator.node_cache().is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod admission;
pub mod cache;
pub mod coordinator;
pub mod error;
pub mod k8s;
pub mod reconciler;
pub mod types;
pub mod watch;
pub mod webhook;

pub use admission::AdmissionEngine;
pub use cache::{LeaseCache, LeaseLookup, NodeCache, NodeLookup};
pub use coordinator::{Coordinator, LeaseEvent, NodeEvent};
pub use error::{CoordinatorError, Result};
pub use k8s::{KubeNodeUpdater, NodeUpdater};
pub use reconciler::{ReconcileOutcome, TaintReconciler};
pub use types::{CoordinatorConfig, Decision, DecisionCode, Mutation, Operation, PodAdmissionRequest};

#[cfg(any(test, feature = "test-utils"))]
pub use k8s::mock::MockNodeApi;
