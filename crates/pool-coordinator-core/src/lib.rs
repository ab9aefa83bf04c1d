//! Core types and utilities for the pool coordinator.
//!
//! This crate holds the state that does not depend on a Kubernetes client:
//!
//! - **Delegation tracking**: hysteresis over delegated lease renewals
//! - **Nodepool index**: which nodes belong to which pool
//! - **Object helpers**: reading annotations, labels, taints and tolerations
//!   off `Node`, `Lease` and `Pod` objects
//! - **Constants**: the annotation, label and taint keys shared with edge nodes
//!
//! # Example
//!
//! ```
//! use pool_coordinator_core::NodePoolIndex;
//!
//! let index = NodePoolIndex::new();
//! index.add("hangzhou", "edge-1");
//! index.add("hangzhou", "edge-2");
//! assert_eq!(index.count("hangzhou"), 2);
//!
//! index.del("hangzhou", "edge-1");
//! index.del("hangzhou", "edge-2");
//! assert!(index.pools().is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod constants;
pub mod delegation;
pub mod error;
pub mod lease;
pub mod node;
pub mod nodepool;
pub mod pod;

pub use delegation::{DelegationTracker, Transition};
pub use error::{CoreError, Result};
pub use nodepool::NodePoolIndex;
pub use pod::PodAvailability;
