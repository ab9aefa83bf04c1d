//! Common error types for the pool coordinator.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while interpreting node, lease and pod metadata.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The pod availability annotation holds a value we do not recognize.
    #[error("unknown pod availability value: {0:?}")]
    UnknownAvailability(String),

    /// An object carries no `metadata.name`.
    #[error("{0} has no name")]
    MissingName(&'static str),
}
