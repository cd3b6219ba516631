//! Error types shared across the Kiln workspace.

use thiserror::Error;

/// Errors from wirelet bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WireletError {
    /// Wirelets were attached but no collaborator consumed them.
    #[error("{count} wirelet(s) never consumed: {}", .types.join(", "))]
    Unconsumed {
        /// Number of unconsumed wirelets.
        count: usize,
        /// Type names of the unconsumed wirelets, in insertion order.
        types: Vec<String>,
    },
}
