//! Errors raised while configuring, compiling or launching a tree.

use kiln_core::{NodeId, WireletError};
use kiln_region::{GuestError, RegionError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::lifecycle::LifecycleState;

/// Errors from [`ConfigTree`](crate::ConfigTree),
/// [`Image`](crate::Image) and [`Instance`](crate::Instance).
///
/// Every variant is a programming error on the caller's side; none is
/// retried internally and a failed call never leaves a half-applied
/// mutation behind.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// A rename was attempted after one of the lifecycle latches fired.
    #[error("cannot rename '{name}': {}", .state.rename_blocker().unwrap_or("it is locked"))]
    NameLocked {
        /// Current name of the node.
        name: String,
        /// The latch that blocks the rename.
        state: LifecycleState,
    },
    /// The node is frozen. Reported the same way for every mutation.
    #[error("'{name}' is frozen and no longer configurable")]
    NotConfigurable {
        /// Name of the frozen node.
        name: String,
    },
    /// A subtree handed to `link` was already frozen.
    #[error("cannot link '{name}': the subtree is already frozen")]
    SubtreeFrozen {
        /// Name of the subtree root.
        name: String,
    },
    /// A sibling already uses the name.
    #[error("'{parent}' already has a child named '{name}'")]
    DuplicateName {
        /// Name of the parent.
        parent: String,
        /// The colliding name.
        name: String,
    },
    /// The name cannot be used in a path.
    #[error("invalid component name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// The tree would grow deeper than the configured limit.
    #[error("depth {depth} exceeds the maximum of {max}")]
    DepthExceeded {
        /// Depth the new node would have.
        depth: u32,
        /// Configured limit.
        max: u32,
    },
    /// The id does not name a node of this tree.
    #[error("unknown node {node}")]
    UnknownNode {
        /// The unknown id.
        node: NodeId,
    },
    /// The node has no instance slot because it is not source-bearing.
    #[error("'{name}' is not source-bearing and has no instance slot")]
    NoInstanceSlot {
        /// Name of the node.
        name: String,
    },
    /// A region operation failed.
    #[error(transparent)]
    Region(#[from] RegionError),
    /// Wirelets were left unconsumed at freeze time.
    #[error("'{name}': {source}")]
    Wirelet {
        /// Path of the node carrying the wirelets.
        name: String,
        /// The underlying wirelet error.
        source: WireletError,
    },
    /// A guest refused a lifecycle transition.
    #[error(transparent)]
    Guest(#[from] GuestError),
    /// The tree configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
