//! Strongly-typed identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one slot within a region.
///
/// Slots are handed out densely by a region assembly: the first
/// reservation is `SlotIndex(0)`, the next `SlotIndex(1)`, and so on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(pub u32);

impl SlotIndex {
    /// The slot as a `usize`, for indexing into slot storage.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SlotIndex {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a node within one configuration tree (and the image
/// compiled from it).
///
/// Node ids are indices into the tree's node arena. They are only
/// meaningful for the tree that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The node as a `usize`, for indexing into node storage.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a region within one configuration tree.
///
/// The root always owns `RegionId(0)`. Every guest-bearing subtree
/// opens a region of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u32);

impl RegionId {
    /// The region as a `usize`, for indexing into region storage.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RegionId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Counter for unique [`GuestId`] allocation.
static GUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instantiation identifier for a guest.
///
/// Allocated from a monotonic atomic counter via [`GuestId::next`].
/// Two guests launched from the same image always have different ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuestId(u64);

impl GuestId {
    /// Allocate a fresh, unique guest id. Thread-safe.
    pub fn next() -> Self {
        Self(GUEST_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counter for unique [`AssemblyId`] allocation.
static ASSEMBLY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one region assembly.
///
/// Slot indices are only meaningful relative to the assembly that handed
/// them out; accessors carry this id so a region can tell whether (and
/// how) to translate them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssemblyId(u64);

impl AssemblyId {
    /// Allocate a fresh, unique assembly id. Thread-safe.
    pub fn next() -> Self {
        Self(ASSEMBLY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AssemblyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
