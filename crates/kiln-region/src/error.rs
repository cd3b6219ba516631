//! Region-specific error types.

use kiln_core::{AssemblyId, SlotIndex};
use thiserror::Error;

use crate::config::RegionLayout;

/// Errors that can occur while assembling, materializing or reading a region.
///
/// The consistency variants ([`SlotOccupied`](Self::SlotOccupied),
/// [`UnsetSlot`](Self::UnsetSlot), [`SlotOutOfRange`](Self::SlotOutOfRange))
/// indicate a defect in whoever ordered the producers. They abort the
/// materialization that raised them; no partially filled region is ever
/// returned.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegionError {
    /// A slot index that was never reserved.
    #[error("slot {slot} was never reserved (region has {len} slots)")]
    SlotOutOfRange {
        /// The offending slot.
        slot: SlotIndex,
        /// Number of reserved slots.
        len: u32,
    },
    /// A producer needed a slot whose value had not been produced yet.
    #[error("slot {slot} read before it was set, by the producer of slot {requested_by}")]
    UnsetSlot {
        /// The slot that was read too early.
        slot: SlotIndex,
        /// The slot whose producer performed the read.
        requested_by: SlotIndex,
    },
    /// A slot was written twice.
    #[error("slot {slot} is already occupied")]
    SlotOccupied {
        /// The slot written twice.
        slot: SlotIndex,
    },
    /// A typed read found no value in a reserved slot.
    #[error("slot {slot} holds no value")]
    Empty {
        /// The empty slot.
        slot: SlotIndex,
    },
    /// A typed read found a value of another type.
    #[error("slot {slot} does not hold a value of type {expected}")]
    TypeMismatch {
        /// The slot read.
        slot: SlotIndex,
        /// The type the caller asked for.
        expected: &'static str,
    },
    /// A second producer was registered for the same slot.
    #[error("slot {slot} already has a producer")]
    DuplicateProducer {
        /// The slot.
        slot: SlotIndex,
    },
    /// A producer was registered for a slot the layout fills itself.
    #[error("slot {slot} is a well-known slot and cannot take a producer")]
    WellKnownSlot {
        /// The slot.
        slot: SlotIndex,
    },
    /// A producer declared a dependency on its own slot.
    #[error("producer of slot {slot} depends on itself")]
    SelfDependency {
        /// The slot.
        slot: SlotIndex,
    },
    /// The assembly was mutated after it was frozen.
    #[error("region assembly is frozen")]
    Frozen,
    /// The assembly was materialized before it was frozen.
    #[error("region assembly must be frozen before it is materialized")]
    NotFrozen,
    /// The slot budget is used up.
    #[error("region capacity exceeded: at most {capacity} slots")]
    CapacityExceeded {
        /// The configured budget.
        capacity: u32,
    },
    /// Two exports share a service key.
    #[error("service '{key}' is already exported")]
    DuplicateExport {
        /// The contested key.
        key: String,
    },
    /// No service is exported under the key.
    #[error("no service exported as '{key}'")]
    UnknownService {
        /// The requested key.
        key: String,
    },
    /// A producer reported a failure of its own.
    #[error("producer of slot {slot} failed: {reason}")]
    ProducerFailed {
        /// The slot being produced.
        slot: SlotIndex,
        /// The producer's description of the failure.
        reason: String,
    },
    /// One assembly could not be merged into another.
    #[error("cannot absorb region assembly: {reason}")]
    NotAbsorbable {
        /// Why the merge was refused.
        reason: AbsorbRefusal,
    },
    /// The slot budget does not even cover the layout's well-known slots.
    #[error("max_slots ({configured}) is below the {minimum} well-known slots of layout {layout:?}")]
    SlotBudgetTooSmall {
        /// The layout the budget was configured for.
        layout: RegionLayout,
        /// The configured budget.
        configured: u32,
        /// Number of well-known slots in `layout`.
        minimum: u32,
    },
    /// An accessor bound in an assembly that did not contribute to this region.
    #[error("accessor for slot {slot} belongs to assembly {assembly}, not part of this region")]
    ForeignAccessor {
        /// The slot as bound in its assembly.
        slot: SlotIndex,
        /// The assembly that handed the slot out.
        assembly: AssemblyId,
    },
}

/// Why [`RegionAssembly::absorb`](crate::RegionAssembly::absorb) refused a merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum AbsorbRefusal {
    /// The absorbed assembly was already frozen.
    #[error("the absorbed assembly is frozen")]
    Frozen,
    /// Guest-bearing assemblies keep a region of their own.
    #[error("guest-bearing assemblies keep their own region")]
    GuestLayout,
    /// The absorbed assembly exports services but the target has no registry.
    #[error("the target assembly has no service registry")]
    NoRegistry,
}

/// Errors a [`Producer`](crate::Producer) may return.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProducerError {
    /// A region read inside the producer failed.
    #[error(transparent)]
    Region(#[from] RegionError),
    /// The producer asked for a dependency position it did not declare.
    #[error("no dependency at position {position}")]
    MissingDependency {
        /// The requested position.
        position: usize,
    },
    /// The producer failed for a reason of its own.
    #[error("{reason}")]
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl ProducerError {
    /// Shorthand for [`ProducerError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}
