//! Region configuration and the canonical slot layout.

use kiln_core::SlotIndex;

use crate::error::RegionError;

/// Which well-known slots a region reserves up front.
///
/// There is exactly one numbering convention:
///
/// | Layout   | slot 0            | slot 1            | first user slot |
/// |----------|-------------------|-------------------|-----------------|
/// | `Bare`   | user              | user              | 0               |
/// | `Hosted` | `ServiceRegistry` | user              | 1               |
/// | `Guest`  | `Guest`           | `ServiceRegistry` | 2               |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RegionLayout {
    /// No well-known slots.
    #[default]
    Bare,
    /// Slot 0 holds the service registry.
    Hosted,
    /// Slot 0 holds the guest, slot 1 the service registry.
    Guest,
}

impl RegionLayout {
    /// The slot holding the `Guest`, if this layout has one.
    pub fn guest_slot(self) -> Option<SlotIndex> {
        match self {
            Self::Guest => Some(SlotIndex(0)),
            Self::Bare | Self::Hosted => None,
        }
    }

    /// The slot holding the `ServiceRegistry`, if this layout has one.
    pub fn registry_slot(self) -> Option<SlotIndex> {
        match self {
            Self::Bare => None,
            Self::Hosted => Some(SlotIndex(0)),
            Self::Guest => Some(SlotIndex(1)),
        }
    }

    /// Number of slots reserved before any user reservation.
    pub fn well_known_count(self) -> u32 {
        match self {
            Self::Bare => 0,
            Self::Hosted => 1,
            Self::Guest => 2,
        }
    }

    /// Whether `slot` is one of this layout's well-known slots.
    pub fn is_well_known(self, slot: SlotIndex) -> bool {
        slot.0 < self.well_known_count()
    }
}

/// Configuration for a region assembly.
///
/// Validated when the assembly is created; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionConfig {
    /// Well-known slot convention.
    pub layout: RegionLayout,
    /// Upper bound on reservations, well-known slots included.
    ///
    /// Default: [`RegionConfig::DEFAULT_MAX_SLOTS`].
    pub max_slots: u32,
}

impl RegionConfig {
    /// Default slot budget per region.
    pub const DEFAULT_MAX_SLOTS: u32 = 1 << 20;

    /// Create a config for the given layout with the default slot budget.
    pub fn new(layout: RegionLayout) -> Self {
        Self {
            layout,
            max_slots: Self::DEFAULT_MAX_SLOTS,
        }
    }

    /// Check that the budget covers at least the well-known slots.
    pub fn validate(&self) -> Result<(), RegionError> {
        let minimum = self.layout.well_known_count();
        if self.max_slots < minimum {
            return Err(RegionError::SlotBudgetTooSmall {
                layout: self.layout,
                configured: self.max_slots,
                minimum,
            });
        }
        Ok(())
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self::new(RegionLayout::Bare)
    }
}
