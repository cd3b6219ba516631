//! Write-once staging storage used while a region is materialized.

use kiln_core::{SlotIndex, SlotValue};

use crate::accessor::SlotOrigin;
use crate::config::RegionLayout;
use crate::error::RegionError;
use crate::region::Region;

/// Mutable slot storage for a single materialization pass.
///
/// Every slot accepts exactly one write. Consumed by [`finish`](Self::finish),
/// after which the slots can no longer change.
pub(crate) struct RegionWriter {
    slots: Vec<Option<SlotValue>>,
}

impl RegionWriter {
    pub(crate) fn new(len: u32) -> Self {
        Self {
            slots: vec![None; len as usize],
        }
    }

    /// Write a slot. Fails if the slot is unreserved or already holds a value.
    pub(crate) fn set(&mut self, slot: SlotIndex, value: SlotValue) -> Result<(), RegionError> {
        let len = self.slots.len() as u32;
        let entry = self
            .slots
            .get_mut(slot.index())
            .ok_or(RegionError::SlotOutOfRange { slot, len })?;
        if entry.is_some() {
            return Err(RegionError::SlotOccupied { slot });
        }
        *entry = Some(value);
        Ok(())
    }

    pub(crate) fn get(&self, slot: SlotIndex) -> Result<Option<&SlotValue>, RegionError> {
        self.slots
            .get(slot.index())
            .map(Option::as_ref)
            .ok_or(RegionError::SlotOutOfRange {
                slot,
                len: self.slots.len() as u32,
            })
    }

    pub(crate) fn finish(self, layout: RegionLayout, origin: SlotOrigin) -> Region {
        Region::from_slots(self.slots, layout, origin)
    }
}
