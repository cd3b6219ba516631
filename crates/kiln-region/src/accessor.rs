//! Pre-bound, typed slot accessors.
//!
//! A [`SlotAccessor`] fixes a slot index and an expected type once, at
//! build time. Runtime code then reads through it as often as it likes
//! without re-resolving anything.
//!
//! Slot indices are relative to the assembly that handed them out, so an
//! accessor also records that assembly's [`AssemblyId`]. When an assembly
//! is absorbed into another its slots are renumbered; regions built from
//! the absorbing assembly keep the renumbering table and translate
//! accessors bound before the merge.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;
use kiln_core::{AssemblyId, SlotIndex};

use crate::error::RegionError;
use crate::region::Region;

/// Where the slots of a region came from.
///
/// `absorbed` maps every assembly merged into `id` (directly or through
/// another merge) to the new index of each of its old slots.
#[derive(Clone, Debug)]
pub(crate) struct SlotOrigin {
    pub(crate) id: AssemblyId,
    pub(crate) absorbed: Arc<IndexMap<AssemblyId, Arc<[SlotIndex]>>>,
}

impl SlotOrigin {
    pub(crate) fn new(id: AssemblyId) -> Self {
        Self {
            id,
            absorbed: Arc::default(),
        }
    }

    /// Translate `slot`, as handed out by `assembly`, into this origin.
    pub(crate) fn translate(
        &self,
        assembly: AssemblyId,
        slot: SlotIndex,
    ) -> Result<SlotIndex, RegionError> {
        if assembly == self.id {
            return Ok(slot);
        }
        let table = self
            .absorbed
            .get(&assembly)
            .ok_or(RegionError::ForeignAccessor { slot, assembly })?;
        table
            .get(slot.index())
            .copied()
            .ok_or(RegionError::SlotOutOfRange {
                slot,
                len: table.len() as u32,
            })
    }
}

/// Typed getter bound to one slot.
///
/// Obtained from [`RegionAssembly::accessor`](crate::RegionAssembly::accessor),
/// which checks that the slot was reserved. The accessor stays valid when
/// its assembly is later absorbed into another one: reads against regions
/// of the absorbing assembly land on the renumbered slot. Reads against a
/// region the assembly never contributed to fail with
/// [`RegionError::ForeignAccessor`].
pub struct SlotAccessor<T> {
    assembly: AssemblyId,
    slot: SlotIndex,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SlotAccessor<T> {
    pub(crate) fn new(assembly: AssemblyId, slot: SlotIndex) -> Self {
        Self {
            assembly,
            slot,
            _marker: PhantomData,
        }
    }

    /// The bound slot, as numbered by the assembly that bound it.
    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    /// The assembly that bound this accessor.
    pub fn assembly(&self) -> AssemblyId {
        self.assembly
    }

    /// The slot this accessor reads in `region`.
    pub fn resolve(&self, region: &Region) -> Result<SlotIndex, RegionError> {
        region.origin().translate(self.assembly, self.slot)
    }
}

impl<T: Any + Send + Sync> SlotAccessor<T> {
    /// Read the bound slot.
    ///
    /// A slot that holds no value is reported as [`RegionError::Empty`],
    /// never conflated with a stored value.
    pub fn get(&self, region: &Region) -> Result<Arc<T>, RegionError> {
        let slot = self.resolve(region)?;
        region
            .get_as::<T>(slot)?
            .ok_or(RegionError::Empty { slot })
    }

    /// Read the bound slot, mapping every failure to `None`.
    pub fn try_get(&self, region: &Region) -> Option<Arc<T>> {
        self.get(region).ok()
    }
}

impl<T> Clone for SlotAccessor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SlotAccessor<T> {}

impl<T> fmt::Debug for SlotAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotAccessor")
            .field("assembly", &self.assembly)
            .field("slot", &self.slot)
            .field("type", &type_name::<T>())
            .finish()
    }
}
