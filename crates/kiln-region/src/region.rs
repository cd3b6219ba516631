//! The materialized, read-only slot store.
//!
//! A [`Region`] is produced by [`RegionPlan::materialize`](crate::RegionPlan::materialize)
//! and never changes afterwards. It can be shared behind an `Arc` and read
//! from any number of threads without locking.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use kiln_core::{AssemblyId, SlotIndex, SlotValue};

use crate::accessor::SlotOrigin;
use crate::config::RegionLayout;
use crate::error::RegionError;
use crate::guest::Guest;
use crate::registry::ServiceRegistry;

/// Shared handle for concurrent readers.
pub type SharedRegion = Arc<Region>;

// Compile-time assertion: regions can be shared across threads.
const _: () = {
    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send_sync::<Region>();
    }
};

/// Fixed-length store of slot values, filled once by materialization.
///
/// Each slot is either set (`Some`) or was reserved without ever getting a
/// producer (`None`, the "unset" sentinel). Reading an index beyond the
/// reserved length is an error, never a silent `None`.
pub struct Region {
    slots: Box<[Option<SlotValue>]>,
    layout: RegionLayout,
    origin: SlotOrigin,
}

impl Region {
    pub(crate) fn from_slots(
        slots: Vec<Option<SlotValue>>,
        layout: RegionLayout,
        origin: SlotOrigin,
    ) -> Self {
        Self {
            slots: slots.into_boxed_slice(),
            layout,
            origin,
        }
    }

    pub(crate) fn origin(&self) -> &SlotOrigin {
        &self.origin
    }

    /// The assembly this region was materialized from.
    pub fn assembly(&self) -> AssemblyId {
        self.origin.id
    }

    /// Read a slot.
    ///
    /// Returns `Ok(None)` for a reserved slot that never received a value
    /// and `Err(SlotOutOfRange)` for an index that was never reserved.
    pub fn get(&self, slot: SlotIndex) -> Result<Option<&SlotValue>, RegionError> {
        self.slots
            .get(slot.index())
            .map(Option::as_ref)
            .ok_or(RegionError::SlotOutOfRange {
                slot,
                len: self.len() as u32,
            })
    }

    /// Read a slot as a concrete type.
    ///
    /// Same sentinel rules as [`get`](Self::get); a value of another type
    /// is reported as [`RegionError::TypeMismatch`].
    pub fn get_as<T: Any + Send + Sync>(
        &self,
        slot: SlotIndex,
    ) -> Result<Option<Arc<T>>, RegionError> {
        match self.get(slot)? {
            None => Ok(None),
            Some(value) => Arc::clone(value)
                .downcast::<T>()
                .map(Some)
                .map_err(|_| RegionError::TypeMismatch {
                    slot,
                    expected: type_name::<T>(),
                }),
        }
    }

    /// Whether a reserved slot holds a value. `false` for unreserved indices.
    pub fn is_set(&self, slot: SlotIndex) -> bool {
        matches!(self.slots.get(slot.index()), Some(Some(_)))
    }

    /// The guest in slot 0, for guest-bearing regions.
    pub fn guest(&self) -> Option<Arc<Guest>> {
        let slot = self.layout.guest_slot()?;
        self.get_as::<Guest>(slot).ok().flatten()
    }

    /// The service registry, for hosted and guest-bearing regions.
    pub fn registry(&self) -> Option<Arc<ServiceRegistry>> {
        let slot = self.layout.registry_slot()?;
        self.get_as::<ServiceRegistry>(slot).ok().flatten()
    }

    /// Resolve an exported service by key.
    pub fn service<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, RegionError> {
        match self.registry() {
            Some(registry) => registry.resolve::<T>(self, key),
            None => Err(RegionError::UnknownService {
                key: key.to_string(),
            }),
        }
    }

    /// The slot layout this region was built with.
    pub fn layout(&self) -> RegionLayout {
        self.layout
    }

    /// Number of reserved slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the region has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots holding a value.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Wrap this region in an `Arc` for sharing.
    pub fn into_shared(self) -> SharedRegion {
        Arc::new(self)
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("assembly", &self.origin.id)
            .field("layout", &self.layout)
            .field("len", &self.len())
            .field("filled", &self.filled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::slot_value;

    fn sample() -> Region {
        Region::from_slots(
            vec![Some(slot_value(7u32)), None, Some(slot_value("hello"))],
            RegionLayout::Bare,
            SlotOrigin::new(AssemblyId::next()),
        )
    }

    #[test]
    fn get_distinguishes_unset_from_unreserved() {
        let region = sample();
        assert!(region.get(SlotIndex(0)).unwrap().is_some());
        assert!(region.get(SlotIndex(1)).unwrap().is_none());
        assert_eq!(
            region.get(SlotIndex(3)).unwrap_err(),
            RegionError::SlotOutOfRange {
                slot: SlotIndex(3),
                len: 3
            }
        );
    }

    #[test]
    fn get_as_checks_type() {
        let region = sample();
        assert_eq!(*region.get_as::<u32>(SlotIndex(0)).unwrap().unwrap(), 7);
        assert!(matches!(
            region.get_as::<u64>(SlotIndex(0)),
            Err(RegionError::TypeMismatch { .. })
        ));
        assert!(region.get_as::<u32>(SlotIndex(1)).unwrap().is_none());
    }

    #[test]
    fn is_set_and_filled() {
        let region = sample();
        assert!(region.is_set(SlotIndex(0)));
        assert!(!region.is_set(SlotIndex(1)));
        assert!(!region.is_set(SlotIndex(9)));
        assert_eq!(region.filled(), 2);
        assert_eq!(region.len(), 3);
    }

    #[test]
    fn bare_region_has_no_guest_or_registry() {
        let region = sample();
        assert!(region.guest().is_none());
        assert!(region.registry().is_none());
        assert!(matches!(
            region.service::<u32>("x"),
            Err(RegionError::UnknownService { .. })
        ));
    }

    #[test]
    fn shared_region_reads_from_many_threads() {
        let shared = sample().into_shared();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let region = Arc::clone(&shared);
                std::thread::spawn(move || *region.get_as::<u32>(SlotIndex(0)).unwrap().unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 7);
        }
    }
}
