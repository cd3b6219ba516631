//! Service registry stored in a region's registry slot.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;
use kiln_core::SlotIndex;

use crate::error::RegionError;
use crate::region::Region;

/// Maps exported service keys to the slots that hold them.
///
/// Built from the assembly's `export` calls and written into the registry
/// slot before any producer runs. Lookups go back through the region, so a
/// registry never holds service values itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceRegistry {
    services: IndexMap<String, SlotIndex>,
}

impl ServiceRegistry {
    pub(crate) fn new(services: IndexMap<String, SlotIndex>) -> Self {
        Self { services }
    }

    /// The slot exported under `key`.
    pub fn slot(&self, key: &str) -> Option<SlotIndex> {
        self.services.get(key).copied()
    }

    /// Whether a service is exported under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.services.contains_key(key)
    }

    /// Read the service exported under `key` from `region`.
    pub fn resolve<T: Any + Send + Sync>(
        &self,
        region: &Region,
        key: &str,
    ) -> Result<Arc<T>, RegionError> {
        let slot = self.slot(key).ok_or_else(|| RegionError::UnknownService {
            key: key.to_string(),
        })?;
        region
            .get_as::<T>(slot)?
            .ok_or(RegionError::Empty { slot })
    }

    /// Exported keys in export order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.services.keys().map(String::as_str)
    }

    /// Number of exported services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether nothing is exported.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
