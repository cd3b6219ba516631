//! Frozen region blueprints.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use kiln_core::{slot_value, SlotIndex, SlotValue};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::accessor::SlotOrigin;
use crate::assembly::Registration;
use crate::config::RegionLayout;
use crate::context::MaterializeContext;
use crate::error::{ProducerError, RegionError};
use crate::guest::Guest;
use crate::producer::ProduceContext;
use crate::registry::ServiceRegistry;
use crate::region::Region;
use crate::writer::RegionWriter;

/// Immutable snapshot of a frozen [`RegionAssembly`](crate::RegionAssembly).
///
/// Cheap to clone and safe to share between threads. Every call to
/// [`materialize`](Self::materialize) builds an independent [`Region`];
/// for guest-bearing layouts each one gets its own [`Guest`].
#[derive(Clone)]
pub struct RegionPlan {
    layout: RegionLayout,
    len: u32,
    registrations: Arc<[Registration]>,
    exports: Arc<IndexMap<String, SlotIndex>>,
    origin: SlotOrigin,
}

impl RegionPlan {
    pub(crate) fn new(
        layout: RegionLayout,
        len: u32,
        registrations: Vec<Registration>,
        exports: IndexMap<String, SlotIndex>,
        origin: SlotOrigin,
    ) -> Self {
        Self {
            layout,
            len,
            registrations: registrations.into(),
            exports: Arc::new(exports),
            origin,
        }
    }

    /// Fill a fresh region.
    ///
    /// Well-known slots are written first. Producers then run in
    /// registration order; each sees its declared dependencies, which must
    /// already be set. The first failure aborts the pass and nothing is
    /// returned.
    pub fn materialize(&self, ctx: &MaterializeContext) -> Result<Region, RegionError> {
        debug!(
            name = ctx.name(),
            slots = self.len,
            producers = self.registrations.len(),
            "materializing region"
        );
        let mut writer = RegionWriter::new(self.len);

        let guest = match self.layout.guest_slot() {
            Some(slot) => {
                let guest = Arc::new(Guest::new(ctx.name()));
                writer.set(slot, Arc::clone(&guest) as SlotValue)?;
                Some(guest)
            }
            None => None,
        };
        if let Some(slot) = self.layout.registry_slot() {
            let registry = ServiceRegistry::new(IndexMap::clone(&self.exports));
            writer.set(slot, slot_value(registry))?;
        }

        for registration in self.registrations.iter() {
            let slot = registration.slot;
            let mut values: SmallVec<[SlotValue; 4]> =
                SmallVec::with_capacity(registration.dependencies.len());
            for &dep in &registration.dependencies {
                let value = writer.get(dep)?.ok_or(RegionError::UnsetSlot {
                    slot: dep,
                    requested_by: slot,
                })?;
                values.push(Arc::clone(value));
            }

            let produce_ctx = ProduceContext::new(
                slot,
                &registration.dependencies,
                &values,
                guest.as_ref(),
                ctx,
            );
            let value = registration
                .producer
                .produce(&produce_ctx)
                .map_err(|err| match err {
                    ProducerError::Region(err) => err,
                    other => RegionError::ProducerFailed {
                        slot,
                        reason: other.to_string(),
                    },
                })?;
            trace!(slot = %slot, "slot produced");
            writer.set(slot, value)?;
        }

        let region = writer.finish(self.layout, self.origin.clone());
        debug!(name = ctx.name(), filled = region.filled(), "region materialized");
        Ok(region)
    }

    /// The slot layout.
    pub fn layout(&self) -> RegionLayout {
        self.layout
    }

    /// Number of slots every materialized region will have.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the plan has no slots.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of producers.
    pub fn producer_count(&self) -> usize {
        self.registrations.len()
    }

    /// Exported service keys in export order.
    pub fn exports(&self) -> impl Iterator<Item = (&str, SlotIndex)> + '_ {
        self.exports.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl fmt::Debug for RegionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionPlan")
            .field("assembly", &self.origin.id)
            .field("layout", &self.layout)
            .field("len", &self.len)
            .field("producers", &self.registrations.len())
            .finish()
    }
}

// Compile-time assertion: plans can be handed to launcher threads.
const _: () = {
    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send_sync::<RegionPlan>();
    }
};
