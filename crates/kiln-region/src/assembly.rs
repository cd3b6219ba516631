//! Build-time slot reservation and producer registration.
//!
//! [`RegionAssembly`] is the mutable half of a region. While the owning
//! subtree is configured it hands out dense slot indices, records one
//! producer per slot together with the slots that producer depends on, and
//! collects service exports. [`freeze`](RegionAssembly::freeze) seals it;
//! from then on it can only be turned into a [`RegionPlan`] or
//! materialized.
//!
//! The assembly performs no dependency analysis: producers run in the
//! order they were registered, and ordering them is the caller's job.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use kiln_core::{AssemblyId, SlotIndex};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::accessor::{SlotAccessor, SlotOrigin};
use crate::config::{RegionConfig, RegionLayout};
use crate::context::MaterializeContext;
use crate::error::{AbsorbRefusal, RegionError};
use crate::plan::RegionPlan;
use crate::producer::Producer;
use crate::region::Region;

/// One registered producer.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) slot: SlotIndex,
    pub(crate) dependencies: SmallVec<[SlotIndex; 4]>,
    pub(crate) producer: Arc<dyn Producer>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("slot", &self.slot)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Old-to-new slot mapping produced by [`RegionAssembly::absorb`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotRemap {
    table: Vec<SlotIndex>,
}

impl SlotRemap {
    /// Where `old` (a slot of the absorbed assembly) ended up.
    pub fn get(&self, old: SlotIndex) -> Option<SlotIndex> {
        self.table.get(old.index()).copied()
    }

    /// Number of mapped slots.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the absorbed assembly had no slots.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Accumulates slot reservations and producers for one region.
///
/// Every assembly has a process-unique [`AssemblyId`]. Slot indices and
/// accessors it hands out are relative to that id.
pub struct RegionAssembly {
    id: AssemblyId,
    config: RegionConfig,
    /// Number of reserved slots (well-known ones included).
    len: u32,
    /// Producers in registration order.
    registrations: Vec<Registration>,
    /// `provided[slot]` is true once a producer is registered for `slot`.
    provided: Vec<bool>,
    exports: IndexMap<String, SlotIndex>,
    /// Renumbering tables of every assembly merged into this one.
    absorbed: IndexMap<AssemblyId, Arc<[SlotIndex]>>,
    frozen: bool,
}

impl RegionAssembly {
    /// Create an assembly for `layout` with the default slot budget.
    ///
    /// The layout's well-known slots are reserved immediately.
    pub fn new(layout: RegionLayout) -> Self {
        Self::reserve_well_known(RegionConfig::new(layout))
    }

    /// Create an assembly from an explicit config.
    pub fn with_config(config: RegionConfig) -> Result<Self, RegionError> {
        config.validate()?;
        Ok(Self::reserve_well_known(config))
    }

    fn reserve_well_known(config: RegionConfig) -> Self {
        let len = config.layout.well_known_count();
        Self {
            id: AssemblyId::next(),
            config,
            len,
            registrations: Vec::new(),
            provided: vec![false; len as usize],
            exports: IndexMap::new(),
            absorbed: IndexMap::new(),
            frozen: false,
        }
    }

    /// Reserve the next slot.
    ///
    /// Indices are dense and strictly increasing. No producer is needed
    /// yet; a slot that never gets one stays unset in every region.
    pub fn reserve(&mut self) -> Result<SlotIndex, RegionError> {
        self.ensure_open()?;
        if self.len >= self.config.max_slots {
            return Err(RegionError::CapacityExceeded {
                capacity: self.config.max_slots,
            });
        }
        let slot = SlotIndex(self.len);
        self.len += 1;
        self.provided.push(false);
        trace!(slot = %slot, "reserved slot");
        Ok(slot)
    }

    /// Register the producer for a reserved slot.
    ///
    /// `dependencies` are resolved before the producer runs and passed to
    /// it positionally. Every check happens before anything is recorded,
    /// so a rejected call leaves the assembly unchanged.
    pub fn provide<P>(
        &mut self,
        slot: SlotIndex,
        dependencies: impl IntoIterator<Item = SlotIndex>,
        producer: P,
    ) -> Result<(), RegionError>
    where
        P: Producer + 'static,
    {
        self.ensure_open()?;
        self.check_reserved(slot)?;
        if self.config.layout.is_well_known(slot) {
            return Err(RegionError::WellKnownSlot { slot });
        }
        if self.provided[slot.index()] {
            return Err(RegionError::DuplicateProducer { slot });
        }
        let dependencies: SmallVec<[SlotIndex; 4]> = dependencies.into_iter().collect();
        for &dep in &dependencies {
            if dep == slot {
                return Err(RegionError::SelfDependency { slot });
            }
            self.check_reserved(dep)?;
        }

        trace!(slot = %slot, deps = dependencies.len(), "registered producer");
        self.provided[slot.index()] = true;
        self.registrations.push(Registration {
            slot,
            dependencies,
            producer: Arc::new(producer),
        });
        Ok(())
    }

    /// Reserve a slot and register its producer in one step.
    pub fn reserve_with<P>(
        &mut self,
        dependencies: impl IntoIterator<Item = SlotIndex>,
        producer: P,
    ) -> Result<SlotIndex, RegionError>
    where
        P: Producer + 'static,
    {
        self.ensure_open()?;
        let dependencies: SmallVec<[SlotIndex; 4]> = dependencies.into_iter().collect();
        for &dep in &dependencies {
            self.check_reserved(dep)?;
        }
        let slot = self.reserve()?;
        self.provide(slot, dependencies, producer)?;
        Ok(slot)
    }

    /// Export a slot as a service under `key`.
    pub fn export(&mut self, key: impl Into<String>, slot: SlotIndex) -> Result<(), RegionError> {
        self.ensure_open()?;
        self.check_reserved(slot)?;
        let key = key.into();
        if self.exports.contains_key(&key) {
            return Err(RegionError::DuplicateExport { key });
        }
        trace!(key = %key, slot = %slot, "exported service");
        self.exports.insert(key, slot);
        Ok(())
    }

    /// Bind a typed accessor to a reserved slot.
    pub fn accessor<T: Any + Send + Sync>(
        &self,
        slot: SlotIndex,
    ) -> Result<SlotAccessor<T>, RegionError> {
        self.check_reserved(slot)?;
        Ok(SlotAccessor::new(self.id, slot))
    }

    /// Merge `other` into this assembly.
    ///
    /// `other`'s user slots are appended after this assembly's slots, in
    /// their original order. Its registry slot (if any) maps onto this
    /// assembly's registry slot. Its producers are appended after the
    /// existing ones with their dependencies renumbered, and its exports
    /// are merged. Guest-bearing assemblies keep a region of their own and
    /// cannot be absorbed.
    ///
    /// Raw [`SlotIndex`] values handed out by `other` are not valid here;
    /// translate them with the returned [`SlotRemap`]. Accessors bound by
    /// `other` keep working against regions of this assembly.
    pub fn absorb(&mut self, other: RegionAssembly) -> Result<SlotRemap, RegionError> {
        self.ensure_open()?;
        if other.frozen {
            return Err(RegionError::NotAbsorbable {
                reason: AbsorbRefusal::Frozen,
            });
        }
        let other_layout = other.config.layout;
        if other_layout == RegionLayout::Guest {
            return Err(RegionError::NotAbsorbable {
                reason: AbsorbRefusal::GuestLayout,
            });
        }
        let registry = match (
            other_layout.registry_slot(),
            self.config.layout.registry_slot(),
        ) {
            (Some(_), None) => {
                return Err(RegionError::NotAbsorbable {
                    reason: AbsorbRefusal::NoRegistry,
                })
            }
            (_, target) => target,
        };
        let user_slots = other.len - other_layout.well_known_count();
        if u64::from(self.len) + u64::from(user_slots) > u64::from(self.config.max_slots) {
            return Err(RegionError::CapacityExceeded {
                capacity: self.config.max_slots,
            });
        }
        if let Some(key) = other.exports.keys().find(|k| self.exports.contains_key(*k)) {
            return Err(RegionError::DuplicateExport { key: key.clone() });
        }

        let mut table = Vec::with_capacity(other.len as usize);
        for old in 0..other.len {
            if other_layout.is_well_known(SlotIndex(old)) {
                // Only the registry can be well-known here; checked above.
                table.push(registry.unwrap_or(SlotIndex(old)));
            } else {
                table.push(SlotIndex(self.len));
                self.len += 1;
                self.provided.push(false);
            }
        }
        let remap = SlotRemap { table };

        for mut registration in other.registrations {
            let slot = remap.table[registration.slot.index()];
            for dep in registration.dependencies.iter_mut() {
                *dep = remap.table[dep.index()];
            }
            registration.slot = slot;
            self.provided[slot.index()] = true;
            self.registrations.push(registration);
        }
        for (key, slot) in other.exports {
            self.exports.insert(key, remap.table[slot.index()]);
        }
        for (id, table) in other.absorbed {
            let composed: Arc<[SlotIndex]> =
                table.iter().map(|old| remap.table[old.index()]).collect();
            self.absorbed.insert(id, composed);
        }
        self.absorbed.insert(other.id, Arc::from(remap.table.as_slice()));

        debug!(absorbed = user_slots, total = self.len, "absorbed region assembly");
        Ok(remap)
    }

    /// Seal the assembly. Idempotent.
    pub fn freeze(&mut self) {
        if !self.frozen {
            self.frozen = true;
            debug!(
                slots = self.len,
                producers = self.registrations.len(),
                layout = ?self.config.layout,
                "region assembly frozen"
            );
        }
    }

    /// Whether [`freeze`](Self::freeze) has been called.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Snapshot the frozen assembly as a reusable plan.
    pub fn plan(&self) -> Result<RegionPlan, RegionError> {
        if !self.frozen {
            return Err(RegionError::NotFrozen);
        }
        Ok(RegionPlan::new(
            self.config.layout,
            self.len,
            self.registrations.clone(),
            self.exports.clone(),
            SlotOrigin {
                id: self.id,
                absorbed: Arc::new(self.absorbed.clone()),
            },
        ))
    }

    /// Materialize a region from the frozen assembly.
    pub fn materialize(&self, ctx: &MaterializeContext) -> Result<Region, RegionError> {
        self.plan()?.materialize(ctx)
    }

    /// Number of reserved slots, well-known slots included.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether no slot is reserved.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of registered producers.
    pub fn producer_count(&self) -> usize {
        self.registrations.len()
    }

    /// Whether `slot` has a registered producer.
    pub fn is_provided(&self, slot: SlotIndex) -> bool {
        self.provided.get(slot.index()).copied().unwrap_or(false)
    }

    /// The slot layout.
    pub fn layout(&self) -> RegionLayout {
        self.config.layout
    }

    /// This assembly's identity.
    pub fn id(&self) -> AssemblyId {
        self.id
    }

    /// The assembly configuration.
    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    fn ensure_open(&self) -> Result<(), RegionError> {
        if self.frozen {
            Err(RegionError::Frozen)
        } else {
            Ok(())
        }
    }

    fn check_reserved(&self, slot: SlotIndex) -> Result<(), RegionError> {
        if slot.0 < self.len {
            Ok(())
        } else {
            Err(RegionError::SlotOutOfRange {
                slot,
                len: self.len,
            })
        }
    }
}

impl fmt::Debug for RegionAssembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionAssembly")
            .field("id", &self.id)
            .field("layout", &self.config.layout)
            .field("len", &self.len)
            .field("producers", &self.registrations.len())
            .field("exports", &self.exports)
            .field("frozen", &self.frozen)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guest::Guest;
    use crate::producer::{constant, from_fn};
    use crate::registry::ServiceRegistry;
    use kiln_core::slot_value;

    fn ctx() -> MaterializeContext {
        MaterializeContext::new("test")
    }

    #[test]
    fn bare_reservations_start_at_zero() {
        let mut asm = RegionAssembly::new(RegionLayout::Bare);
        assert_eq!(asm.reserve().unwrap(), SlotIndex(0));
        assert_eq!(asm.reserve().unwrap(), SlotIndex(1));
        assert_eq!(asm.len(), 2);
    }

    #[test]
    fn guest_layout_reserves_well_known_slots() {
        let mut asm = RegionAssembly::new(RegionLayout::Guest);
        assert_eq!(asm.len(), 2);
        assert_eq!(asm.reserve().unwrap(), SlotIndex(2));
    }

    #[test]
    fn reserve_after_freeze_fails() {
        let mut asm = RegionAssembly::new(RegionLayout::Bare);
        asm.freeze();
        asm.freeze();
        assert_eq!(asm.reserve(), Err(RegionError::Frozen));
        assert!(asm.is_frozen());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut asm = RegionAssembly::with_config(RegionConfig {
            layout: RegionLayout::Hosted,
            max_slots: 2,
        })
        .unwrap();
        asm.reserve().unwrap();
        assert_eq!(
            asm.reserve(),
            Err(RegionError::CapacityExceeded { capacity: 2 })
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = RegionAssembly::with_config(RegionConfig {
            layout: RegionLayout::Guest,
            max_slots: 0,
        })
        .unwrap_err();
        assert_eq!(
            err,
            RegionError::SlotBudgetTooSmall {
                layout: RegionLayout::Guest,
                configured: 0,
                minimum: 2,
            }
        );
    }

    #[test]
    fn provide_rejections_leave_assembly_unchanged() {
        let mut asm = RegionAssembly::new(RegionLayout::Guest);
        let slot = asm.reserve().unwrap();

        assert_eq!(
            asm.provide(SlotIndex(0), [], constant(1u8)),
            Err(RegionError::WellKnownSlot { slot: SlotIndex(0) })
        );
        assert_eq!(
            asm.provide(SlotIndex(9), [], constant(1u8)),
            Err(RegionError::SlotOutOfRange {
                slot: SlotIndex(9),
                len: 3
            })
        );
        assert_eq!(
            asm.provide(slot, [slot], constant(1u8)),
            Err(RegionError::SelfDependency { slot })
        );
        assert_eq!(
            asm.provide(slot, [SlotIndex(7)], constant(1u8)),
            Err(RegionError::SlotOutOfRange {
                slot: SlotIndex(7),
                len: 3
            })
        );
        assert_eq!(asm.producer_count(), 0);
        assert!(!asm.is_provided(slot));

        asm.provide(slot, [], constant(1u8)).unwrap();
        assert_eq!(
            asm.provide(slot, [], constant(2u8)),
            Err(RegionError::DuplicateProducer { slot })
        );
        assert_eq!(asm.producer_count(), 1);
    }

    #[test]
    fn reserve_with_validates_dependencies_first() {
        let mut asm = RegionAssembly::new(RegionLayout::Bare);
        assert!(asm.reserve_with([SlotIndex(0)], constant(())).is_err());
        assert_eq!(asm.len(), 0);
        let a = asm.reserve_with([], constant(1u32)).unwrap();
        let b = asm.reserve_with([a], constant(2u32)).unwrap();
        assert_eq!((a, b), (SlotIndex(0), SlotIndex(1)));
    }

    #[test]
    fn materialize_requires_freeze() {
        let asm = RegionAssembly::new(RegionLayout::Bare);
        assert_eq!(asm.materialize(&ctx()).unwrap_err(), RegionError::NotFrozen);
    }

    #[test]
    fn guest_scenario_fills_well_known_and_singleton() {
        let mut asm = RegionAssembly::new(RegionLayout::Guest);
        let singleton = asm.reserve_with([], constant(String::from("single"))).unwrap();
        assert_eq!(singleton, SlotIndex(2));
        asm.freeze();

        let region = asm.materialize(&ctx()).unwrap();
        assert_eq!(region.len(), 3);
        assert!(region.get_as::<Guest>(SlotIndex(0)).unwrap().is_some());
        assert!(region
            .get_as::<ServiceRegistry>(SlotIndex(1))
            .unwrap()
            .is_some());
        assert_eq!(
            *region.get_as::<String>(SlotIndex(2)).unwrap().unwrap(),
            "single"
        );
        assert_eq!(region.filled(), 3);
    }

    #[test]
    fn producers_see_guest_and_dependencies() {
        let mut asm = RegionAssembly::new(RegionLayout::Guest);
        let base = asm.reserve_with([], constant(10u32)).unwrap();
        let derived = asm
            .reserve_with(
                [base, SlotIndex(0)],
                from_fn(|ctx| {
                    let base = ctx.dependency_as::<u32>(0)?;
                    let guest = ctx.dependency_as::<Guest>(1)?;
                    let same = ctx.guest().is_some_and(|g| Arc::ptr_eq(g, &guest));
                    Ok(slot_value((*base + 1, same)))
                }),
            )
            .unwrap();
        asm.freeze();

        let region = asm.materialize(&ctx()).unwrap();
        let value = region.get_as::<(u32, bool)>(derived).unwrap().unwrap();
        assert_eq!(*value, (11, true));
    }

    #[test]
    fn late_dependency_fails_naming_the_slot() {
        let mut asm = RegionAssembly::new(RegionLayout::Bare);
        let early = asm.reserve().unwrap();
        let late = asm.reserve().unwrap();
        asm.provide(early, [late], constant(1u8)).unwrap();
        asm.provide(late, [], constant(2u8)).unwrap();
        asm.freeze();

        assert_eq!(
            asm.materialize(&ctx()).unwrap_err(),
            RegionError::UnsetSlot {
                slot: late,
                requested_by: early
            }
        );
    }

    #[test]
    fn unprovided_slot_stays_unset() {
        let mut asm = RegionAssembly::new(RegionLayout::Bare);
        let optional = asm.reserve().unwrap();
        let present = asm.reserve_with([], constant(1u8)).unwrap();
        asm.freeze();

        let region = asm.materialize(&ctx()).unwrap();
        assert!(region.get(optional).unwrap().is_none());
        assert!(region.get(present).unwrap().is_some());
    }

    #[test]
    fn producer_failure_is_reported_with_slot() {
        let mut asm = RegionAssembly::new(RegionLayout::Bare);
        let slot = asm
            .reserve_with([], from_fn(|_| Err(crate::ProducerError::failed("boom"))))
            .unwrap();
        asm.freeze();
        assert_eq!(
            asm.materialize(&ctx()).unwrap_err(),
            RegionError::ProducerFailed {
                slot,
                reason: "boom".to_string()
            }
        );
    }

    #[test]
    fn exports_resolve_through_registry() {
        let mut asm = RegionAssembly::new(RegionLayout::Hosted);
        let slot = asm.reserve_with([], constant(99u64)).unwrap();
        asm.export("answer", slot).unwrap();
        assert_eq!(
            asm.export("answer", slot),
            Err(RegionError::DuplicateExport {
                key: "answer".to_string()
            })
        );
        asm.freeze();

        let region = asm.materialize(&ctx()).unwrap();
        assert_eq!(*region.service::<u64>("answer").unwrap(), 99);
        assert_eq!(region.registry().unwrap().len(), 1);
    }

    #[test]
    fn accessor_binds_reserved_slot_only() {
        let mut asm = RegionAssembly::new(RegionLayout::Bare);
        let slot = asm.reserve_with([], constant(3i8)).unwrap();
        let accessor = asm.accessor::<i8>(slot).unwrap();
        assert!(asm.accessor::<i8>(SlotIndex(5)).is_err());
        asm.freeze();

        let region = asm.materialize(&ctx()).unwrap();
        assert_eq!(*accessor.get(&region).unwrap(), 3);
    }

    #[test]
    fn absorb_renumbers_slots_dependencies_and_exports() {
        let mut host = RegionAssembly::new(RegionLayout::Guest);
        let own = host.reserve_with([], constant(1u32)).unwrap();
        host.export("own", own).unwrap();

        let mut sub = RegionAssembly::new(RegionLayout::Hosted);
        let a = sub.reserve_with([], constant(20u32)).unwrap();
        let b = sub
            .reserve_with(
                [a, SlotIndex(0)],
                from_fn(|ctx| {
                    let a = ctx.dependency_as::<u32>(0)?;
                    let registry = ctx.dependency_as::<ServiceRegistry>(1)?;
                    Ok(slot_value((*a + 1, registry.contains("own"))))
                }),
            )
            .unwrap();
        sub.export("b", b).unwrap();

        let remap = host.absorb(sub).unwrap();
        assert_eq!(remap.get(SlotIndex(0)), Some(SlotIndex(1)));
        assert_eq!(remap.get(a), Some(SlotIndex(3)));
        assert_eq!(remap.get(b), Some(SlotIndex(4)));
        assert_eq!(host.len(), 5);
        host.freeze();

        let region = host.materialize(&ctx()).unwrap();
        assert_eq!(*region.service::<(u32, bool)>("b").unwrap(), (21, true));
        assert_eq!(*region.service::<u32>("own").unwrap(), 1);
    }

    #[test]
    fn absorb_rejects_guest_and_conflicting_exports() {
        let mut host = RegionAssembly::new(RegionLayout::Hosted);
        let slot = host.reserve_with([], constant(())).unwrap();
        host.export("x", slot).unwrap();

        let guest = RegionAssembly::new(RegionLayout::Guest);
        assert_eq!(
            host.absorb(guest),
            Err(RegionError::NotAbsorbable {
                reason: AbsorbRefusal::GuestLayout
            })
        );

        let mut frozen = RegionAssembly::new(RegionLayout::Hosted);
        frozen.freeze();
        assert_eq!(
            host.absorb(frozen),
            Err(RegionError::NotAbsorbable {
                reason: AbsorbRefusal::Frozen
            })
        );

        let mut clash = RegionAssembly::new(RegionLayout::Hosted);
        let other = clash.reserve().unwrap();
        clash.export("x", other).unwrap();
        assert_eq!(
            host.absorb(clash),
            Err(RegionError::DuplicateExport {
                key: "x".to_string()
            })
        );
        assert_eq!(host.len(), 2);

        let mut bare_host = RegionAssembly::new(RegionLayout::Bare);
        assert_eq!(
            bare_host.absorb(RegionAssembly::new(RegionLayout::Hosted)),
            Err(RegionError::NotAbsorbable {
                reason: AbsorbRefusal::NoRegistry
            })
        );
    }

    #[test]
    fn accessors_survive_absorb() {
        let mut host = RegionAssembly::new(RegionLayout::Hosted);
        let own = host.reserve_with([], constant(1u64)).unwrap();
        let own_accessor = host.accessor::<u64>(own).unwrap();

        let mut sub = RegionAssembly::new(RegionLayout::Hosted);
        let x = sub.reserve_with([], constant(7u64)).unwrap();
        let before = sub.accessor::<u64>(x).unwrap();
        assert_eq!(x, own);

        let remap = host.absorb(sub).unwrap();
        assert_ne!(remap.get(x), Some(x));
        host.freeze();

        let region = host.materialize(&ctx()).unwrap();
        assert_eq!(*before.get(&region).unwrap(), 7);
        assert_eq!(before.resolve(&region), Ok(remap.get(x).unwrap()));
        assert_eq!(*own_accessor.get(&region).unwrap(), 1);
    }

    #[test]
    fn accessors_survive_nested_absorbs() {
        let mut inner = RegionAssembly::new(RegionLayout::Hosted);
        let deep = inner.reserve_with([], constant("deep")).unwrap();
        let accessor = inner.accessor::<&'static str>(deep).unwrap();

        let mut middle = RegionAssembly::new(RegionLayout::Hosted);
        middle.reserve_with([], constant("middle")).unwrap();
        middle.absorb(inner).unwrap();

        let mut outer = RegionAssembly::new(RegionLayout::Guest);
        outer.reserve_with([], constant("outer")).unwrap();
        outer.absorb(middle).unwrap();
        outer.freeze();

        let region = outer.materialize(&ctx()).unwrap();
        assert_eq!(*accessor.get(&region).unwrap(), "deep");
        assert_eq!(accessor.resolve(&region), Ok(SlotIndex(4)));
    }

    #[test]
    fn accessor_is_rejected_by_unrelated_region() {
        let mut a = RegionAssembly::new(RegionLayout::Bare);
        let slot = a.reserve_with([], constant(1u8)).unwrap();
        let accessor = a.accessor::<u8>(slot).unwrap();

        let mut b = RegionAssembly::new(RegionLayout::Bare);
        b.reserve_with([], constant(2u8)).unwrap();
        b.freeze();
        let region = b.materialize(&ctx()).unwrap();
        assert_eq!(
            accessor.get(&region),
            Err(RegionError::ForeignAccessor {
                slot,
                assembly: a.id(),
            })
        );
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn reservations_are_dense_regardless_of_providing(
                provide_mask in proptest::collection::vec(any::<bool>(), 0..64),
            ) {
                let mut asm = RegionAssembly::new(RegionLayout::Bare);
                for (i, &provide) in provide_mask.iter().enumerate() {
                    let slot = asm.reserve().unwrap();
                    prop_assert_eq!(slot, SlotIndex(i as u32));
                    if provide {
                        asm.provide(slot, [], constant(i)).unwrap();
                    }
                }
                prop_assert_eq!(asm.len(), provide_mask.len());
            }

            #[test]
            fn topological_registration_fills_every_provided_slot(
                parents in proptest::collection::vec(any::<prop::sample::Index>(), 1..32),
            ) {
                // Each producer depends on some earlier slot, registered in order.
                let mut asm = RegionAssembly::new(RegionLayout::Bare);
                let root = asm.reserve_with([], constant(0usize)).unwrap();
                let mut slots = vec![root];
                for parent in &parents {
                    let dep = slots[parent.index(slots.len())];
                    let slot = asm
                        .reserve_with(
                            [dep],
                            from_fn(|ctx| Ok(slot_value(*ctx.dependency_as::<usize>(0)? + 1))),
                        )
                        .unwrap();
                    slots.push(slot);
                }
                asm.freeze();

                let region = asm.materialize(&MaterializeContext::new("p")).unwrap();
                prop_assert_eq!(region.filled(), slots.len());
                for slot in slots {
                    prop_assert!(region.is_set(slot));
                }
            }
        }
    }
}
