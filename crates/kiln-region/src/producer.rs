//! The producer trait and the context it runs in.
//!
//! A producer computes the value of one slot. It is registered with the
//! slots it depends on; materialization resolves those slots first and
//! hands them over positionally through [`ProduceContext`]. Producers never
//! address the region by absolute slot index, which keeps them valid when
//! an assembly is absorbed into another and its slots are renumbered.

use std::any::{type_name, Any};
use std::sync::Arc;

use kiln_core::{SlotIndex, SlotValue};

use crate::context::MaterializeContext;
use crate::error::{ProducerError, RegionError};
use crate::guest::Guest;

/// Deferred computation supplying the value for one slot.
///
/// Producers are shared by every materialization of the same plan, so
/// they take `&self` and must be `Send + Sync`. Closures become producers
/// through [`from_fn`]; fixed values through [`constant`].
pub trait Producer: Send + Sync {
    /// Compute the slot value.
    fn produce(&self, ctx: &ProduceContext<'_>) -> Result<SlotValue, ProducerError>;
}

/// Producer backed by a closure. Created by [`from_fn`].
pub struct FnProducer<F>(F);

impl<F> Producer for FnProducer<F>
where
    F: Fn(&ProduceContext<'_>) -> Result<SlotValue, ProducerError> + Send + Sync,
{
    fn produce(&self, ctx: &ProduceContext<'_>) -> Result<SlotValue, ProducerError> {
        (self.0)(ctx)
    }
}

/// Turn a closure into a [`Producer`].
pub fn from_fn<F>(f: F) -> FnProducer<F>
where
    F: Fn(&ProduceContext<'_>) -> Result<SlotValue, ProducerError> + Send + Sync,
{
    FnProducer(f)
}

/// Producer that hands out the same shared value on every materialization.
pub struct Constant(SlotValue);

impl Producer for Constant {
    fn produce(&self, _ctx: &ProduceContext<'_>) -> Result<SlotValue, ProducerError> {
        Ok(Arc::clone(&self.0))
    }
}

/// A producer that always yields `value`.
///
/// The value is created once and shared between materializations; use
/// [`from_fn`] when every region needs a fresh instance.
pub fn constant<T: Any + Send + Sync>(value: T) -> Constant {
    Constant(Arc::new(value))
}

/// Everything a producer may look at while it runs.
pub struct ProduceContext<'a> {
    slot: SlotIndex,
    dependency_slots: &'a [SlotIndex],
    dependencies: &'a [SlotValue],
    guest: Option<&'a Arc<Guest>>,
    launch: &'a MaterializeContext,
}

impl<'a> ProduceContext<'a> {
    pub(crate) fn new(
        slot: SlotIndex,
        dependency_slots: &'a [SlotIndex],
        dependencies: &'a [SlotValue],
        guest: Option<&'a Arc<Guest>>,
        launch: &'a MaterializeContext,
    ) -> Self {
        Self {
            slot,
            dependency_slots,
            dependencies,
            guest,
            launch,
        }
    }

    /// The slot being produced.
    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    /// Resolved value of the dependency declared at `position`.
    pub fn dependency(&self, position: usize) -> Result<&SlotValue, ProducerError> {
        self.dependencies
            .get(position)
            .ok_or(ProducerError::MissingDependency { position })
    }

    /// Resolved value of the dependency at `position`, as a concrete type.
    pub fn dependency_as<T: Any + Send + Sync>(
        &self,
        position: usize,
    ) -> Result<Arc<T>, ProducerError> {
        let value = self.dependency(position)?;
        Arc::clone(value).downcast::<T>().map_err(|_| {
            ProducerError::Region(RegionError::TypeMismatch {
                slot: self.dependency_slots[position],
                expected: type_name::<T>(),
            })
        })
    }

    /// All resolved dependencies, in declaration order.
    pub fn dependencies(&self) -> &[SlotValue] {
        self.dependencies
    }

    /// The guest of the region being materialized, if it is guest-bearing.
    pub fn guest(&self) -> Option<&Arc<Guest>> {
        self.guest
    }

    /// Launch-time context of this materialization.
    pub fn launch(&self) -> &MaterializeContext {
        self.launch
    }
}
