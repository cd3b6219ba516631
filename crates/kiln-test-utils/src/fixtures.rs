//! Reusable producer fixtures.
//!
//! - [`CountingProducer`]: yields the number of times it has run.
//! - [`SumProducer`]: adds a base to every `u64` dependency.
//! - [`FailingProducer`]: fails deterministically after N calls.
//! - [`GuestNameProducer`]: yields the name of the region's guest.
//! - [`LaunchValueProducer`]: yields a `u64` launch wirelet, or a default.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kiln_core::{slot_value, SlotValue};
use kiln_region::{ProduceContext, Producer, ProducerError};

/// Yields `0, 1, 2, …` as `usize`, one value per call.
///
/// Clones share the counter, so a test can keep one clone and hand the
/// other to an assembly.
#[derive(Clone, Default)]
pub struct CountingProducer {
    calls: Arc<AtomicUsize>,
}

impl CountingProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `produce` has run across all clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Producer for CountingProducer {
    fn produce(&self, _ctx: &ProduceContext<'_>) -> Result<SlotValue, ProducerError> {
        Ok(slot_value(self.calls.fetch_add(1, Ordering::SeqCst)))
    }
}

/// Adds `base` to the sum of all dependencies, which must be `u64`.
pub struct SumProducer {
    pub base: u64,
}

impl SumProducer {
    pub fn new(base: u64) -> Self {
        Self { base }
    }
}

impl Producer for SumProducer {
    fn produce(&self, ctx: &ProduceContext<'_>) -> Result<SlotValue, ProducerError> {
        let mut total = self.base;
        for i in 0..ctx.dependencies().len() {
            total += *ctx.dependency_as::<u64>(i)?;
        }
        Ok(slot_value(total))
    }
}

/// Yields `()` for the first `succeed_count` calls, then fails.
pub struct FailingProducer {
    succeed_count: usize,
    calls: AtomicUsize,
}

impl FailingProducer {
    pub fn new(succeed_count: usize) -> Self {
        Self {
            succeed_count,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Producer for FailingProducer {
    fn produce(&self, _ctx: &ProduceContext<'_>) -> Result<SlotValue, ProducerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.succeed_count {
            Err(ProducerError::failed(format!("failed on call {n}")))
        } else {
            Ok(slot_value(()))
        }
    }
}

/// Yields the guest's name as a `String`; fails outside guest regions.
pub struct GuestNameProducer;

impl Producer for GuestNameProducer {
    fn produce(&self, ctx: &ProduceContext<'_>) -> Result<SlotValue, ProducerError> {
        let guest = ctx
            .guest()
            .ok_or_else(|| ProducerError::failed("no guest in this region"))?;
        Ok(slot_value(guest.name().to_string()))
    }
}

/// Yields the last `u64` launch wirelet, or `default` if there is none.
pub struct LaunchValueProducer {
    pub default: u64,
}

impl Producer for LaunchValueProducer {
    fn produce(&self, ctx: &ProduceContext<'_>) -> Result<SlotValue, ProducerError> {
        let value = ctx
            .launch()
            .wirelets()
            .find::<u64>()
            .copied()
            .unwrap_or(self.default);
        Ok(slot_value(value))
    }
}
