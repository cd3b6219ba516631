//! The value type stored in region slots.

use std::any::Any;
use std::sync::Arc;

/// A type-erased, shareable value held by one region slot.
///
/// Regions are read concurrently once materialized, so every value is
/// `Send + Sync`. Typed access goes through [`Arc::downcast`].
pub type SlotValue = Arc<dyn Any + Send + Sync>;

/// Wrap a concrete value as a [`SlotValue`].
pub fn slot_value<T: Any + Send + Sync>(value: T) -> SlotValue {
    Arc::new(value)
}
