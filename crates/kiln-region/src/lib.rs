//! Write-once slot regions for Kiln.
//!
//! A [`Region`] is a fixed-length array of type-erased values addressed by
//! [`SlotIndex`](kiln_core::SlotIndex). Regions are never built directly:
//! a [`RegionAssembly`] hands out slot reservations while a component tree
//! is being configured, collects one [`Producer`] per slot, and once frozen
//! evaluates the producers in registration order to fill a fresh region.
//!
//! # Architecture
//!
//! ```text
//! RegionAssembly (build time, mutable)
//! ├── reserve() → SlotIndex (dense, 0..len)
//! ├── provide(slot, deps, producer)
//! ├── export(key, slot) → ServiceRegistry entries
//! └── freeze() ──► RegionPlan (immutable, cloneable blueprint)
//!                   └── materialize(ctx) ──► Region (one per guest)
//!                                             ├── slot 0: Guest           (Guest layout)
//!                                             ├── slot 0/1: ServiceRegistry
//!                                             └── user slots
//! ```
//!
//! # Slot layouts
//!
//! - **Bare:** no well-known slots.
//! - **Hosted:** slot 0 holds the [`ServiceRegistry`].
//! - **Guest:** slot 0 holds the [`Guest`], slot 1 the [`ServiceRegistry`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod accessor;
pub mod assembly;
pub mod config;
pub mod context;
pub mod error;
pub mod guest;
pub mod plan;
pub mod producer;
pub mod region;
pub mod registry;
mod writer;

// Public re-exports for the primary API surface.
pub use accessor::SlotAccessor;
pub use assembly::{RegionAssembly, SlotRemap};
pub use config::{RegionConfig, RegionLayout};
pub use context::MaterializeContext;
pub use error::{AbsorbRefusal, ProducerError, RegionError};
pub use guest::{Guest, GuestError, GuestState};
pub use plan::RegionPlan;
pub use producer::{constant, from_fn, Constant, FnProducer, ProduceContext, Producer};
pub use region::{Region, SharedRegion};
pub use registry::ServiceRegistry;
