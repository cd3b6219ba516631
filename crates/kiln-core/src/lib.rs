//! Core types for the Kiln component assembly framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other Kiln crate: strongly typed ids,
//! the [`Modifiers`] capability bit-set, the [`WireletList`] of opaque
//! configuration options, and the [`SlotValue`] type stored in regions.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod modifiers;
pub mod value;
pub mod wirelet;

pub use error::WireletError;
pub use id::{AssemblyId, GuestId, NodeId, RegionId, SlotIndex};
pub use modifiers::Modifiers;
pub use value::{slot_value, SlotValue};
pub use wirelet::{Wirelet, WireletList};
