//! Kiln: configure a tree of components, freeze it, launch it.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Kiln sub-crates. For most users, adding `kiln` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use kiln::prelude::*;
//!
//! let mut tree = ConfigTree::new(Modifiers::GUEST | Modifiers::APPLICATION).unwrap();
//! let root = tree.root();
//!
//! // A source-bearing child owns one instance slot in the root region.
//! let greeting = tree
//!     .create_child(root, Some("greeting"), Modifiers::SOURCE, WireletList::new())
//!     .unwrap();
//! let slot = tree
//!     .provide_instance(greeting, [], constant(String::from("hello")))
//!     .unwrap();
//! tree.export(greeting, "greeting", slot).unwrap();
//!
//! // Freeze into a reusable image and launch one instance of it.
//! let image = tree.into_image().unwrap();
//! let instance = image.launch(WireletList::new()).unwrap();
//! assert_eq!(instance.service::<String>("greeting").unwrap().as_str(), "hello");
//! instance.start().unwrap();
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `kiln-core` | Ids, modifiers, wirelets, slot values |
//! | [`region`] | `kiln-region` | Regions, assemblies, producers, guests |
//! | [`assembly`] | `kiln-assembly` | Configuration trees, images, instances |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core ids, the modifier bit-set and wirelets (`kiln-core`).
pub use kiln_core as types;

/// Slot regions and their assemblies (`kiln-region`).
///
/// Use [`region::RegionAssembly`] directly when no configuration tree is
/// needed.
pub use kiln_region as region;

/// Configuration trees, lifecycle latches, images and instances
/// (`kiln-assembly`).
pub use kiln_assembly as assembly;

/// Common imports for typical Kiln usage.
///
/// ```rust
/// use kiln::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use kiln_core::{Modifiers, NodeId, RegionId, SlotIndex, SlotValue, WireletList};
    pub use kiln_core::slot_value;

    // Regions and producers
    pub use kiln_region::{
        constant, from_fn, Guest, GuestState, MaterializeContext, ProduceContext, Producer,
        Region, RegionAssembly, RegionLayout, SlotAccessor,
    };

    // Trees
    pub use kiln_assembly::{
        AssemblyConfig, ConfigTree, Image, Instance, LifecycleState, RuntimeNode,
    };

    // Errors
    pub use kiln_assembly::{AssemblyError, ConfigError};
    pub use kiln_core::WireletError;
    pub use kiln_region::{GuestError, ProducerError, RegionError};
}
