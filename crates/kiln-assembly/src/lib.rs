//! Component configuration trees for Kiln.
//!
//! A [`ConfigTree`] is built node by node while an application is being
//! configured. Every node carries a [`LifecycleState`] whose one-way
//! latches decide which mutations are still legal; source-bearing nodes
//! reserve slots in a region through
//! [`RegionAssembly`](kiln_region::RegionAssembly). Once frozen, the tree
//! compiles into an [`Image`], a reusable blueprint that
//! [`launch`](Image::launch)es any number of independent [`Instance`]s.
//!
//! ```text
//! ConfigTree ──freeze──► Image ──launch──► Instance (regions + runtime nodes)
//!                          └────launch──► Instance
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod image;
pub mod lifecycle;
pub mod runtime;
pub mod tree;

pub use config::{AssemblyConfig, ConfigError};
pub use error::AssemblyError;
pub use image::Image;
pub use lifecycle::{Latches, Lifecycle, LifecycleState};
pub use runtime::{Instance, RuntimeNode};
pub use tree::{Children, ConfigTree};
