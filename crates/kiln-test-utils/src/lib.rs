//! Test fixtures and sample trees for Kiln development.
//!
//! Provides ready-made [`Producer`](kiln_region::Producer) implementations
//! (see [`fixtures`]) and [`sample_tree`], a small configured tree that
//! exercises guests, services and cross-slot dependencies.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use kiln_assembly::{AssemblyError, ConfigTree};
use kiln_core::{Modifiers, NodeId, WireletList};
use kiln_region::constant;

use fixtures::{GuestNameProducer, SumProducer};

/// Node ids of the tree built by [`sample_tree`].
#[derive(Clone, Copy, Debug)]
pub struct SampleNodes {
    /// `App/config`: a `u64` constant, 10.
    pub config: NodeId,
    /// `App/service`: `config + 5`, exported as `"service"`.
    pub service: NodeId,
    /// `App/worker`: a guest-bearing container with its own region.
    pub worker: NodeId,
    /// `App/worker/job`: the name of the worker's guest.
    pub job: NodeId,
}

/// Build the sample tree.
///
/// ```text
/// App            (guest, application, container)
/// ├── config     (source) = 10u64
/// ├── service    (source) = config + 5, exported as "service"
/// └── worker     (guest, source, container) = 0u64
///     └── job    (source) = worker guest name
/// ```
pub fn sample_tree() -> Result<(ConfigTree, SampleNodes), AssemblyError> {
    let mut tree =
        ConfigTree::new(Modifiers::GUEST | Modifiers::APPLICATION | Modifiers::CONTAINER)?;
    let root = tree.root();
    tree.set_name(root, "App")?;

    let config = tree.create_child(root, Some("config"), Modifiers::SOURCE, WireletList::new())?;
    let config_slot = tree.provide_instance(config, [], constant(10u64))?;

    let service = tree.create_child(root, Some("service"), Modifiers::SOURCE, WireletList::new())?;
    let service_slot = tree.provide_instance(service, [config_slot], SumProducer::new(5))?;
    tree.export(service, "service", service_slot)?;

    let worker = tree.create_child(
        root,
        Some("worker"),
        Modifiers::GUEST | Modifiers::SOURCE | Modifiers::CONTAINER,
        WireletList::new(),
    )?;
    tree.provide_instance(worker, [], constant(0u64))?;

    let job = tree.create_child(worker, Some("job"), Modifiers::SOURCE, WireletList::new())?;
    tree.provide_instance(job, [], GuestNameProducer)?;

    Ok((
        tree,
        SampleNodes {
            config,
            service,
            worker,
            job,
        },
    ))
}
