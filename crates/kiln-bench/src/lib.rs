//! Benchmark profiles for the Kiln assembly framework.
//!
//! - [`chain_assembly`]: a region whose producers form one long dependency chain
//! - [`fan_assembly`]: many independent producers sharing one dependency
//! - [`wide_tree`]: a configuration tree with `breadth^depth` source leaves

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use kiln_assembly::{AssemblyError, ConfigTree};
use kiln_core::{slot_value, Modifiers, NodeId, WireletList};
use kiln_region::{constant, from_fn, RegionAssembly, RegionError, RegionLayout};

/// Frozen guest-bearing assembly with `len` producers, each adding one to
/// its predecessor's `u64`.
pub fn chain_assembly(len: u32) -> Result<RegionAssembly, RegionError> {
    let mut asm = RegionAssembly::new(RegionLayout::Guest);
    let mut previous = asm.reserve_with([], constant(0u64))?;
    for _ in 1..len {
        previous = asm.reserve_with(
            [previous],
            from_fn(|ctx| Ok(slot_value(*ctx.dependency_as::<u64>(0)? + 1))),
        )?;
    }
    asm.freeze();
    Ok(asm)
}

/// Frozen hosted assembly with one root value and `len` producers that
/// each read it. Every tenth slot is exported.
pub fn fan_assembly(len: u32) -> Result<RegionAssembly, RegionError> {
    let mut asm = RegionAssembly::new(RegionLayout::Hosted);
    let root = asm.reserve_with([], constant(7u64))?;
    for i in 0..len {
        let slot = asm.reserve_with(
            [root],
            from_fn(|ctx| Ok(slot_value(*ctx.dependency_as::<u64>(0)? * 2))),
        )?;
        if i % 10 == 0 {
            asm.export(format!("svc{i}"), slot)?;
        }
    }
    asm.freeze();
    Ok(asm)
}

/// Unfrozen tree of containers `depth` levels deep with `breadth`
/// children each; the last level is source-bearing and provided.
pub fn wide_tree(depth: u32, breadth: u32) -> Result<ConfigTree, AssemblyError> {
    let mut tree =
        ConfigTree::new(Modifiers::GUEST | Modifiers::APPLICATION | Modifiers::CONTAINER)?;
    let mut level: Vec<NodeId> = vec![tree.root()];
    for d in 1..=depth {
        let leaf = d == depth;
        let modifiers = if leaf {
            Modifiers::SOURCE
        } else {
            Modifiers::CONTAINER
        };
        let mut next = Vec::with_capacity(level.len() * breadth as usize);
        for &parent in &level {
            for _ in 0..breadth {
                let child = tree.create_child(parent, None, modifiers, WireletList::new())?;
                if leaf {
                    tree.provide_instance(child, [], constant(d))?;
                }
                next.push(child);
            }
        }
        level = next;
    }
    Ok(tree)
}
