//! The build-time configuration tree.
//!
//! Nodes live in an arena owned by [`ConfigTree`] and are addressed by
//! [`NodeId`]. Parents own their children top-down; a child records its
//! parent's id but never keeps it alive. Children are kept twice: in a
//! first-child/next-sibling list for ordered traversal and in a per-parent
//! name index for lookups.
//!
//! Every mutation checks the node's [`Lifecycle`] first and fails fast.
//! All checks run before anything is written, so a rejected call leaves
//! the tree exactly as it was.

use std::any::Any;

use indexmap::{IndexMap, IndexSet};
use kiln_core::{Modifiers, NodeId, RegionId, SlotIndex, WireletList};
use kiln_region::{Producer, RegionAssembly, RegionLayout, SlotAccessor};
use smallvec::SmallVec;
use tracing::debug;

use crate::config::AssemblyConfig;
use crate::error::AssemblyError;
use crate::image::Image;
use crate::lifecycle::{Latches, Lifecycle, LifecycleState};

/// Separator between names in a node path.
pub const PATH_SEPARATOR: &str = "/";

// ── Node storage ───────────────────────────────────────────────────

pub(crate) struct NodeData {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) depth: u32,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) child_index: IndexMap<String, NodeId>,
    pub(crate) modifiers: Modifiers,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) wirelets: WireletList,
    pub(crate) extensions: IndexSet<String>,
    pub(crate) region: RegionId,
    pub(crate) instance_slot: Option<SlotIndex>,
    pub(crate) slots: SmallVec<[SlotIndex; 2]>,
}

impl NodeData {
    fn new(
        name: String,
        parent: Option<NodeId>,
        depth: u32,
        modifiers: Modifiers,
        wirelets: WireletList,
        region: RegionId,
        instance_slot: Option<SlotIndex>,
    ) -> Self {
        Self {
            name,
            parent,
            depth,
            first_child: None,
            last_child: None,
            next_sibling: None,
            child_index: IndexMap::new(),
            modifiers,
            lifecycle: Lifecycle::new(),
            wirelets,
            extensions: IndexSet::new(),
            region,
            instance_slot,
            slots: instance_slot.into_iter().collect(),
        }
    }
}

/// A region assembly and the node that opened it.
pub(crate) struct RegionEntry {
    pub(crate) assembly: RegionAssembly,
    pub(crate) owner: NodeId,
    /// The node each reserved user slot was reserved for.
    pub(crate) slot_owners: IndexMap<SlotIndex, NodeId>,
}

impl RegionEntry {
    fn new(assembly: RegionAssembly, owner: NodeId) -> Self {
        Self {
            assembly,
            owner,
            slot_owners: IndexMap::new(),
        }
    }

    fn reserve_for(&mut self, node: NodeId) -> Result<SlotIndex, AssemblyError> {
        let slot = self.assembly.reserve()?;
        self.slot_owners.insert(slot, node);
        Ok(slot)
    }
}

/// Ordered iterator over a node's children.
pub struct Children<'a> {
    nodes: &'a [NodeData],
    next: Option<NodeId>,
}

impl<'a> Children<'a> {
    pub(crate) fn over(nodes: &'a [NodeData], first: Option<NodeId>) -> Self {
        Self { nodes, next: first }
    }
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.nodes.get(id.index()).and_then(|n| n.next_sibling);
        Some(id)
    }
}

// ── ConfigTree ─────────────────────────────────────────────────────

/// A tree of configuration nodes and the regions they reserve slots in.
///
/// The root opens a [`RegionLayout::Guest`] region when created with
/// [`Modifiers::GUEST`], a [`RegionLayout::Hosted`] one otherwise. Every
/// guest-bearing descendant opens a guest region of its own; all other
/// nodes share their parent's region.
///
/// Configuration is single-threaded: the tree is `Send` but every
/// mutation takes `&mut self`.
pub struct ConfigTree {
    config: AssemblyConfig,
    nodes: Vec<NodeData>,
    regions: Vec<RegionEntry>,
}

impl ConfigTree {
    /// Id of the root node of every tree.
    pub const ROOT: NodeId = NodeId(0);

    /// Create a tree with the default [`AssemblyConfig`].
    ///
    /// The root is named after its modifiers' default prefix.
    pub fn new(root_modifiers: Modifiers) -> Result<Self, AssemblyError> {
        Self::with_config(AssemblyConfig::default(), root_modifiers)
    }

    /// Create a tree with an explicit config, validated first.
    pub fn with_config(
        config: AssemblyConfig,
        root_modifiers: Modifiers,
    ) -> Result<Self, AssemblyError> {
        config.validate()?;
        let layout = if root_modifiers.is_guest() {
            RegionLayout::Guest
        } else {
            RegionLayout::Hosted
        };
        let assembly = RegionAssembly::with_config(config.region_config(layout))?;
        let mut entry = RegionEntry::new(assembly, Self::ROOT);
        let instance_slot = if root_modifiers.has_source() {
            Some(entry.reserve_for(Self::ROOT)?)
        } else {
            None
        };
        let root = NodeData::new(
            root_modifiers.default_name_prefix().to_string(),
            None,
            0,
            root_modifiers,
            WireletList::new(),
            RegionId(0),
            instance_slot,
        );
        debug!(modifiers = %root_modifiers, layout = ?layout, "configuration tree created");
        Ok(Self {
            config,
            nodes: vec![root],
            regions: vec![entry],
        })
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// The tree's configuration.
    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of regions opened by the tree.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Whether `node` belongs to this tree.
    pub fn contains(&self, node: NodeId) -> bool {
        node.index() < self.nodes.len()
    }

    // ── Structure ──────────────────────────────────────────────────

    /// Install a new child below `parent`.
    ///
    /// Without an explicit `name` the child is named after its modifiers'
    /// default prefix, with a numeric suffix (`1`, `2`, …) if a sibling
    /// already uses the bare prefix. Source-bearing children reserve an
    /// instance slot; guest-bearing children open a region of their own.
    /// Latches [`LifecycleState::ChildInstalled`] on `parent`.
    pub fn create_child(
        &mut self,
        parent: NodeId,
        name: Option<&str>,
        modifiers: Modifiers,
        wirelets: WireletList,
    ) -> Result<NodeId, AssemblyError> {
        let p = self.configurable(parent)?;
        let depth = p.depth + 1;
        if depth > self.config.max_depth {
            return Err(AssemblyError::DepthExceeded {
                depth,
                max: self.config.max_depth,
            });
        }
        let name = match name {
            Some(name) => {
                validate_name(name)?;
                if p.child_index.contains_key(name) {
                    return Err(AssemblyError::DuplicateName {
                        parent: p.name.clone(),
                        name: name.to_string(),
                    });
                }
                name.to_string()
            }
            None => default_name(&p.child_index, modifiers.default_name_prefix()),
        };
        let parent_region = p.region;
        let id = NodeId(self.nodes.len() as u32);

        let (region, instance_slot) = if modifiers.is_guest() {
            let assembly =
                RegionAssembly::with_config(self.config.region_config(RegionLayout::Guest))?;
            let mut entry = RegionEntry::new(assembly, id);
            let slot = if modifiers.has_source() {
                Some(entry.reserve_for(id)?)
            } else {
                None
            };
            let region = RegionId(self.regions.len() as u32);
            self.regions.push(entry);
            (region, slot)
        } else {
            let slot = if modifiers.has_source() {
                Some(self.regions[parent_region.index()].reserve_for(id)?)
            } else {
                None
            };
            (parent_region, slot)
        };

        debug!(
            parent = %parent,
            node = %id,
            name = %name,
            modifiers = %modifiers,
            region = %region,
            "child installed"
        );
        self.nodes.push(NodeData::new(
            name,
            Some(parent),
            depth,
            modifiers,
            wirelets,
            region,
            instance_slot,
        ));
        self.attach(parent, id);
        self.nodes[parent.index()]
            .lifecycle
            .latch(LifecycleState::ChildInstalled);
        Ok(id)
    }

    /// Graft an independently built tree below `parent`.
    ///
    /// The subtree keeps its root's name. Its root region is merged into
    /// `parent`'s region, unless the subtree root is guest-bearing, in
    /// which case it stays a region of its own like every nested guest
    /// region. `wirelets` are appended to the subtree root's own list.
    /// Returns the new id of the subtree root and latches
    /// [`LifecycleState::LinkInvoked`] on `parent`.
    ///
    /// Merging renumbers the subtree's node ids and the slots of its root
    /// region. Ids and raw [`SlotIndex`] values obtained from `subtree`
    /// before linking are stale afterwards; look them up again through
    /// [`child`](Self::child) and [`instance_slot`](Self::instance_slot).
    /// Accessors from [`instance_accessor`](Self::instance_accessor) stay
    /// valid, since regions translate them.
    ///
    /// The subtree is consumed even when linking fails.
    pub fn link(
        &mut self,
        parent: NodeId,
        subtree: ConfigTree,
        mut wirelets: WireletList,
    ) -> Result<NodeId, AssemblyError> {
        let p = self.configurable(parent)?;
        let sub_root = &subtree.nodes[Self::ROOT.index()];
        if sub_root.lifecycle.is_frozen() {
            return Err(AssemblyError::SubtreeFrozen {
                name: sub_root.name.clone(),
            });
        }
        let height = subtree.nodes.iter().map(|n| n.depth).max().unwrap_or(0);
        let depth = p.depth + 1;
        if depth + height > self.config.max_depth {
            return Err(AssemblyError::DepthExceeded {
                depth: depth + height,
                max: self.config.max_depth,
            });
        }
        if p.child_index.contains_key(&sub_root.name) {
            return Err(AssemblyError::DuplicateName {
                parent: p.name.clone(),
                name: sub_root.name.clone(),
            });
        }
        let parent_region = p.region;
        let node_offset = self.nodes.len() as u32;
        let shift = |id: NodeId| NodeId(id.0 + node_offset);

        // Regions first: absorbing is the last step that can fail.
        let ConfigTree {
            nodes: sub_nodes,
            regions: sub_regions,
            ..
        } = subtree;
        let mut region_map = Vec::with_capacity(sub_regions.len());
        let mut slot_remap = None;
        let mut separate = Vec::new();
        for (i, entry) in sub_regions.into_iter().enumerate() {
            if i == 0 && entry.assembly.layout() != RegionLayout::Guest {
                let host = &mut self.regions[parent_region.index()];
                let remap = host.assembly.absorb(entry.assembly)?;
                for (slot, owner) in entry.slot_owners {
                    host.slot_owners.insert(remap.get(slot).unwrap_or(slot), shift(owner));
                }
                slot_remap = Some(remap);
                region_map.push(parent_region);
            } else {
                region_map.push(RegionId((self.regions.len() + separate.len()) as u32));
                separate.push(RegionEntry {
                    assembly: entry.assembly,
                    owner: shift(entry.owner),
                    slot_owners: entry
                        .slot_owners
                        .into_iter()
                        .map(|(slot, owner)| (slot, shift(owner)))
                        .collect(),
                });
            }
        }
        self.regions.extend(separate);

        let linked_root = NodeId(node_offset);
        for (i, mut node) in sub_nodes.into_iter().enumerate() {
            node.parent = if i == 0 {
                Some(parent)
            } else {
                node.parent.map(shift)
            };
            node.first_child = node.first_child.map(shift);
            node.last_child = node.last_child.map(shift);
            node.next_sibling = node.next_sibling.map(shift);
            for child in node.child_index.values_mut() {
                *child = shift(*child);
            }
            node.depth += depth;
            if let (Some(remap), RegionId(0)) = (&slot_remap, node.region) {
                node.instance_slot = node.instance_slot.map(|s| remap.get(s).unwrap_or(s));
                for slot in node.slots.iter_mut() {
                    *slot = remap.get(*slot).unwrap_or(*slot);
                }
            }
            node.region = region_map[node.region.index()];
            if i == 0 {
                node.wirelets.extend(std::mem::take(&mut wirelets));
            }
            self.nodes.push(node);
        }

        debug!(
            parent = %parent,
            node = %linked_root,
            nodes = self.nodes.len() as u32 - node_offset,
            merged_region = slot_remap.is_some(),
            "subtree linked"
        );
        self.attach(parent, linked_root);
        self.nodes[parent.index()]
            .lifecycle
            .latch(LifecycleState::LinkInvoked);
        Ok(linked_root)
    }

    /// Freeze `node` and all its descendants. Idempotent.
    ///
    /// With [`AssemblyConfig::require_wirelets_consumed`] set, fails
    /// before freezing anything if a node in the subtree still carries
    /// unconsumed wirelets. Regions opened by frozen nodes are frozen too.
    pub fn freeze(&mut self, node: NodeId) -> Result<(), AssemblyError> {
        if self.data(node)?.lifecycle.is_frozen() {
            return Ok(());
        }
        let subtree = self.descendants(node);
        if self.config.require_wirelets_consumed {
            for &id in &subtree {
                if let Err(source) = self.nodes[id.index()].wirelets.ensure_consumed() {
                    return Err(AssemblyError::Wirelet {
                        name: self.peek_path(id)?,
                        source,
                    });
                }
            }
        }
        for &id in &subtree {
            self.nodes[id.index()].lifecycle.freeze();
        }
        let mut frozen_regions = 0usize;
        for entry in self.regions.iter_mut() {
            if !entry.assembly.is_frozen() && self.nodes[entry.owner.index()].lifecycle.is_frozen()
            {
                entry.assembly.freeze();
                frozen_regions += 1;
            }
        }
        debug!(
            node = %node,
            nodes = subtree.len(),
            regions = frozen_regions,
            "subtree frozen"
        );
        Ok(())
    }

    /// Freeze the whole tree and compile it into a reusable [`Image`].
    pub fn into_image(mut self) -> Result<Image, AssemblyError> {
        self.freeze(Self::ROOT)?;
        Image::compile(self.nodes, self.regions)
    }

    // ── Names ──────────────────────────────────────────────────────

    /// Rename `node`.
    ///
    /// Only legal while no latch has fired on the node; otherwise fails
    /// with [`AssemblyError::NameLocked`] naming the blocking latch. A read
    /// name is always reported as [`LifecycleState::NameRead`], whichever
    /// latch fired first. Latches [`LifecycleState::NameSet`].
    pub fn set_name(&mut self, node: NodeId, name: &str) -> Result<(), AssemblyError> {
        let data = self.configurable(node)?;
        if let Some(state) = data.lifecycle.rename_blocker() {
            return Err(AssemblyError::NameLocked {
                name: data.name.clone(),
                state,
            });
        }
        validate_name(name)?;
        let parent = data.parent;
        if let Some(parent) = parent {
            let p = &self.nodes[parent.index()];
            if p.child_index.get(name).is_some_and(|&id| id != node) {
                return Err(AssemblyError::DuplicateName {
                    parent: p.name.clone(),
                    name: name.to_string(),
                });
            }
        }

        let data = &mut self.nodes[node.index()];
        let old = std::mem::replace(&mut data.name, name.to_string());
        data.lifecycle.latch(LifecycleState::NameSet);
        if let Some(parent) = parent {
            let index = &mut self.nodes[parent.index()].child_index;
            index.shift_remove(&old);
            index.insert(name.to_string(), node);
        }
        debug!(node = %node, from = %old, to = %name, "node renamed");
        Ok(())
    }

    /// The node's name. Latches [`LifecycleState::NameRead`].
    pub fn name(&mut self, node: NodeId) -> Result<&str, AssemblyError> {
        let data = self.data_mut(node)?;
        data.lifecycle.latch(LifecycleState::NameRead);
        Ok(&data.name)
    }

    /// The node's name without latching anything. For diagnostics.
    pub fn peek_name(&self, node: NodeId) -> Result<&str, AssemblyError> {
        Ok(&self.data(node)?.name)
    }

    /// `/`-separated path from the root to `node`.
    ///
    /// Latches [`LifecycleState::NameRead`] on the node and every
    /// ancestor, since all their names become part of the result.
    pub fn path(&mut self, node: NodeId) -> Result<String, AssemblyError> {
        let path = self.peek_path(node)?;
        let mut current = Some(node);
        while let Some(id) = current {
            let data = &mut self.nodes[id.index()];
            data.lifecycle.latch(LifecycleState::NameRead);
            current = data.parent;
        }
        Ok(path)
    }

    /// Like [`path`](Self::path), without latching anything.
    pub fn peek_path(&self, node: NodeId) -> Result<String, AssemblyError> {
        let mut names = vec![self.data(node)?.name.as_str()];
        let mut current = self.nodes[node.index()].parent;
        while let Some(id) = current {
            let data = &self.nodes[id.index()];
            names.push(&data.name);
            current = data.parent;
        }
        names.reverse();
        Ok(names.join(PATH_SEPARATOR))
    }

    // ── Extensions and wirelets ────────────────────────────────────

    /// Record that `extension` is used on `node`.
    ///
    /// Returns `false` if it was already in use. Latches
    /// [`LifecycleState::ExtensionUsed`] either way.
    pub fn use_extension(
        &mut self,
        node: NodeId,
        extension: impl Into<String>,
    ) -> Result<bool, AssemblyError> {
        self.configurable(node)?;
        let extension = extension.into();
        let data = &mut self.nodes[node.index()];
        data.lifecycle.latch(LifecycleState::ExtensionUsed);
        let added = data.extensions.insert(extension.clone());
        debug!(node = %node, extension = %extension, added, "extension used");
        Ok(added)
    }

    /// Extensions used on `node`, in first-use order.
    pub fn extensions(
        &self,
        node: NodeId,
    ) -> Result<impl Iterator<Item = &str> + '_, AssemblyError> {
        Ok(self.data(node)?.extensions.iter().map(String::as_str))
    }

    /// Wirelets attached to `node`.
    pub fn wirelets(&self, node: NodeId) -> Result<&WireletList, AssemblyError> {
        Ok(&self.data(node)?.wirelets)
    }

    /// Mutable wirelets of `node`, for consuming them.
    pub fn wirelets_mut(&mut self, node: NodeId) -> Result<&mut WireletList, AssemblyError> {
        Ok(&mut self.data_mut(node)?.wirelets)
    }

    // ── Slots ──────────────────────────────────────────────────────

    /// Reserve an extra slot for `node` in its region.
    pub fn reserve_slot(&mut self, node: NodeId) -> Result<SlotIndex, AssemblyError> {
        let region = self.configurable(node)?.region;
        let slot = self.regions[region.index()].reserve_for(node)?;
        self.nodes[node.index()].slots.push(slot);
        Ok(slot)
    }

    /// Register the producer for `node`'s instance slot.
    pub fn provide_instance<P>(
        &mut self,
        node: NodeId,
        dependencies: impl IntoIterator<Item = SlotIndex>,
        producer: P,
    ) -> Result<SlotIndex, AssemblyError>
    where
        P: Producer + 'static,
    {
        let data = self.configurable(node)?;
        let slot = data
            .instance_slot
            .ok_or_else(|| AssemblyError::NoInstanceSlot {
                name: data.name.clone(),
            })?;
        let region = data.region;
        self.regions[region.index()]
            .assembly
            .provide(slot, dependencies, producer)?;
        Ok(slot)
    }

    /// Register the producer for any slot of `node`'s region.
    ///
    /// Slots reserved for a frozen node are rejected with
    /// [`AssemblyError::NotConfigurable`], even from an unfrozen node.
    pub fn provide<P>(
        &mut self,
        node: NodeId,
        slot: SlotIndex,
        dependencies: impl IntoIterator<Item = SlotIndex>,
        producer: P,
    ) -> Result<(), AssemblyError>
    where
        P: Producer + 'static,
    {
        let region = self.configurable(node)?.region;
        self.ensure_slot_open(region, slot)?;
        self.regions[region.index()]
            .assembly
            .provide(slot, dependencies, producer)?;
        Ok(())
    }

    /// Export a slot of `node`'s region as a service under `key`.
    ///
    /// Same ownership rule as [`provide`](Self::provide).
    pub fn export(
        &mut self,
        node: NodeId,
        key: impl Into<String>,
        slot: SlotIndex,
    ) -> Result<(), AssemblyError> {
        let region = self.configurable(node)?.region;
        self.ensure_slot_open(region, slot)?;
        self.regions[region.index()].assembly.export(key, slot)?;
        Ok(())
    }

    /// Typed accessor for `node`'s instance slot.
    ///
    /// Bound to the region assembly the slot was reserved in; it keeps
    /// reading the same slot after this tree is linked into another one.
    pub fn instance_accessor<T: Any + Send + Sync>(
        &self,
        node: NodeId,
    ) -> Result<SlotAccessor<T>, AssemblyError> {
        let data = self.data(node)?;
        let slot = data
            .instance_slot
            .ok_or_else(|| AssemblyError::NoInstanceSlot {
                name: data.name.clone(),
            })?;
        Ok(self.regions[data.region.index()].assembly.accessor(slot)?)
    }

    /// The node's instance slot, `None` unless it is source-bearing.
    pub fn instance_slot(&self, node: NodeId) -> Result<Option<SlotIndex>, AssemblyError> {
        Ok(self.data(node)?.instance_slot)
    }

    /// Every slot reserved on behalf of `node`, instance slot first.
    pub fn slots(&self, node: NodeId) -> Result<&[SlotIndex], AssemblyError> {
        Ok(&self.data(node)?.slots)
    }

    /// The region `node` reserves its slots in.
    pub fn region_of(&self, node: NodeId) -> Result<RegionId, AssemblyError> {
        Ok(self.data(node)?.region)
    }

    /// A region's assembly, for inspection.
    pub fn region(&self, region: RegionId) -> Option<&RegionAssembly> {
        self.regions.get(region.index()).map(|e| &e.assembly)
    }

    // ── Read-only queries ──────────────────────────────────────────

    /// Children of `node` in installation order. Empty for unknown ids.
    pub fn children(&self, node: NodeId) -> Children<'_> {
        Children::over(
            &self.nodes,
            self.nodes.get(node.index()).and_then(|n| n.first_child),
        )
    }

    /// The child of `parent` called `name`.
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes
            .get(parent.index())
            .and_then(|p| p.child_index.get(name).copied())
    }

    /// The parent of `node`; `None` for the root and unknown ids.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.index()).and_then(|n| n.parent)
    }

    /// Depth of `node`; the root is 0.
    pub fn depth(&self, node: NodeId) -> Result<u32, AssemblyError> {
        Ok(self.data(node)?.depth)
    }

    /// Modifiers `node` was created with.
    pub fn modifiers(&self, node: NodeId) -> Result<Modifiers, AssemblyError> {
        Ok(self.data(node)?.modifiers)
    }

    /// Lifecycle state of `node`.
    pub fn state(&self, node: NodeId) -> Result<LifecycleState, AssemblyError> {
        Ok(self.data(node)?.lifecycle.state())
    }

    /// Every latch that has fired on `node`.
    pub fn latches(&self, node: NodeId) -> Result<Latches, AssemblyError> {
        Ok(self.data(node)?.lifecycle.latches())
    }

    /// The node `slot` of `region` was reserved for, if any.
    pub fn slot_owner(&self, region: RegionId, slot: SlotIndex) -> Option<NodeId> {
        self.regions
            .get(region.index())
            .and_then(|e| e.slot_owners.get(&slot).copied())
    }

    // ── Internals ──────────────────────────────────────────────────

    fn data(&self, node: NodeId) -> Result<&NodeData, AssemblyError> {
        self.nodes
            .get(node.index())
            .ok_or(AssemblyError::UnknownNode { node })
    }

    fn data_mut(&mut self, node: NodeId) -> Result<&mut NodeData, AssemblyError> {
        self.nodes
            .get_mut(node.index())
            .ok_or(AssemblyError::UnknownNode { node })
    }

    fn configurable(&self, node: NodeId) -> Result<&NodeData, AssemblyError> {
        let data = self.data(node)?;
        if data.lifecycle.is_frozen() {
            return Err(AssemblyError::NotConfigurable {
                name: data.name.clone(),
            });
        }
        Ok(data)
    }

    fn ensure_slot_open(&self, region: RegionId, slot: SlotIndex) -> Result<(), AssemblyError> {
        match self.regions[region.index()].slot_owners.get(&slot) {
            Some(&owner) => self.configurable(owner).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Append `child` to `parent`'s sibling list and name index.
    fn attach(&mut self, parent: NodeId, child: NodeId) {
        let name = self.nodes[child.index()].name.clone();
        let p = &mut self.nodes[parent.index()];
        let previous = p.last_child.replace(child);
        if p.first_child.is_none() {
            p.first_child = Some(child);
        }
        p.child_index.insert(name, child);
        if let Some(previous) = previous {
            self.nodes[previous.index()].next_sibling = Some(child);
        }
    }

    /// `node` and its descendants in pre-order.
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            out.push(id);
            let mut children: SmallVec<[NodeId; 8]> = self.children(id).collect();
            children.reverse();
            stack.extend(children);
        }
        out
    }
}

impl std::fmt::Debug for ConfigTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigTree")
            .field("root", &self.nodes[Self::ROOT.index()].name)
            .field("nodes", &self.nodes.len())
            .field("regions", &self.regions.len())
            .finish()
    }
}

fn validate_name(name: &str) -> Result<(), AssemblyError> {
    let reason = if name.is_empty() {
        "names must not be empty"
    } else if name.contains(PATH_SEPARATOR) {
        "names must not contain '/'"
    } else {
        return Ok(());
    };
    Err(AssemblyError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

fn default_name(siblings: &IndexMap<String, NodeId>, prefix: &str) -> String {
    if !siblings.contains_key(prefix) {
        return prefix.to_string();
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{prefix}{n}");
        if !siblings.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_region::{constant, RegionError};

    fn tree() -> ConfigTree {
        ConfigTree::new(Modifiers::APPLICATION | Modifiers::CONTAINER).unwrap()
    }

    fn leaf() -> Modifiers {
        Modifiers::SOURCE
    }

    #[test]
    fn root_uses_default_prefix() {
        let mut t = tree();
        assert_eq!(t.name(ConfigTree::ROOT).unwrap(), "Application");
        assert_eq!(t.depth(ConfigTree::ROOT).unwrap(), 0);
        assert_eq!(t.parent(ConfigTree::ROOT), None);
    }

    #[test]
    fn name_read_blocks_rename() {
        let mut t = tree();
        let a = t.create_child(t.root(), None, leaf(), WireletList::new()).unwrap();
        assert_eq!(t.name(a).unwrap(), "Component");
        match t.set_name(a, "x") {
            Err(AssemblyError::NameLocked { name, state }) => {
                assert_eq!(name, "Component");
                assert_eq!(state, LifecycleState::NameRead);
            }
            other => panic!("expected NameLocked, got {other:?}"),
        }
        assert_eq!(t.peek_name(a).unwrap(), "Component");
    }

    #[test]
    fn each_latch_reports_itself() {
        let mut t = tree();
        let a = t.create_child(t.root(), Some("a"), leaf(), WireletList::new()).unwrap();
        t.use_extension(a, "web").unwrap();
        assert!(matches!(
            t.set_name(a, "b"),
            Err(AssemblyError::NameLocked {
                state: LifecycleState::ExtensionUsed,
                ..
            })
        ));

        // The root latched ChildInstalled when `a` was created.
        assert!(matches!(
            t.set_name(t.root(), "app"),
            Err(AssemblyError::NameLocked {
                state: LifecycleState::ChildInstalled,
                ..
            })
        ));

        let b = t.create_child(t.root(), Some("b"), leaf(), WireletList::new()).unwrap();
        t.set_name(b, "c").unwrap();
        assert!(matches!(
            t.set_name(b, "d"),
            Err(AssemblyError::NameLocked {
                state: LifecycleState::NameSet,
                ..
            })
        ));
        assert_eq!(t.child(t.root(), "c"), Some(b));
        assert_eq!(t.child(t.root(), "b"), None);
    }

    #[test]
    fn duplicate_child_is_rejected_without_mutation() {
        let mut t = tree();
        let a = t.create_child(t.root(), Some("a"), leaf(), WireletList::new()).unwrap();
        let slots_before = t.region(RegionId(0)).unwrap().len();
        let err = t
            .create_child(t.root(), Some("a"), leaf(), WireletList::new())
            .unwrap_err();
        assert_eq!(
            err,
            AssemblyError::DuplicateName {
                parent: "Application".into(),
                name: "a".into()
            }
        );
        assert_eq!(t.children(t.root()).collect::<Vec<_>>(), [a]);
        assert_eq!(t.node_count(), 2);
        assert_eq!(t.region(RegionId(0)).unwrap().len(), slots_before);
    }

    #[test]
    fn default_names_get_numeric_suffixes() {
        let mut t = tree();
        let root = t.root();
        let names: Vec<String> = (0..3)
            .map(|_| {
                let id = t.create_child(root, None, leaf(), WireletList::new()).unwrap();
                t.peek_name(id).unwrap().to_string()
            })
            .collect();
        assert_eq!(names, ["Component", "Component1", "Component2"]);
        let c = t
            .create_child(root, None, Modifiers::CONTAINER, WireletList::new())
            .unwrap();
        assert_eq!(t.peek_name(c).unwrap(), "Container");
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut t = tree();
        for bad in ["", "a/b"] {
            assert!(matches!(
                t.create_child(t.root(), Some(bad), leaf(), WireletList::new()),
                Err(AssemblyError::InvalidName { .. })
            ));
        }
        assert_eq!(t.node_count(), 1);
    }

    #[test]
    fn children_keep_installation_order_across_renames() {
        let mut t = tree();
        let root = t.root();
        let ids: Vec<NodeId> = ["z", "y", "x"]
            .iter()
            .map(|n| t.create_child(root, Some(*n), leaf(), WireletList::new()).unwrap())
            .collect();
        t.set_name(ids[0], "renamed").unwrap();
        assert_eq!(t.children(root).collect::<Vec<_>>(), ids);
        assert_eq!(t.child(root, "renamed"), Some(ids[0]));
    }

    #[test]
    fn depth_limit_is_enforced() {
        let config = AssemblyConfig {
            max_depth: 2,
            ..AssemblyConfig::default()
        };
        let mut t = ConfigTree::with_config(config, Modifiers::CONTAINER).unwrap();
        let a = t.create_child(t.root(), None, Modifiers::CONTAINER, WireletList::new()).unwrap();
        let b = t.create_child(a, None, Modifiers::CONTAINER, WireletList::new()).unwrap();
        assert_eq!(t.depth(b).unwrap(), 2);
        assert_eq!(
            t.create_child(b, None, leaf(), WireletList::new()),
            Err(AssemblyError::DepthExceeded { depth: 3, max: 2 })
        );
    }

    #[test]
    fn freeze_is_recursive_and_idempotent() {
        let mut t = tree();
        let a = t
            .create_child(t.root(), Some("a"), Modifiers::CONTAINER, WireletList::new())
            .unwrap();
        let b = t.create_child(a, Some("b"), leaf(), WireletList::new()).unwrap();
        t.freeze(t.root()).unwrap();
        let states: Vec<_> = [t.root(), a, b].iter().map(|&n| t.state(n).unwrap()).collect();
        t.freeze(t.root()).unwrap();
        let again: Vec<_> = [t.root(), a, b].iter().map(|&n| t.state(n).unwrap()).collect();
        assert_eq!(states, again);
        assert!(states.iter().all(|s| *s == LifecycleState::Frozen));
        assert!(t.region(RegionId(0)).unwrap().is_frozen());
    }

    #[test]
    fn frozen_nodes_reject_every_mutation_uniformly() {
        let mut t = tree();
        let a = t.create_child(t.root(), Some("a"), leaf(), WireletList::new()).unwrap();
        t.freeze(a).unwrap();
        let expected = AssemblyError::NotConfigurable { name: "a".into() };

        assert_eq!(t.set_name(a, "b").unwrap_err(), expected);
        assert_eq!(
            t.create_child(a, None, leaf(), WireletList::new()).unwrap_err(),
            expected
        );
        assert_eq!(t.use_extension(a, "x").unwrap_err(), expected);
        assert_eq!(t.reserve_slot(a).unwrap_err(), expected);
        assert_eq!(
            t.provide_instance(a, [], constant(1u8)).unwrap_err(),
            expected
        );

        // Reads still work and the unfrozen parent stays configurable.
        assert_eq!(t.name(a).unwrap(), "a");
        assert!(t.create_child(t.root(), Some("b"), leaf(), WireletList::new()).is_ok());
    }

    #[test]
    fn path_latches_ancestors() {
        let mut t = tree();
        let a = t
            .create_child(t.root(), Some("a"), Modifiers::CONTAINER, WireletList::new())
            .unwrap();
        let b = t.create_child(a, Some("b"), leaf(), WireletList::new()).unwrap();
        assert_eq!(t.peek_path(b).unwrap(), "Application/a/b");
        assert_eq!(t.state(b).unwrap(), LifecycleState::Initial);
        assert_eq!(t.path(b).unwrap(), "Application/a/b");
        assert_eq!(t.state(b).unwrap(), LifecycleState::NameRead);

        // `a` latched ChildInstalled first; the read is recorded regardless.
        assert_eq!(t.state(a).unwrap(), LifecycleState::ChildInstalled);
        for node in [t.root(), a] {
            assert!(t.latches(node).unwrap().contains(Latches::NAME_READ));
            match t.set_name(node, "renamed") {
                Err(AssemblyError::NameLocked { state, .. }) => {
                    assert_eq!(state, LifecycleState::NameRead)
                }
                other => panic!("expected NameLocked, got {other:?}"),
            }
        }
    }

    #[test]
    fn name_read_after_child_install_still_blocks_as_read() {
        let mut t = tree();
        let a = t
            .create_child(t.root(), Some("a"), Modifiers::CONTAINER, WireletList::new())
            .unwrap();
        t.create_child(a, Some("b"), leaf(), WireletList::new()).unwrap();
        assert_eq!(t.name(a).unwrap(), "a");
        assert_eq!(
            t.set_name(a, "x"),
            Err(AssemblyError::NameLocked {
                name: "a".into(),
                state: LifecycleState::NameRead,
            })
        );
        assert_eq!(t.peek_name(a).unwrap(), "a");
        assert_eq!(
            t.latches(a).unwrap(),
            Latches::CHILD_INSTALLED | Latches::NAME_READ
        );
    }

    #[test]
    fn provide_and_export_reject_slots_of_frozen_nodes() {
        let mut t = tree();
        let a = t.create_child(t.root(), Some("a"), leaf(), WireletList::new()).unwrap();
        let slot = t.instance_slot(a).unwrap().unwrap();
        assert_eq!(t.slot_owner(RegionId(0), slot), Some(a));
        t.freeze(a).unwrap();

        let expected = AssemblyError::NotConfigurable { name: "a".into() };
        assert_eq!(
            t.provide(t.root(), slot, [], constant(5u8)),
            Err(expected.clone())
        );
        assert_eq!(t.export(t.root(), "a", slot), Err(expected));
        assert!(!t.region(RegionId(0)).unwrap().is_provided(slot));

        // Slots of unfrozen nodes can still be wired by their parent.
        let b = t.create_child(t.root(), Some("b"), leaf(), WireletList::new()).unwrap();
        let b_slot = t.instance_slot(b).unwrap().unwrap();
        t.provide(t.root(), b_slot, [slot], constant(6u8)).unwrap();
        t.export(t.root(), "b", b_slot).unwrap();
    }

    #[test]
    fn linked_slots_keep_their_owners() {
        let mut sub = ConfigTree::new(Modifiers::CONTAINER).unwrap();
        let x = sub.create_child(sub.root(), Some("x"), leaf(), WireletList::new()).unwrap();
        sub.freeze(x).unwrap();

        let mut t = tree();
        t.create_child(t.root(), Some("own"), leaf(), WireletList::new()).unwrap();
        let linked = t.link(t.root(), sub, WireletList::new()).unwrap();
        let x = t.child(linked, "x").unwrap();
        let slot = t.instance_slot(x).unwrap().unwrap();
        assert_eq!(t.slot_owner(RegionId(0), slot), Some(x));
        assert_eq!(
            t.provide(t.root(), slot, [], constant(1u8)),
            Err(AssemblyError::NotConfigurable { name: "x".into() })
        );
    }

    #[test]
    fn unconsumed_wirelets_block_freeze() {
        let mut t = tree();
        let a = t
            .create_child(t.root(), Some("a"), leaf(), WireletList::new().with(5u32))
            .unwrap();
        match t.freeze(t.root()) {
            Err(AssemblyError::Wirelet { name, .. }) => assert_eq!(name, "Application/a"),
            other => panic!("expected Wirelet, got {other:?}"),
        }
        assert_eq!(t.state(a).unwrap(), LifecycleState::Initial);

        assert_eq!(*t.wirelets_mut(a).unwrap().consume::<u32>().unwrap(), 5);
        t.freeze(t.root()).unwrap();
    }

    #[test]
    fn source_children_reserve_slots_in_shared_region() {
        let mut t = tree();
        let a = t.create_child(t.root(), Some("a"), leaf(), WireletList::new()).unwrap();
        let b = t.create_child(t.root(), Some("b"), leaf(), WireletList::new()).unwrap();
        let plain = t
            .create_child(t.root(), Some("c"), Modifiers::CONTAINER, WireletList::new())
            .unwrap();
        assert_eq!(t.instance_slot(a).unwrap(), Some(SlotIndex(1)));
        assert_eq!(t.instance_slot(b).unwrap(), Some(SlotIndex(2)));
        assert_eq!(t.instance_slot(plain).unwrap(), None);
        assert!(matches!(
            t.provide_instance(plain, [], constant(())),
            Err(AssemblyError::NoInstanceSlot { .. })
        ));
        assert_eq!(t.region_of(b).unwrap(), RegionId(0));
    }

    #[test]
    fn guest_children_open_their_own_region() {
        let mut t = tree();
        let g = t
            .create_child(
                t.root(),
                Some("worker"),
                Modifiers::GUEST | Modifiers::SOURCE,
                WireletList::new(),
            )
            .unwrap();
        let inner = t.create_child(g, Some("inner"), leaf(), WireletList::new()).unwrap();
        assert_eq!(t.region_count(), 2);
        assert_eq!(t.region_of(g).unwrap(), RegionId(1));
        assert_eq!(t.region_of(inner).unwrap(), RegionId(1));
        assert_eq!(t.instance_slot(g).unwrap(), Some(SlotIndex(2)));
        assert_eq!(t.instance_slot(inner).unwrap(), Some(SlotIndex(3)));
        assert_eq!(t.region(RegionId(1)).unwrap().layout(), RegionLayout::Guest);
    }

    #[test]
    fn provide_rejects_well_known_slot() {
        let mut t = tree();
        assert_eq!(
            t.provide(t.root(), SlotIndex(0), [], constant(())),
            Err(AssemblyError::Region(RegionError::WellKnownSlot {
                slot: SlotIndex(0)
            }))
        );
    }

    #[test]
    fn link_grafts_and_renumbers() {
        let mut sub = ConfigTree::new(Modifiers::CONTAINER).unwrap();
        sub.set_name(sub.root(), "plugin").unwrap();
        let x = sub.create_child(sub.root(), Some("x"), leaf(), WireletList::new()).unwrap();
        sub.provide_instance(x, [], constant(7u16)).unwrap();
        let extra = sub.reserve_slot(x).unwrap();
        assert_eq!(extra, SlotIndex(2));

        let mut t = tree();
        let a = t.create_child(t.root(), Some("a"), leaf(), WireletList::new()).unwrap();
        let linked = t.link(t.root(), sub, WireletList::new()).unwrap();

        assert_eq!(t.state(t.root()).unwrap(), LifecycleState::ChildInstalled);
        assert_eq!(t.children(t.root()).collect::<Vec<_>>(), [a, linked]);
        assert_eq!(t.parent(linked), Some(t.root()));
        assert_eq!(t.depth(linked).unwrap(), 1);

        let x = t.child(linked, "x").unwrap();
        assert_eq!(t.depth(x).unwrap(), 2);
        assert_eq!(t.region_of(x).unwrap(), RegionId(0));
        // Hosted root region has slot 0 + `a`; the subtree's slots follow.
        assert_eq!(t.instance_slot(x).unwrap(), Some(SlotIndex(2)));
        assert_eq!(t.slots(x).unwrap(), [SlotIndex(2), SlotIndex(3)]);
        assert_eq!(t.peek_path(x).unwrap(), "Application/plugin/x");
    }

    #[test]
    fn link_latches_link_invoked_first() {
        let sub = ConfigTree::new(Modifiers::CONTAINER).unwrap();
        let mut t = tree();
        t.link(t.root(), sub, WireletList::new()).unwrap();
        assert_eq!(t.state(t.root()).unwrap(), LifecycleState::LinkInvoked);
    }

    #[test]
    fn link_rejects_frozen_and_duplicate_subtrees() {
        let mut frozen = ConfigTree::new(Modifiers::CONTAINER).unwrap();
        frozen.freeze(frozen.root()).unwrap();
        let mut t = tree();
        assert!(matches!(
            t.link(t.root(), frozen, WireletList::new()),
            Err(AssemblyError::SubtreeFrozen { .. })
        ));

        t.create_child(t.root(), Some("Container"), leaf(), WireletList::new())
            .unwrap();
        let clash = ConfigTree::new(Modifiers::CONTAINER).unwrap();
        assert!(matches!(
            t.link(t.root(), clash, WireletList::new()),
            Err(AssemblyError::DuplicateName { .. })
        ));
        assert_eq!(t.node_count(), 2);
    }

    #[test]
    fn link_keeps_guest_subtree_region_separate() {
        let mut sub = ConfigTree::new(Modifiers::GUEST | Modifiers::CONTAINER).unwrap();
        sub.create_child(sub.root(), Some("svc"), leaf(), WireletList::new())
            .unwrap();
        let mut t = tree();
        let linked = t
            .link(t.root(), sub, WireletList::new().with("cfg"))
            .unwrap();
        assert_eq!(t.region_count(), 2);
        assert_eq!(t.region_of(linked).unwrap(), RegionId(1));
        let svc = t.child(linked, "svc").unwrap();
        assert_eq!(t.instance_slot(svc).unwrap(), Some(SlotIndex(2)));
        assert_eq!(t.wirelets(linked).unwrap().len(), 1);
    }
}
