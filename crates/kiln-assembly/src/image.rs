//! Compiled, immutable blueprints of a configuration tree.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use kiln_core::{NodeId, RegionId, WireletList};
use kiln_region::{MaterializeContext, RegionPlan};
use tracing::debug;

use crate::error::AssemblyError;
use crate::runtime::{Instance, RuntimeNode};
use crate::tree::{Children, NodeData, RegionEntry, PATH_SEPARATOR};

struct ImageInner {
    nodes: Box<[RuntimeNode]>,
    paths: IndexMap<String, NodeId>,
    plans: Box<[RegionPlan]>,
    /// Node that opened each region; names the region's guest.
    owners: Box<[NodeId]>,
}

/// The frozen blueprint of a configured tree.
///
/// Holds the runtime node tree and one [`RegionPlan`] per region. Cloning
/// is cheap and clones share everything; the image never changes after
/// [`ConfigTree::into_image`](crate::ConfigTree::into_image).
#[derive(Clone)]
pub struct Image {
    inner: Arc<ImageInner>,
}

// Compile-time assertion: images can be launched from any thread.
const _: () = {
    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send_sync::<Image>();
    }
};

impl Image {
    pub(crate) fn compile(
        nodes: Vec<NodeData>,
        regions: Vec<RegionEntry>,
    ) -> Result<Self, AssemblyError> {
        let mut plans = Vec::with_capacity(regions.len());
        let mut owners = Vec::with_capacity(regions.len());
        for entry in &regions {
            plans.push(entry.assembly.plan()?);
            owners.push(entry.owner);
        }

        // Parents always precede their children in the arena, so paths
        // can be built in a single forward pass.
        let mut paths: IndexMap<String, NodeId> = IndexMap::with_capacity(nodes.len());
        let mut node_paths: Vec<String> = Vec::with_capacity(nodes.len());
        let mut runtime = Vec::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            let id = NodeId(i as u32);
            let path = match node.parent {
                Some(parent) => {
                    format!("{}{PATH_SEPARATOR}{}", node_paths[parent.index()], node.name)
                }
                None => node.name.clone(),
            };
            let children: Vec<NodeId> = Children::over(&nodes, node.first_child).collect();
            runtime.push(RuntimeNode {
                id,
                name: node.name.clone(),
                path: path.clone(),
                parent: node.parent,
                depth: node.depth,
                modifiers: node.modifiers,
                region: node.region,
                instance_slot: node.instance_slot,
                slots: node.slots.iter().copied().collect(),
                children: children.into(),
                extensions: node.extensions.iter().cloned().collect(),
            });
            paths.insert(path.clone(), id);
            node_paths.push(path);
        }

        debug!(
            nodes = runtime.len(),
            regions = plans.len(),
            "image compiled"
        );
        Ok(Self {
            inner: Arc::new(ImageInner {
                nodes: runtime.into(),
                paths,
                plans: plans.into(),
                owners: owners.into(),
            }),
        })
    }

    /// Materialize every region into a fresh, independent [`Instance`].
    ///
    /// Each guest-bearing region gets a new [`Guest`](kiln_region::Guest)
    /// named after the path of the node that opened it. `wirelets` are
    /// visible to every producer through
    /// [`MaterializeContext::wirelets`].
    pub fn launch(&self, wirelets: WireletList) -> Result<Instance, AssemblyError> {
        let mut regions = Vec::with_capacity(self.inner.plans.len());
        for (plan, owner) in self.inner.plans.iter().zip(self.inner.owners.iter()) {
            let name = &self.inner.nodes[owner.index()].path;
            let ctx = MaterializeContext::new(name.clone()).with_wirelets(wirelets.clone());
            regions.push(plan.materialize(&ctx)?.into_shared());
        }
        debug!(
            root = %self.root().path(),
            regions = regions.len(),
            "image launched"
        );
        Ok(Instance::new(self.clone(), regions))
    }

    /// The root node.
    pub fn root(&self) -> &RuntimeNode {
        &self.inner.nodes[0]
    }

    /// A node by id.
    pub fn node(&self, id: NodeId) -> Option<&RuntimeNode> {
        self.inner.nodes.get(id.index())
    }

    /// A node by its `/`-separated path, root name first.
    pub fn find(&self, path: &str) -> Option<&RuntimeNode> {
        self.inner
            .paths
            .get(path)
            .and_then(|id| self.node(*id))
    }

    /// All nodes in arena order; parents precede their children.
    pub fn nodes(&self) -> impl Iterator<Item = &RuntimeNode> + '_ {
        self.inner.nodes.iter()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.nodes.len()
    }

    /// The plan of one region.
    pub fn plan(&self, region: RegionId) -> Option<&RegionPlan> {
        self.inner.plans.get(region.index())
    }

    /// Number of regions every launch materializes.
    pub fn region_count(&self) -> usize {
        self.inner.plans.len()
    }

    /// The node that opened `region`.
    pub fn region_owner(&self, region: RegionId) -> Option<NodeId> {
        self.inner.owners.get(region.index()).copied()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("root", &self.root().path())
            .field("nodes", &self.inner.nodes.len())
            .field("regions", &self.inner.plans.len())
            .finish()
    }
}
