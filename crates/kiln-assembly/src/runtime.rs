//! The runtime host tree: launched instances of an [`Image`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use kiln_core::{Modifiers, NodeId, RegionId, SlotIndex};
use kiln_region::{Guest, RegionError, SharedRegion};
use tracing::warn;

use crate::error::AssemblyError;
use crate::image::Image;

// ── RuntimeNode ────────────────────────────────────────────────────

/// Frozen counterpart of a configuration node.
///
/// Carries no live objects, only the slots the node owns in its region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeNode {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) depth: u32,
    pub(crate) modifiers: Modifiers,
    pub(crate) region: RegionId,
    pub(crate) instance_slot: Option<SlotIndex>,
    pub(crate) slots: Box<[SlotIndex]>,
    pub(crate) children: Box<[NodeId]>,
    pub(crate) extensions: Box<[String]>,
}

impl RuntimeNode {
    /// Id, equal to the configuration node's id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Frozen name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `/`-separated path, root name first.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parent id; `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Depth; the root is 0.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Modifiers fixed at creation.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// The region holding this node's slots.
    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Instance slot of a source-bearing node.
    pub fn instance_slot(&self) -> Option<SlotIndex> {
        self.instance_slot
    }

    /// Every slot reserved for this node, instance slot first.
    pub fn slots(&self) -> &[SlotIndex] {
        &self.slots
    }

    /// Children in installation order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Extensions used while configuring the node.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

// ── Instance ───────────────────────────────────────────────────────

/// One launched deployment of an [`Image`].
///
/// Owns its regions exclusively; two instances of the same image never
/// share a region or a guest. Regions are read-only, so an instance can
/// be shared between threads and read without locking.
pub struct Instance {
    image: Image,
    regions: Box<[SharedRegion]>,
}

// Compile-time assertion: instances are readable from any thread.
const _: () = {
    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send_sync::<Instance>();
    }
};

impl Instance {
    pub(crate) fn new(image: Image, regions: Vec<SharedRegion>) -> Self {
        Self {
            image,
            regions: regions.into(),
        }
    }

    /// The image this instance was launched from.
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// The root node.
    pub fn root(&self) -> &RuntimeNode {
        self.image.root()
    }

    /// A node by id.
    pub fn node(&self, id: NodeId) -> Option<&RuntimeNode> {
        self.image.node(id)
    }

    /// A node by path.
    pub fn find(&self, path: &str) -> Option<&RuntimeNode> {
        self.image.find(path)
    }

    /// A materialized region by id.
    pub fn region(&self, id: RegionId) -> Option<&SharedRegion> {
        self.regions.get(id.index())
    }

    /// The region holding `node`'s slots.
    pub fn region_of(&self, node: NodeId) -> Option<&SharedRegion> {
        self.node(node).and_then(|n| self.region(n.region))
    }

    /// The root guest, if the root is guest-bearing.
    pub fn guest(&self) -> Option<Arc<Guest>> {
        self.regions.first().and_then(|r| r.guest())
    }

    /// The guest of the region `node` lives in.
    pub fn guest_of(&self, node: NodeId) -> Option<Arc<Guest>> {
        self.region_of(node).and_then(|r| r.guest())
    }

    /// Every guest of this instance, root region first.
    pub fn guests(&self) -> impl Iterator<Item = Arc<Guest>> + '_ {
        self.regions.iter().filter_map(|r| r.guest())
    }

    /// The value in `node`'s instance slot.
    pub fn instance_as<T: Any + Send + Sync>(&self, node: NodeId) -> Result<Arc<T>, AssemblyError> {
        let n = self.node(node).ok_or(AssemblyError::UnknownNode { node })?;
        let slot = n.instance_slot.ok_or_else(|| AssemblyError::NoInstanceSlot {
            name: n.path.clone(),
        })?;
        let region = self
            .region(n.region)
            .ok_or(AssemblyError::UnknownNode { node })?;
        Ok(region
            .get_as::<T>(slot)?
            .ok_or(RegionError::Empty { slot })?)
    }

    /// A service exported in the root region.
    pub fn service<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, AssemblyError> {
        self.service_in(self.root().id(), key)
    }

    /// A service exported in the region `node` lives in.
    pub fn service_in<T: Any + Send + Sync>(
        &self,
        node: NodeId,
        key: &str,
    ) -> Result<Arc<T>, AssemblyError> {
        let region = self
            .region_of(node)
            .ok_or(AssemblyError::UnknownNode { node })?;
        Ok(region.service::<T>(key)?)
    }

    /// Start every guest, root region first.
    ///
    /// All or nothing: if a guest fails to start, the guests this call
    /// already started are stopped again, newest first, and the failure
    /// is returned. Guests are single-use, so those end up `Stopped`
    /// rather than back in `Initialized`.
    pub fn start(&self) -> Result<(), AssemblyError> {
        let mut started: Vec<Arc<Guest>> = Vec::new();
        for guest in self.guests() {
            if let Err(err) = guest.start() {
                for done in started.iter().rev() {
                    if let Err(stop) = done.stop() {
                        warn!(guest = %done.name(), error = %stop, "rollback stop failed");
                    }
                }
                return Err(err.into());
            }
            started.push(guest);
        }
        Ok(())
    }

    /// Stop every guest, in reverse start order.
    pub fn stop(&self) -> Result<(), AssemblyError> {
        for region in self.regions.iter().rev() {
            if let Some(guest) = region.guest() {
                guest.stop()?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("root", &self.root().path())
            .field("regions", &self.regions)
            .finish()
    }
}
