//! Launch-time context handed to every producer during materialization.

use kiln_core::WireletList;

/// Per-instantiation input to [`RegionPlan::materialize`](crate::RegionPlan::materialize).
///
/// Carries the name given to the guest (when the region is guest-bearing)
/// and the wirelets supplied at launch. Producers see it through
/// [`ProduceContext::launch`](crate::ProduceContext::launch).
#[derive(Clone, Debug, Default)]
pub struct MaterializeContext {
    name: String,
    wirelets: WireletList,
}

impl MaterializeContext {
    /// Create a context with the given guest name and no wirelets.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wirelets: WireletList::new(),
        }
    }

    /// Attach launch wirelets.
    #[must_use]
    pub fn with_wirelets(mut self, wirelets: WireletList) -> Self {
        self.wirelets = wirelets;
        self
    }

    /// Name given to the guest created for this instantiation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wirelets supplied at launch.
    pub fn wirelets(&self) -> &WireletList {
        &self.wirelets
    }
}
