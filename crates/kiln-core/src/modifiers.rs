//! Capability bit-set attached to every configuration node.
//!
//! A node's [`Modifiers`] are fixed at creation and never change. They
//! drive the behavioral differences between nodes (whether a node opens a
//! region of its own, whether it owns an instance slot, which default name
//! prefix it gets) so that a single node type covers every kind of
//! component.

use std::fmt;

bitflags::bitflags! {
    /// Capabilities of a configuration node.
    ///
    /// Combine with bitwise OR: `Modifiers::CONTAINER | Modifiers::GUEST`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        /// The node is backed by a user-supplied source and owns an
        /// instance slot in its region.
        const SOURCE = 1 << 0;
        /// The node is an independently lifecycled guest. It opens a new
        /// region whose slot 0 holds the `Guest` object.
        const GUEST = 1 << 1;
        /// The node may hold child components.
        const CONTAINER = 1 << 2;
        /// The node is an extension's own bookkeeping node.
        const EXTENSION = 1 << 3;
        /// The node is the root of an application.
        const APPLICATION = 1 << 4;
    }
}

impl Modifiers {
    /// Prefix used when a node is created without an explicit name.
    ///
    /// The first matching capability wins, in the order
    /// application, container, extension, source.
    pub fn default_name_prefix(self) -> &'static str {
        if self.contains(Self::APPLICATION) {
            "Application"
        } else if self.contains(Self::CONTAINER) {
            "Container"
        } else if self.contains(Self::EXTENSION) {
            "Extension"
        } else if self.contains(Self::SOURCE) {
            "Component"
        } else {
            "Node"
        }
    }

    /// Whether the node opens a region with a guest in slot 0.
    pub fn is_guest(self) -> bool {
        self.contains(Self::GUEST)
    }

    /// Whether the node owns an instance slot.
    pub fn has_source(self) -> bool {
        self.contains(Self::SOURCE)
    }

    /// Whether the node is a container.
    pub fn is_container(self) -> bool {
        self.contains(Self::CONTAINER)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}
