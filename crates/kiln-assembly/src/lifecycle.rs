//! Per-node lifecycle latches.
//!
//! A node starts in [`LifecycleState::Initial`]. Each of the five
//! "first use" events (name read, name set, extension used, child
//! installed, subtree linked) is a one-way latch: once it fires it stays
//! fired, whatever else happens. The node's [`state`](Lifecycle::state)
//! is the first latch that fired; [`LifecycleState::Frozen`] overrides
//! everything and is never left again.
//!
//! ```text
//!            ┌─► NameRead ──────┐
//!            ├─► NameSet ───────┤
//! Initial ───┼─► ExtensionUsed ─┼──► Frozen
//!            ├─► ChildInstalled ┤
//!            ├─► LinkInvoked ───┤
//!            └──────────────────┘
//! ```

use std::fmt;

bitflags::bitflags! {
    /// The set of latches that have fired on a node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Latches: u8 {
        /// The node's name was read.
        const NAME_READ = 1 << 0;
        /// The node was renamed.
        const NAME_SET = 1 << 1;
        /// An extension was used on the node.
        const EXTENSION_USED = 1 << 2;
        /// A child was installed below the node.
        const CHILD_INSTALLED = 1 << 3;
        /// A subtree was linked below the node.
        const LINK_INVOKED = 1 << 4;
        /// The node is frozen.
        const FROZEN = 1 << 5;
    }
}

/// Where a configuration node is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Nothing has observed or depended on the node yet.
    Initial,
    /// Someone read the node's name.
    NameRead,
    /// The node was renamed.
    NameSet,
    /// An extension was used on the node.
    ExtensionUsed,
    /// A child was installed below the node.
    ChildInstalled,
    /// An externally built subtree was linked below the node.
    LinkInvoked,
    /// Configuration is complete. Absorbing.
    Frozen,
}

impl LifecycleState {
    /// Order in which fired latches are reported as rename blockers.
    const BLOCKERS: [LifecycleState; 6] = [
        Self::Frozen,
        Self::NameRead,
        Self::NameSet,
        Self::ExtensionUsed,
        Self::ChildInstalled,
        Self::LinkInvoked,
    ];

    /// The latch bit for this state; empty for `Initial`.
    pub fn latch(self) -> Latches {
        match self {
            Self::Initial => Latches::empty(),
            Self::NameRead => Latches::NAME_READ,
            Self::NameSet => Latches::NAME_SET,
            Self::ExtensionUsed => Latches::EXTENSION_USED,
            Self::ChildInstalled => Latches::CHILD_INSTALLED,
            Self::LinkInvoked => Latches::LINK_INVOKED,
            Self::Frozen => Latches::FROZEN,
        }
    }

    /// Why a rename is no longer possible, or `None` in `Initial`.
    pub fn rename_blocker(self) -> Option<&'static str> {
        match self {
            Self::Initial => None,
            Self::NameRead => Some("its name has already been read"),
            Self::NameSet => Some("its name has already been set"),
            Self::ExtensionUsed => Some("an extension has already been used on it"),
            Self::ChildInstalled => Some("a child has already been installed on it"),
            Self::LinkInvoked => Some("a subtree has already been linked to it"),
            Self::Frozen => Some("it is frozen"),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initial => "initial",
            Self::NameRead => "name-read",
            Self::NameSet => "name-set",
            Self::ExtensionUsed => "extension-used",
            Self::ChildInstalled => "child-installed",
            Self::LinkInvoked => "link-invoked",
            Self::Frozen => "frozen",
        };
        f.write_str(s)
    }
}

/// The latch record of one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lifecycle {
    first: LifecycleState,
    fired: Latches,
}

impl Lifecycle {
    /// A fresh record in [`LifecycleState::Initial`].
    pub fn new() -> Self {
        Self {
            first: LifecycleState::Initial,
            fired: Latches::empty(),
        }
    }

    /// `Frozen` once frozen, otherwise the first latch that fired.
    pub fn state(&self) -> LifecycleState {
        if self.is_frozen() {
            LifecycleState::Frozen
        } else {
            self.first
        }
    }

    /// Every latch that has fired so far.
    pub fn latches(&self) -> Latches {
        self.fired
    }

    /// Whether `event` has fired.
    pub fn has_fired(&self, event: LifecycleState) -> bool {
        event != LifecycleState::Initial && self.fired.contains(event.latch())
    }

    /// Fire a first-use latch.
    ///
    /// Every latch is recorded, not just the first. Returns whether this
    /// call fired a latch that had not fired before; always `false` once
    /// frozen. Firing [`LifecycleState::Frozen`] here is the same as
    /// [`freeze`](Self::freeze).
    pub fn latch(&mut self, event: LifecycleState) -> bool {
        match event {
            LifecycleState::Initial => false,
            LifecycleState::Frozen => self.freeze(),
            _ if self.is_frozen() || self.fired.contains(event.latch()) => false,
            _ => {
                if self.first == LifecycleState::Initial {
                    self.first = event;
                }
                self.fired |= event.latch();
                true
            }
        }
    }

    /// Latch `Frozen`. Returns whether the node was not frozen before.
    pub fn freeze(&mut self) -> bool {
        let changed = !self.is_frozen();
        self.fired |= Latches::FROZEN;
        changed
    }

    /// Whether the node is frozen.
    pub fn is_frozen(&self) -> bool {
        self.fired.contains(Latches::FROZEN)
    }

    /// Whether a rename is still allowed.
    pub fn can_rename(&self) -> bool {
        self.fired.is_empty()
    }

    /// The latch a failed rename reports, `None` while renaming is legal.
    ///
    /// `Frozen` wins, then `NameRead`: once the name was observed that is
    /// what is reported, whichever latch fired first.
    pub fn rename_blocker(&self) -> Option<LifecycleState> {
        LifecycleState::BLOCKERS
            .into_iter()
            .find(|&state| self.fired.contains(state.latch()))
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
