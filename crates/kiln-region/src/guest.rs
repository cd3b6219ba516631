//! The guest: one independently lifecycled instantiation of a subtree.
//!
//! A [`Guest`] is created by materialization and stored in slot 0 of a
//! guest-bearing region, before any producer runs. It owns no storage of
//! its own; it only tracks its lifecycle.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use kiln_core::GuestId;
use thiserror::Error;
use tracing::info;

/// Lifecycle state of a guest.
///
/// Transitions are strictly forward: `Initialized → Running → Stopped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuestState {
    /// Materialized, not yet started.
    Initialized,
    /// Started and not yet stopped.
    Running,
    /// Stopped. Terminal.
    Stopped,
}

impl GuestState {
    fn to_raw(self) -> u8 {
        match self {
            Self::Initialized => 0,
            Self::Running => 1,
            Self::Stopped => 2,
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Initialized,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for GuestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Errors from guest lifecycle transitions.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GuestError {
    /// The requested transition is not legal from the current state.
    #[error("guest '{guest}' cannot move from {from} to {to}")]
    InvalidTransition {
        /// Name of the guest.
        guest: String,
        /// State the guest was in.
        from: GuestState,
        /// State that was requested.
        to: GuestState,
    },
}

/// Runtime object for one instantiation of a guest-bearing subtree.
///
/// Shared as `Arc<Guest>`; state changes are atomic, so `start`/`stop`
/// may be called from any thread holding the region.
pub struct Guest {
    id: GuestId,
    name: String,
    state: AtomicU8,
}

impl Guest {
    /// Create a guest in the [`GuestState::Initialized`] state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GuestId::next(),
            name: name.into(),
            state: AtomicU8::new(GuestState::Initialized.to_raw()),
        }
    }

    /// Unique id of this instantiation.
    pub fn id(&self) -> GuestId {
        self.id
    }

    /// Name given at launch.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GuestState {
        GuestState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Move from `Initialized` to `Running`.
    pub fn start(&self) -> Result<(), GuestError> {
        self.transition(GuestState::Initialized, GuestState::Running)?;
        info!(guest = %self.name, id = %self.id, "guest started");
        Ok(())
    }

    /// Move from `Running` to `Stopped`.
    pub fn stop(&self) -> Result<(), GuestError> {
        self.transition(GuestState::Running, GuestState::Stopped)?;
        info!(guest = %self.name, id = %self.id, "guest stopped");
        Ok(())
    }

    fn transition(&self, from: GuestState, to: GuestState) -> Result<(), GuestError> {
        self.state
            .compare_exchange(from.to_raw(), to.to_raw(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| GuestError::InvalidTransition {
                guest: self.name.clone(),
                from: GuestState::from_raw(actual),
                to,
            })
    }
}

impl fmt::Debug for Guest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guest")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
