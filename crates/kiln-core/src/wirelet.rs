//! Ordered lists of opaque configuration options ("wirelets").
//!
//! Wirelets are attached to a node when it is created or linked, and to a
//! launch when an image is instantiated. Kiln never interprets them: it
//! keeps them in order, offers a typed lookup by option type, and counts
//! how many were never consumed by the collaborator they were meant for.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::WireletError;

/// A single type-erased option value.
pub type Wirelet = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct Entry {
    value: Wirelet,
    type_name: &'static str,
    consumed: bool,
}

/// An ordered list of wirelets with per-entry consumption tracking.
///
/// When several wirelets of the same type are present the one added last
/// wins, so a later option overrides an earlier one.
#[derive(Clone, Default)]
pub struct WireletList {
    entries: SmallVec<[Entry; 2]>,
}

impl WireletList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a wirelet.
    pub fn push<T: Any + Send + Sync>(&mut self, value: T) {
        self.entries.push(Entry {
            value: Arc::new(value),
            type_name: type_name::<T>(),
            consumed: false,
        });
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    /// Append every entry of `other`, preserving its consumption state.
    pub fn extend(&mut self, other: WireletList) {
        self.entries.extend(other.entries);
    }

    /// The most recently added wirelet of type `T`, without consuming it.
    pub fn find<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .iter()
            .rev()
            .find_map(|e| e.value.downcast_ref::<T>())
    }

    /// Every wirelet of type `T`, in insertion order.
    pub fn find_all<T: Any + Send + Sync>(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries
            .iter()
            .filter_map(|e| e.value.downcast_ref::<T>())
    }

    /// Mark every wirelet of type `T` as consumed and return the most
    /// recently added one.
    pub fn consume<T: Any + Send + Sync>(&mut self) -> Option<Arc<T>> {
        let mut found = None;
        for entry in self.entries.iter_mut() {
            if entry.value.is::<T>() {
                entry.consumed = true;
                found = Some(Arc::clone(&entry.value));
            }
        }
        found.and_then(|v| v.downcast::<T>().ok())
    }

    /// Number of wirelets that have not been consumed.
    pub fn unconsumed(&self) -> usize {
        self.entries.iter().filter(|e| !e.consumed).count()
    }

    /// Fail if any wirelet was never consumed.
    pub fn ensure_consumed(&self) -> Result<(), WireletError> {
        let types: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !e.consumed)
            .map(|e| e.type_name.to_string())
            .collect();
        if types.is_empty() {
            Ok(())
        } else {
            Err(WireletError::Unconsumed {
                count: types.len(),
                types,
            })
        }
    }

    /// Total number of wirelets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list holds no wirelets.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for WireletList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.type_name, e.consumed)))
            .finish()
    }
}
