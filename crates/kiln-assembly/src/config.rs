//! Tree configuration, validation, and error types.
//!
//! [`AssemblyConfig`] bounds the shape of a configuration tree.
//! [`validate()`](AssemblyConfig::validate) checks it once, when the tree
//! is created; nothing can change it afterwards.

use kiln_region::{RegionConfig, RegionLayout};
use thiserror::Error;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`AssemblyConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `max_depth` is zero; not even a root and one child would fit.
    #[error("max_depth must be at least 1")]
    ZeroDepth,
    /// The per-region slot budget cannot hold the well-known slots.
    #[error("max_slots_per_region {configured} is below the minimum of {minimum}")]
    SlotBudgetTooSmall {
        /// The configured budget.
        configured: u32,
        /// Slots every guest-bearing region needs before any reservation.
        minimum: u32,
    },
}

// ── AssemblyConfig ─────────────────────────────────────────────────

/// Limits and policies applied to one [`ConfigTree`](crate::ConfigTree).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyConfig {
    /// Deepest allowed node depth (the root is depth 0). Default: 64.
    pub max_depth: u32,
    /// Slot budget of every region opened by the tree. Default: 2^20.
    pub max_slots_per_region: u32,
    /// Whether `freeze` fails while any node still carries unconsumed
    /// wirelets. Default: `true`.
    pub require_wirelets_consumed: bool,
}

impl AssemblyConfig {
    /// Default depth limit.
    pub const DEFAULT_MAX_DEPTH: u32 = 64;

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        let minimum = RegionLayout::Guest.well_known_count();
        if self.max_slots_per_region < minimum {
            return Err(ConfigError::SlotBudgetTooSmall {
                configured: self.max_slots_per_region,
                minimum,
            });
        }
        Ok(())
    }

    /// Region config for a region of `layout` opened by this tree.
    pub fn region_config(&self, layout: RegionLayout) -> RegionConfig {
        RegionConfig {
            layout,
            max_slots: self.max_slots_per_region,
        }
    }
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            max_slots_per_region: RegionConfig::DEFAULT_MAX_SLOTS,
            require_wirelets_consumed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AssemblyConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_depth_rejected() {
        let cfg = AssemblyConfig {
            max_depth: 0,
            ..AssemblyConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroDepth));
    }

    #[test]
    fn slot_budget_must_cover_well_known_slots() {
        let cfg = AssemblyConfig {
            max_slots_per_region: 1,
            ..AssemblyConfig::default()
        };
        match cfg.validate() {
            Err(ConfigError::SlotBudgetTooSmall {
                configured,
                minimum,
            }) => {
                assert_eq!(configured, 1);
                assert_eq!(minimum, 2);
            }
            other => panic!("expected SlotBudgetTooSmall, got {other:?}"),
        }
    }

    #[test]
    fn region_config_carries_budget() {
        let cfg = AssemblyConfig {
            max_slots_per_region: 8,
            ..AssemblyConfig::default()
        };
        let region = cfg.region_config(RegionLayout::Hosted);
        assert_eq!(region.max_slots, 8);
        assert_eq!(region.layout, RegionLayout::Hosted);
        assert!(region.validate().is_ok());
    }
}
