//! Engine configuration.
//!
//! Every field has a default, so `EngineConfig::default()` is the normal
//! entry point. Hosts that want to tune the feel of grouping can
//! deserialize overrides from JSON; missing fields fall back to their
//! defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ─── Group / child metrics ───────────────────────────────────────────────

/// Fallback dimensions for group containers that have no measured size yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupMetrics {
    /// Fixed estimated width.
    pub width: f64,
    /// Minimum estimated height (empty or sparsely populated group).
    pub base_height: f64,
    /// Height contributed by each child (child height + spacing).
    pub per_child_height: f64,
}

impl Default for GroupMetrics {
    fn default() -> Self {
        Self {
            width: 320.0,
            base_height: 160.0,
            per_child_height: 88.0,
        }
    }
}

/// Fallback child rect size used for insertion-index computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildMetrics {
    /// Estimated child width.
    pub width: f64,
    /// Estimated child height, spacing excluded.
    pub height: f64,
}

impl Default for ChildMetrics {
    fn default() -> Self {
        Self {
            width: 280.0,
            height: 80.0,
        }
    }
}

// ─── Engine ──────────────────────────────────────────────────────────────

/// Top-level configuration shared by the hit-tester and the editor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Pixels added on every side of a group box before hit-testing.
    pub hit_tolerance: f64,
    /// Estimates for groups without a measured size.
    pub group: GroupMetrics,
    /// Estimates for children without a measured size.
    pub child: ChildMetrics,
    /// Lifetime of an unclaimed pending drop record, in milliseconds.
    pub pending_drop_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hit_tolerance: 10.0,
            group: GroupMetrics::default(),
            child: ChildMetrics::default(),
            pending_drop_timeout_ms: 1000,
        }
    }
}

impl EngineConfig {
    /// [`Self::pending_drop_timeout_ms`] as a `Duration`.
    pub fn pending_drop_timeout(&self) -> Duration {
        Duration::from_millis(self.pending_drop_timeout_ms)
    }

    /// Parse a (possibly partial) JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
