//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Page size used when a list request does not name a limit.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Largest page size the engine will serve unless configured otherwise.
pub const MAXIMUM_PAGE_LIMIT: u32 = 100;

/// Tunables for the trigger engine's read surface.
///
/// All fields have serde defaults so a partial configuration file
/// deserializes cleanly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Page size applied when a list request carries no limit.
    #[serde(default = "default_page_limit")]
    pub default_page_limit: u32,

    /// Upper bound on the page size; larger requests are capped, not rejected.
    #[serde(default = "maximum_page_limit")]
    pub maximum_page_limit: u32,

    /// Whether sensitive keys in event metadata are masked on external reads.
    #[serde(default = "default_true")]
    pub mask_sensitive_extra: bool,
}

fn default_page_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

fn maximum_page_limit() -> u32 {
    MAXIMUM_PAGE_LIMIT
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_limit: DEFAULT_PAGE_LIMIT,
            maximum_page_limit: MAXIMUM_PAGE_LIMIT,
            mask_sensitive_extra: true,
        }
    }
}

impl EngineConfig {
    /// Resolves a requested page limit against the configured bounds.
    ///
    /// A missing limit falls back to the default; any limit (including the
    /// default) is capped at the configured maximum.
    #[must_use]
    pub fn effective_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_limit)
            .min(self.maximum_page_limit)
    }
}
