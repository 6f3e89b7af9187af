//! Persisted like counters.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Running like count for one nominee.
///
/// Stored at: `like_tallies/{target_id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LikeTally {
    pub target_id: String,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub count: u64,
    /// Last update timestamp (ISO 8601)
    #[serde(default)]
    pub updated_at: String,
}

impl LikeTally {
    /// Add a flushed batch to the tally.
    pub fn add(&mut self, count: u64, now: &str) {
        self.count = self.count.saturating_add(count);
        self.updated_at = now.to_string();
    }
}
