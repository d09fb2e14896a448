//! A single recorded checkpoint (spec §4.10).

use reasoning_core::model::ProviderStats;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A point-in-time snapshot of reasoning activity across the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// When this checkpoint was recorded.
    pub recorded_at: chrono::DateTime<chrono::Utc>,
    /// Ids of sessions active at the time of recording.
    pub active_session_ids: Vec<String>,
    /// A snapshot of `ProviderArbiter::stats_snapshot`.
    pub provider_stats: HashMap<String, ProviderStats>,
    /// Cache hit rate observed since server start, in `[0, 1]`.
    pub cache_hit_rate: f64,
    /// A structured summary of the most recent tool result.
    pub last_tool_result_summary: String,
}
