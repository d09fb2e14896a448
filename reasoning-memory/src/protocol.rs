//! [`MemoryProtocol`] (spec §4.10): a bounded ring of reasoning
//! checkpoints, recorded at a fixed turn cadence, with optional
//! append-only persistence.

use crate::checkpoint::Checkpoint;
use reasoning_core::model::ProviderStats;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

/// Default cap on the number of retained checkpoints.
pub const DEFAULT_MAX_CHECKPOINTS: usize = 100;
/// Default number of provider turns between checkpoints.
pub const DEFAULT_THOUGHTS_PER_CHECKPOINT: u64 = 10;

struct HitCounters {
    hits: u64,
    total: u64,
}

/// Maintains the checkpoint ring and the optional persistence writer.
/// A process-wide singleton, the same as `SessionStore` and
/// `ProviderArbiter` (spec §5).
pub struct MemoryProtocol {
    ring: RwLock<VecDeque<Checkpoint>>,
    max_checkpoints: usize,
    thoughts_per_checkpoint: u64,
    turns_since_checkpoint: AtomicU64,
    last_tool_result_summary: RwLock<String>,
    hits: Mutex<HitCounters>,
    persist_path: Option<PathBuf>,
}

impl MemoryProtocol {
    /// Build a protocol with the given ring cap and checkpoint cadence.
    /// `persist_path` is normally sourced from `MEMORY_CHECKPOINT_PATH`;
    /// `None` disables persistence without affecting correctness.
    pub fn new(max_checkpoints: usize, thoughts_per_checkpoint: u64, persist_path: Option<PathBuf>) -> Self {
        Self {
            ring: RwLock::new(VecDeque::with_capacity(max_checkpoints.min(1024))),
            max_checkpoints,
            thoughts_per_checkpoint: thoughts_per_checkpoint.max(1),
            turns_since_checkpoint: AtomicU64::new(0),
            last_tool_result_summary: RwLock::new(String::new()),
            hits: Mutex::new(HitCounters { hits: 0, total: 0 }),
            persist_path,
        }
    }

    /// Record that a tool call observed a cache hit or miss. Feeds the
    /// rolling `cacheHitRate` captured in the next checkpoint.
    pub async fn record_cache_outcome(&self, hit: bool) {
        let mut counters = self.hits.lock().await;
        counters.total += 1;
        if hit {
            counters.hits += 1;
        }
    }

    /// Record the most recent tool result's summary, surfaced verbatim
    /// in the next checkpoint.
    pub async fn record_tool_result(&self, summary: String) {
        *self.last_tool_result_summary.write().await = summary;
    }

    /// Record that a provider turn completed. Every `thoughtsPerCheckpoint`
    /// calls, snapshots a checkpoint and (if configured) persists it.
    pub async fn record_turn(
        &self,
        active_session_ids: Vec<String>,
        provider_stats: HashMap<String, ProviderStats>,
    ) {
        let count = self.turns_since_checkpoint.fetch_add(1, Ordering::AcqRel) + 1;
        if count % self.thoughts_per_checkpoint != 0 {
            return;
        }

        let checkpoint = self.build_checkpoint(active_session_ids, provider_stats).await;
        self.push(checkpoint.clone()).await;
        if let Err(e) = self.persist(&checkpoint).await {
            tracing::warn!(error = %e, "failed to persist checkpoint");
        }
    }

    async fn build_checkpoint(
        &self,
        active_session_ids: Vec<String>,
        provider_stats: HashMap<String, ProviderStats>,
    ) -> Checkpoint {
        let cache_hit_rate = {
            let counters = self.hits.lock().await;
            if counters.total == 0 {
                0.0
            } else {
                counters.hits as f64 / counters.total as f64
            }
        };
        Checkpoint {
            recorded_at: chrono::Utc::now(),
            active_session_ids,
            provider_stats,
            cache_hit_rate,
            last_tool_result_summary: self.last_tool_result_summary.read().await.clone(),
        }
    }

    async fn push(&self, checkpoint: Checkpoint) {
        let mut ring = self.ring.write().await;
        ring.push_back(checkpoint);
        while ring.len() > self.max_checkpoints {
            ring.pop_front();
        }
    }

    async fn persist(&self, checkpoint: &Checkpoint) -> std::io::Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let mut line = serde_json::to_vec(checkpoint).expect("Checkpoint always serializes");
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
        file.write_all(&line).await
    }

    /// All currently-retained checkpoints, oldest first.
    pub async fn checkpoints(&self) -> Vec<Checkpoint> {
        self.ring.read().await.iter().cloned().collect()
    }

    /// Number of checkpoints currently retained.
    pub async fn len(&self) -> usize {
        self.ring.read().await.len()
    }

    /// Whether the ring currently holds no checkpoints.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryProtocol {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHECKPOINTS, DEFAULT_THOUGHTS_PER_CHECKPOINT, None)
    }
}
