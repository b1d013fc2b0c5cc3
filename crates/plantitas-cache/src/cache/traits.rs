//! Cache store trait and types.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A cached AI answer with its usage accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Surrogate key assigned on insert.
    pub id: i64,
    /// Normalized (question, context) digest; unique.
    pub query_hash: String,
    /// The question exactly as first asked.
    pub question: String,
    /// Short description of the context used (species, problem category).
    pub context_summary: Option<String>,
    /// The cached answer text.
    pub answer: String,
    /// Number of times this answer was reused.
    pub hit_count: u64,
    /// Running total of tokens not spent thanks to reuse.
    pub tokens_saved: u64,
    /// When the entry was inserted.
    pub created_at: DateTime<Utc>,
    /// When the entry was last served (or inserted).
    pub last_used_at: DateTime<Utc>,
    /// When the entry stops being served. `None` means never.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Aggregate statistics for the whole cache table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Rows currently stored, including expired ones not yet purged.
    pub total_entries: usize,
    /// Rows past their expiry that the next sweep would delete.
    pub expired_entries: usize,
    /// Sum of `hit_count` over all rows.
    pub total_hits: u64,
    /// Sum of `tokens_saved` over all rows.
    pub total_tokens_saved: u64,
    /// Earliest `created_at`, if any rows exist.
    pub oldest_entry: Option<DateTime<Utc>>,
    /// Latest `created_at`, if any rows exist.
    pub newest_entry: Option<DateTime<Utc>>,
}

impl CacheStats {
    /// Average reuses per stored answer.
    pub fn hits_per_entry(&self) -> f64 {
        if self.total_entries == 0 {
            0.0
        } else {
            self.total_hits as f64 / self.total_entries as f64
        }
    }
}

/// Persistent storage for cached answers.
///
/// All operations are synchronous to match rusqlite's API. Implementations
/// must be safe to share between threads and must apply counter updates
/// atomically at the storage layer.
pub trait CacheStore: Send + Sync {
    /// Point lookup by query hash.
    ///
    /// Returns the row whether or not it has expired; freshness is the
    /// caller's decision. A malformed hash is `Ok(None)`, never an error.
    fn lookup(&self, query_hash: &str) -> Result<Option<CacheEntry>>;

    /// Count one reuse of an entry.
    ///
    /// Increments `hit_count` by one, adds `tokens_saved_estimate` to
    /// `tokens_saved` and moves `last_used_at` forward. Returns the updated
    /// row, or `None` if it was purged in the meantime.
    fn record_hit(&self, query_hash: &str, tokens_saved_estimate: u64)
        -> Result<Option<CacheEntry>>;

    /// Insert a freshly generated answer.
    ///
    /// If a live entry with the same normalized key already exists the first
    /// answer wins: its `last_used_at` is advanced and it is returned. Counters
    /// are left alone. An expired entry with the same key is replaced.
    fn store(
        &self,
        question: &str,
        context_summary: Option<&str>,
        answer: &str,
        ttl: Option<Duration>,
    ) -> Result<CacheEntry>;

    /// Delete every entry whose expiry is at or before `now`.
    ///
    /// Returns the number of entries removed.
    fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Delete every entry that has expired by the current wall-clock time.
    fn purge_expired(&self) -> Result<usize> {
        self.purge_expired_at(Utc::now())
    }

    /// Aggregate statistics.
    fn stats(&self) -> Result<CacheStats>;

    /// The most reused entries, most hits first.
    fn top_entries(&self, limit: usize) -> Result<Vec<CacheEntry>>;

    /// Delete a single entry by hash.
    fn remove(&self, query_hash: &str) -> Result<bool>;

    /// Delete everything. Returns the number of entries removed.
    fn clear(&self) -> Result<usize>;
}
