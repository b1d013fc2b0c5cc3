//! Read-through facade used by the answer-generation service.
//!
//! The cache is an optimization, never a correctness dependency: every store
//! failure is logged and turned into a miss so the caller falls through to a
//! fresh AI call.

use super::normalizer::QueryNormalizer;
use super::policy::CachePolicy;
use super::traits::{CacheEntry, CacheStore};
use crate::config::CacheDefaults;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// A valid entry was found and its hit was recorded.
    Hit { answer: String, entry: CacheEntry },
    /// Nothing usable is cached; generate a fresh answer.
    Miss,
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit { .. })
    }

    pub fn answer(&self) -> Option<&str> {
        match self {
            CacheLookup::Hit { answer, .. } => Some(answer),
            CacheLookup::Miss => None,
        }
    }
}

/// Response cache in front of an AI answer generator.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    policy: CachePolicy,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, policy: CachePolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Look up a cached answer and count the reuse.
    ///
    /// Expired rows, malformed data and store failures are all misses.
    pub fn lookup(&self, question: &str, context_summary: Option<&str>) -> CacheLookup {
        let query_hash = QueryNormalizer::hash(question, context_summary);

        let entry = match self.store.lookup(&query_hash) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("Cache miss: {}", query_hash);
                return CacheLookup::Miss;
            }
            Err(e) => {
                warn!("Response cache lookup failed, treating as miss: {}", e);
                return CacheLookup::Miss;
            }
        };

        if !CachePolicy::is_valid(&entry, Utc::now()) {
            debug!("Cache entry expired: {}", query_hash);
            return CacheLookup::Miss;
        }

        let saved = estimate_tokens(&entry.question) + estimate_tokens(&entry.answer);
        match self.store.record_hit(&query_hash, saved) {
            Ok(Some(updated)) => {
                debug!("Cache hit: {} (hits={})", query_hash, updated.hit_count);
                CacheLookup::Hit {
                    answer: updated.answer.clone(),
                    entry: updated,
                }
            }
            // Purged between lookup and hit
            Ok(None) => CacheLookup::Miss,
            Err(e) => {
                // The answer is still good even if the accounting failed.
                warn!("Failed to record cache hit for {}: {}", query_hash, e);
                CacheLookup::Hit {
                    answer: entry.answer.clone(),
                    entry,
                }
            }
        }
    }

    /// Persist a freshly generated answer using the TTL for `category`.
    ///
    /// Returns the stored (or already present) entry, or `None` if the store
    /// was unavailable.
    pub fn remember(
        &self,
        question: &str,
        context_summary: Option<&str>,
        category: Option<&str>,
        answer: &str,
    ) -> Option<CacheEntry> {
        let ttl = self.policy.ttl_for(category);
        match self.store.store(question, context_summary, answer, ttl) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Failed to cache answer, continuing without cache: {}", e);
                None
            }
        }
    }

    /// Return a cached answer or generate, cache and return a fresh one.
    ///
    /// The boolean is `true` when the answer came from the cache. Errors from
    /// `generate` are returned unchanged; cache errors never are.
    pub async fn get_or_generate<F, Fut, E>(
        &self,
        question: &str,
        context_summary: Option<&str>,
        category: Option<&str>,
        generate: F,
    ) -> Result<(String, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let CacheLookup::Hit { answer, .. } = self.lookup(question, context_summary) {
            return Ok((answer, true));
        }

        let answer = generate().await?;
        self.remember(question, context_summary, category, &answer);
        Ok((answer, false))
    }
}

/// Rough token count for accounting: one token per four characters.
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count();
    chars.div_ceil(CacheDefaults::CHARS_PER_TOKEN) as u64
}
