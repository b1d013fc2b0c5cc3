//! Freshness and TTL decisions.

use super::traits::CacheEntry;
use crate::config::CachePolicyConfig;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Decides whether a stored entry may be served and how long new ones live.
///
/// An entry is either Valid or Expired. The transition is driven only by
/// wall-clock time; nothing marks an entry expired explicitly.
#[derive(Debug, Clone, Default)]
pub struct CachePolicy {
    config: CachePolicyConfig,
}

impl CachePolicy {
    pub fn new(config: CachePolicyConfig) -> Self {
        Self { config }
    }

    /// A policy under which nothing ever expires.
    pub fn permanent() -> Self {
        Self::new(CachePolicyConfig::permanent())
    }

    pub fn config(&self) -> &CachePolicyConfig {
        &self.config
    }

    /// `true` iff the entry never expires or expires strictly after `now`.
    pub fn is_valid(entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        entry.expires_at.map_or(true, |expires_at| expires_at > now)
    }

    /// TTL for a new entry in the given context category.
    ///
    /// Unknown or missing categories fall back to the default TTL. `None`
    /// means the entry is cached permanently.
    pub fn ttl_for(&self, category: Option<&str>) -> Option<Duration> {
        let secs = category
            .map(|c| c.trim().to_lowercase())
            .and_then(|c| {
                self.config
                    .category_ttls
                    .iter()
                    .find(|(key, _)| key.to_lowercase() == c)
                    .map(|(_, ttl)| *ttl)
            })
            .unwrap_or(self.config.default_ttl_secs);

        secs.map(Duration::from_secs)
    }

    /// Absolute expiry for an entry created at `created_at`.
    pub fn expires_at(created_at: DateTime<Utc>, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        ttl.map(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|d| created_at.checked_add_signed(d))
                .map_or_else(far_future, |at| at.min(far_future()))
        })
    }
}

/// Last instant with a four-digit year. Stored timestamps are compared as
/// text, so nothing may be persisted past it.
pub(crate) fn far_future() -> DateTime<Utc> {
    DateTime::from_timestamp(253_402_300_799, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
