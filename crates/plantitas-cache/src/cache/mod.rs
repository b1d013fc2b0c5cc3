//! Response cache for AI-generated answers.
//!
//! - [`QueryNormalizer`] turns a (question, context) pair into a stable key.
//! - [`CacheStore`] persists entries; [`SqliteCacheStore`] is the SQLite backend.
//! - [`CachePolicy`] decides freshness and TTLs.
//! - [`ResponseCache`] ties them together for the answer-generation service.
//!
//! All entries live in a single `respuestas_cache` table keyed by query hash.

mod normalizer;
mod policy;
mod service;
mod sqlite;
mod sweeper;
mod traits;

pub use normalizer::{QueryNormalizer, QUERY_HASH_LEN};
pub use policy::CachePolicy;
pub use service::{estimate_tokens, CacheLookup, ResponseCache};
pub use sqlite::SqliteCacheStore;
pub use sweeper::spawn_sweeper;
pub use traits::{CacheEntry, CacheStats, CacheStore};
