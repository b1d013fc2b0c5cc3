//! Plantitas Cache - response cache for the plant-care assistant's AI answers.
//!
//! Answers from species identification, health diagnosis and the chat
//! assistant are expensive to generate. This crate stores them in SQLite,
//! keyed by a normalized hash of the question and its context, and tracks how
//! often each answer is reused and how many tokens that saved.
//!
//! # Example
//!
//! ```rust,no_run
//! use plantitas_cache::{CachePolicy, ResponseCache, SqliteCacheStore};
//! use std::sync::Arc;
//!
//! # async fn ask_gemini(_q: &str) -> Result<String, std::io::Error> { Ok(String::new()) }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteCacheStore::new("/var/lib/plantitas/cache.sqlite")?);
//!     let cache = ResponseCache::new(store, CachePolicy::default());
//!
//!     let (answer, was_cache_hit) = cache
//!         .get_or_generate("Why are my leaves yellow?", Some("pothos"), Some("diagnosis"), || {
//!             ask_gemini("Why are my leaves yellow?")
//!         })
//!         .await?;
//!     println!("{answer} (cached: {was_cache_hit})");
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use cache::{
    estimate_tokens, spawn_sweeper, CacheEntry, CacheLookup, CachePolicy, CacheStats, CacheStore,
    QueryNormalizer, ResponseCache, SqliteCacheStore,
};
pub use cancel::CancellationToken;
pub use config::{CacheDefaults, CachePolicyConfig};
pub use error::{CacheError, Result};
