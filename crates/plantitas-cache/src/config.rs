//! Centralized configuration for the response cache.
//!
//! Constants live on unit structs; the TTL policy is data that can be loaded
//! from a JSON file so deployments can tune it without a rebuild.

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Storage-level defaults.
pub struct CacheDefaults;

impl CacheDefaults {
    pub const DB_FILE_NAME: &'static str = "plantitas-cache.sqlite";
    pub const APP_DIR_NAME: &'static str = "plantitas";
    pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_TTL_SECS: u64 = 30 * 86_400; // 30 days
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
    pub const CHARS_PER_TOKEN: usize = 4;

    /// Default database location under the platform's local data directory.
    pub fn default_db_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join(Self::APP_DIR_NAME).join(Self::DB_FILE_NAME))
    }
}

/// TTL policy configuration.
///
/// `default_ttl_secs = None` and `null` category values mean "never expires".
///
/// ```json
/// {
///   "default_ttl_secs": 2592000,
///   "category_ttls": { "species": null, "diagnosis": 604800 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CachePolicyConfig {
    /// TTL applied when no category mapping matches.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: Option<u64>,
    /// Per context-category overrides, keyed case-insensitively.
    #[serde(default)]
    pub category_ttls: HashMap<String, Option<u64>>,
}

fn default_ttl_secs() -> Option<u64> {
    Some(CacheDefaults::DEFAULT_TTL_SECS)
}

impl Default for CachePolicyConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            category_ttls: HashMap::new(),
        }
    }
}

impl CachePolicyConfig {
    /// A policy under which nothing ever expires.
    pub fn permanent() -> Self {
        Self {
            default_ttl_secs: None,
            category_ttls: HashMap::new(),
        }
    }

    /// Load a policy from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| CacheError::io_with_path(e, path))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Add or replace a category mapping.
    pub fn with_category(mut self, category: &str, ttl: Option<Duration>) -> Self {
        self.category_ttls
            .insert(category.trim().to_lowercase(), ttl.map(|d| d.as_secs()));
        self
    }

    /// Reject zero-length TTLs, which would expire entries at insert time.
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl_secs == Some(0) {
            return Err(CacheError::Validation {
                field: "default_ttl_secs".to_string(),
                message: "must be greater than 0 or null".to_string(),
            });
        }

        if let Some((category, _)) = self
            .category_ttls
            .iter()
            .find(|(_, ttl)| **ttl == Some(0))
        {
            return Err(CacheError::Validation {
                field: format!("category_ttls.{}", category),
                message: "must be greater than 0 or null".to_string(),
            });
        }

        Ok(())
    }
}
