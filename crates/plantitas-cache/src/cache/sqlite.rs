//! SQLite-backed response cache store.

use super::normalizer::QueryNormalizer;
use super::policy::CachePolicy;
use super::traits::{CacheEntry, CacheStats, CacheStore};
use crate::config::CacheDefaults;
use crate::error::{CacheError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

const ENTRY_COLUMNS: &str = "id, query_hash, pregunta, contexto_resumido, respuesta, hits, \
     tokens_ahorrados, created_at, last_used_at, expires_at";

/// SQLite cache store.
///
/// Thread-safe via an internal mutex on the connection. Several stores (in
/// one process or many) may open the same file; WAL mode and a busy timeout
/// let them share it.
pub struct SqliteCacheStore {
    /// Database connection (wrapped for thread safety).
    conn: Arc<Mutex<Connection>>,
    /// `None` for in-memory databases.
    db_path: Option<PathBuf>,
}

impl SqliteCacheStore {
    /// Open or create a cache database at the specified path.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| CacheError::Io {
                    message: format!("Failed to create cache directory: {}", e),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| CacheError::Database {
            message: format!("Failed to open cache database: {}", e),
            source: Some(e),
        })?;

        Self::configure_connection(&conn)?;
        Self::ensure_schema(&conn)?;

        info!("Opened response cache at {}", db_path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: Some(db_path.to_path_buf()),
        })
    }

    /// Create a private in-memory cache.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: None,
        })
    }

    /// The database file, if this store is file-backed.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.busy_timeout(CacheDefaults::BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )
        .map_err(|e| CacheError::Database {
            message: format!("Failed to set pragmas: {}", e),
            source: Some(e),
        })?;
        Ok(())
    }

    /// Initialize database schema.
    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS respuestas_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query_hash CHAR(64) NOT NULL UNIQUE,
                pregunta TEXT NOT NULL,
                contexto_resumido TEXT,
                respuesta TEXT NOT NULL,
                hits INTEGER NOT NULL DEFAULT 0,
                tokens_ahorrados INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_used_at TEXT NOT NULL,
                expires_at TEXT
            );

            -- Lookup of live entries
            CREATE INDEX IF NOT EXISTS ix_respuestas_cache_hash_expires
                ON respuestas_cache(query_hash, expires_at);

            -- Most-reused answers
            CREATE INDEX IF NOT EXISTS ix_respuestas_cache_created_hits
                ON respuestas_cache(created_at, hits);

            CREATE INDEX IF NOT EXISTS ix_respuestas_cache_created
                ON respuestas_cache(created_at);

            -- Expiry sweep
            CREATE INDEX IF NOT EXISTS ix_respuestas_cache_expires
                ON respuestas_cache(expires_at);
            "#,
        )
        .map_err(|e| CacheError::Database {
            message: format!("Failed to initialize cache schema: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::lock_poisoned())
    }

    fn fetch(conn: &Connection, query_hash: &str) -> Result<Option<CacheEntry>> {
        let entry = conn
            .query_row(
                &format!(
                    "SELECT {} FROM respuestas_cache WHERE query_hash = ?1",
                    ENTRY_COLUMNS
                ),
                params![query_hash],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }
}

impl CacheStore for SqliteCacheStore {
    fn lookup(&self, query_hash: &str) -> Result<Option<CacheEntry>> {
        if !QueryNormalizer::is_valid_hash(query_hash) {
            debug!("Ignoring lookup for malformed hash: {:?}", query_hash);
            return Ok(None);
        }

        let conn = self.lock()?;
        Self::fetch(&conn, &query_hash.to_ascii_lowercase())
    }

    fn record_hit(
        &self,
        query_hash: &str,
        tokens_saved_estimate: u64,
    ) -> Result<Option<CacheEntry>> {
        if !QueryNormalizer::is_valid_hash(query_hash) {
            return Ok(None);
        }
        let query_hash = query_hash.to_ascii_lowercase();
        let now = format_timestamp(Utc::now());
        let tokens = i64::try_from(tokens_saved_estimate).unwrap_or(i64::MAX);

        let conn = self.lock()?;

        // Counters are incremented in SQL so concurrent hits never lose updates.
        let updated = conn.execute(
            r#"
            UPDATE respuestas_cache
            SET hits = hits + 1,
                tokens_ahorrados = tokens_ahorrados + ?2,
                last_used_at = MAX(last_used_at, ?3)
            WHERE query_hash = ?1
            "#,
            params![query_hash, tokens, now],
        )?;

        if updated == 0 {
            debug!("Hit on purged entry: {}", query_hash);
            return Ok(None);
        }

        Self::fetch(&conn, &query_hash)
    }

    fn store(
        &self,
        question: &str,
        context_summary: Option<&str>,
        answer: &str,
        ttl: Option<Duration>,
    ) -> Result<CacheEntry> {
        let query_hash = QueryNormalizer::hash(question, context_summary);
        let now = Utc::now();
        let now_str = format_timestamp(now);
        let expires_str = CachePolicy::expires_at(now, ttl).map(format_timestamp);

        let conn = self.lock()?;
        let tx = rusqlite::Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;

        // An expired row would otherwise shadow the new answer until the next sweep.
        tx.execute(
            r#"
            DELETE FROM respuestas_cache
            WHERE query_hash = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2
            "#,
            params![query_hash, now_str],
        )?;

        let inserted = tx.execute(
            r#"
            INSERT INTO respuestas_cache
            (query_hash, pregunta, contexto_resumido, respuesta, hits, tokens_ahorrados,
             created_at, last_used_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, ?5, ?6)
            ON CONFLICT(query_hash) DO NOTHING
            "#,
            params![
                query_hash,
                question,
                context_summary,
                answer,
                now_str,
                expires_str
            ],
        )?;

        if inserted == 0 {
            // Losing writer of a concurrent miss: the first answer stays, but
            // the row counts as used now.
            tx.execute(
                r#"
                UPDATE respuestas_cache
                SET last_used_at = MAX(last_used_at, ?2)
                WHERE query_hash = ?1
                "#,
                params![query_hash, now_str],
            )?;
            debug!("Answer already cached, touched existing row: {}", query_hash);
        } else {
            debug!("Cached new answer: {}", query_hash);
        }

        let entry = Self::fetch(&tx, &query_hash)?;
        tx.commit()?;

        entry.ok_or_else(|| CacheError::Database {
            message: format!("Cache entry {} missing after insert", query_hash),
            source: None,
        })
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock()?;

        let deleted = conn
            .execute(
                "DELETE FROM respuestas_cache WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![format_timestamp(now)],
            )
            .map_err(|e| CacheError::Database {
                message: format!("Failed to purge expired entries: {}", e),
                source: Some(e),
            })?;

        if deleted > 0 {
            debug!("Purged {} expired cache entries", deleted);
        }

        Ok(deleted)
    }

    fn stats(&self) -> Result<CacheStats> {
        let conn = self.lock()?;
        let now = format_timestamp(Utc::now());

        let (total, hits, tokens, oldest, newest): (
            i64,
            i64,
            i64,
            Option<String>,
            Option<String>,
        ) = conn.query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(hits), 0), COALESCE(SUM(tokens_ahorrados), 0),
                   MIN(created_at), MAX(created_at)
            FROM respuestas_cache
            "#,
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )?;

        let expired: i64 = conn.query_row(
            "SELECT COUNT(*) FROM respuestas_cache WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now],
            |row| row.get(0),
        )?;

        Ok(CacheStats {
            total_entries: total.max(0) as usize,
            expired_entries: expired.max(0) as usize,
            total_hits: hits.max(0) as u64,
            total_tokens_saved: tokens.max(0) as u64,
            oldest_entry: oldest.as_deref().and_then(|s| parse_timestamp(s).ok()),
            newest_entry: newest.as_deref().and_then(|s| parse_timestamp(s).ok()),
        })
    }

    fn top_entries(&self, limit: usize) -> Result<Vec<CacheEntry>> {
        let conn = self.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM respuestas_cache ORDER BY hits DESC, created_at ASC LIMIT ?1",
            ENTRY_COLUMNS
        ))?;

        let entries = stmt
            .query_map(params![limit], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    fn remove(&self, query_hash: &str) -> Result<bool> {
        if !QueryNormalizer::is_valid_hash(query_hash) {
            return Ok(false);
        }

        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM respuestas_cache WHERE query_hash = ?1",
            params![query_hash.to_ascii_lowercase()],
        )?;

        Ok(deleted > 0)
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.lock()?;

        let deleted = conn
            .execute("DELETE FROM respuestas_cache", [])
            .map_err(|e| CacheError::Database {
                message: format!("Failed to clear cache entries: {}", e),
                source: Some(e),
            })?;

        info!("Cleared {} cache entries", deleted);
        Ok(deleted)
    }
}

/// Fixed-width UTC timestamp so text order equals time order.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    let hits: i64 = row.get(5)?;
    let tokens: i64 = row.get(6)?;
    let expires_at = match row.get::<_, Option<String>>(9)? {
        Some(_) => Some(timestamp_column(row, 9)?),
        None => None,
    };

    Ok(CacheEntry {
        id: row.get(0)?,
        query_hash: row.get(1)?,
        question: row.get(2)?,
        context_summary: row.get(3)?,
        answer: row.get(4)?,
        hit_count: hits.max(0) as u64,
        tokens_saved: tokens.max(0) as u64,
        created_at: timestamp_column(row, 7)?,
        last_used_at: timestamp_column(row, 8)?,
        expires_at,
    })
}
