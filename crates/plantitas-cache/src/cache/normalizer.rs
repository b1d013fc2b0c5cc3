//! Canonical cache keys for (question, context) pairs.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const QUERY_HASH_LEN: usize = 64;

/// Produces stable lookup keys for semantically equivalent requests.
///
/// Two requests that differ only in surrounding whitespace, internal
/// whitespace runs, or letter case map to the same key. A missing context and
/// a blank context are the same request.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryNormalizer;

impl QueryNormalizer {
    /// Trim, collapse whitespace runs, and case-fold.
    pub fn normalize(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// SHA-256 of the normalized pair as 64 lowercase hex characters.
    ///
    /// Each field is prefixed with its byte length so no choice of field
    /// contents can shift the boundary between question and context.
    pub fn hash(question: &str, context_summary: Option<&str>) -> String {
        let question = Self::normalize(question);
        let context = context_summary.map(Self::normalize).unwrap_or_default();

        let mut hasher = Sha256::new();
        for field in [&question, &context] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Check that `hash` looks like something [`QueryNormalizer::hash`] produced.
    pub fn is_valid_hash(hash: &str) -> bool {
        hash.len() == QUERY_HASH_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())
    }
}
