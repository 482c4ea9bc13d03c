//! Persistent cache storage organised into named generations
//!
//! A storage holds any number of independently named buckets. Each bucket
//! maps a request identity (method + URL) to a fully buffered response
//! snapshot. Buckets are never mutated in place: a put replaces the whole
//! entry, and a stale generation is dropped by deleting its bucket.
//!
//! # Backends
//!
//! | Backend | Persistence | Used by |
//! |---------|-------------|---------|
//! | [`MemoryCacheStorage`] | process lifetime | tests, embedding |
//! | [`DiskCacheStorage`] | one directory per bucket | CLI |

mod disk;
mod memory;

pub use disk::DiskCacheStorage;
pub use memory::MemoryCacheStorage;

use crate::error::{AgentError, AgentResult};
use crate::request::{CacheKey, Request, Response};
use async_trait::async_trait;
use std::sync::Arc;

/// Origin-scoped collection of named cache buckets
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a bucket, creating it if absent
    async fn open(&self, name: &str) -> AgentResult<Arc<dyn CacheBucket>>;

    /// Whether a bucket with this name exists
    async fn has(&self, name: &str) -> AgentResult<bool>;

    /// Names of every bucket, in creation order where the backend knows it
    async fn keys(&self) -> AgentResult<Vec<String>>;

    /// Delete a bucket. Returns false when it did not exist.
    async fn delete(&self, name: &str) -> AgentResult<bool>;

    /// Human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}

/// One named generation of cached responses
#[async_trait]
pub trait CacheBucket: Send + Sync {
    /// Look up the stored snapshot for a request. Non-GET requests never match.
    async fn match_request(&self, request: &Request) -> AgentResult<Option<Response>>;

    /// Store a snapshot, replacing any previous entry for the same key
    async fn put(&self, request: &Request, response: Response) -> AgentResult<()>;

    /// Every entry key currently held
    async fn keys(&self) -> AgentResult<Vec<CacheKey>>;
}

/// Reject names that cannot safely map onto a backend namespace
pub fn validate_bucket_name(name: &str) -> AgentResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(AgentError::InvalidBucketName(name.to_string()))
    }
}

/// Key for a put, rejecting requests that cannot be stored
pub(crate) fn storable_key(bucket: &str, request: &Request) -> AgentResult<CacheKey> {
    let key = request.cache_key();
    if !key.is_cacheable() {
        return Err(AgentError::UnsupportedMethod(format!(
            "{} (cache {})",
            key.method, bucket
        )));
    }
    Ok(key)
}
