//! In-memory cache storage

use super::{storable_key, validate_bucket_name, CacheBucket, CacheStorage};
use crate::error::AgentResult;
use crate::request::{CacheKey, Request, Response};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cache storage that lives for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    // Vec keeps creation order for `keys()`
    buckets: RwLock<Vec<Arc<MemoryBucket>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> AgentResult<Arc<dyn CacheBucket>> {
        validate_bucket_name(name)?;

        let mut buckets = self.buckets.write().await;
        if let Some(bucket) = buckets.iter().find(|b| b.name == name) {
            return Ok(bucket.clone());
        }

        let bucket = Arc::new(MemoryBucket::new(name));
        buckets.push(bucket.clone());
        Ok(bucket)
    }

    async fn has(&self, name: &str) -> AgentResult<bool> {
        Ok(self.buckets.read().await.iter().any(|b| b.name == name))
    }

    async fn keys(&self) -> AgentResult<Vec<String>> {
        Ok(self
            .buckets
            .read()
            .await
            .iter()
            .map(|b| b.name.clone())
            .collect())
    }

    async fn delete(&self, name: &str) -> AgentResult<bool> {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|b| b.name != name);
        Ok(buckets.len() != before)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// A single in-memory bucket
#[derive(Debug)]
pub struct MemoryBucket {
    name: String,
    entries: RwLock<HashMap<CacheKey, Response>>,
}

impl MemoryBucket {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CacheBucket for MemoryBucket {
    async fn match_request(&self, request: &Request) -> AgentResult<Option<Response>> {
        let key = request.cache_key();
        if !key.is_cacheable() {
            return Ok(None);
        }
        Ok(self
            .entries
            .read()
            .await
            .get(&key)
            .cloned())
    }

    async fn put(&self, request: &Request, response: Response) -> AgentResult<()> {
        let key = storable_key(&self.name, request)?;
        self.entries
            .write()
            .await
            .insert(key, response);
        Ok(())
    }

    async fn keys(&self) -> AgentResult<Vec<CacheKey>> {
        let mut keys: Vec<CacheKey> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use http::Method;

    fn req(url: &str) -> Request {
        Request::parse(url).unwrap()
    }

    #[tokio::test]
    async fn open_creates_once() {
        let storage = MemoryCacheStorage::new();
        storage.open("v1").await.unwrap();
        storage.open("v1").await.unwrap();
        storage.open("v0").await.unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["v1", "v0"]);
        assert!(storage.has("v0").await.unwrap());
        assert!(!storage.has("v2").await.unwrap());
    }

    #[tokio::test]
    async fn put_then_match() {
        let storage = MemoryCacheStorage::new();
        let bucket = storage.open("v1").await.unwrap();
        let request = req("http://localhost/index.html");

        assert!(bucket.match_request(&request).await.unwrap().is_none());
        bucket
            .put(&request, Response::new(200, "<html>"))
            .await
            .unwrap();

        let hit = bucket.match_request(&request).await.unwrap().unwrap();
        assert_eq!(hit.body, "<html>");
    }

    #[tokio::test]
    async fn put_replaces_entry() {
        let storage = MemoryCacheStorage::new();
        let bucket = storage.open("v1").await.unwrap();
        let request = req("http://localhost/");

        bucket.put(&request, Response::new(200, "old")).await.unwrap();
        bucket.put(&request, Response::new(200, "new")).await.unwrap();

        assert_eq!(bucket.keys().await.unwrap().len(), 1);
        let hit = bucket.match_request(&request).await.unwrap().unwrap();
        assert_eq!(hit.body, "new");
    }

    #[tokio::test]
    async fn non_get_is_rejected() {
        let storage = MemoryCacheStorage::new();
        let bucket = storage.open("v1").await.unwrap();
        let request = req("http://localhost/app.js").with_method(Method::POST);

        let err = bucket
            .put(&request, Response::new(200, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UnsupportedMethod(_)));
        assert!(bucket.match_request(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_drops_entries() {
        let storage = MemoryCacheStorage::new();
        let bucket = storage.open("v0").await.unwrap();
        bucket
            .put(&req("http://localhost/"), Response::new(200, "x"))
            .await
            .unwrap();

        assert!(storage.delete("v0").await.unwrap());
        assert!(!storage.delete("v0").await.unwrap());

        let reopened = storage.open("v0").await.unwrap();
        assert!(reopened.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_name_rejected() {
        let storage = MemoryCacheStorage::new();
        assert!(matches!(
            storage.open("../v1").await,
            Err(AgentError::InvalidBucketName(_))
        ));
    }
}
