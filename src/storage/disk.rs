//! File-backed cache storage
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<bucket>/bucket.json                 creation metadata
//! <root>/<bucket>/entries/<hash>.json         request key, response head, body file name
//! <root>/<bucket>/entries/<hash>.<uuid>.body  response body
//! ```
//!
//! Entry files are named by the SHA256 of the cache key. A put writes its
//! body under a fresh name first, then renames the entry file into place, so
//! that single rename swaps head and body together. Readers see either the
//! previous entry or the new one, never a mix.

use super::{storable_key, validate_bucket_name, CacheBucket, CacheStorage};
use crate::error::{AgentError, AgentResult};
use crate::request::{CacheKey, Request, Response, ResponseKind};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

const BUCKET_META: &str = "bucket.json";
const ENTRIES_DIR: &str = "entries";

/// Bucket metadata persisted next to its entries
#[derive(Debug, Serialize, Deserialize)]
struct BucketMeta {
    name: String,
    created_at: DateTime<Utc>,
}

/// Entry head persisted as JSON. `body` names the body file it owns.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: CacheKey,
    status: u16,
    kind: ResponseKind,
    headers: Vec<(String, String)>,
    body: String,
}

/// Attempts at reading a head and its body before giving up with a miss
const READ_ATTEMPTS: usize = 3;

/// Cache storage rooted at a directory, one subdirectory per bucket
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    async fn read_meta(dir: &Path) -> Option<BucketMeta> {
        let content = fs::read_to_string(dir.join(BUCKET_META)).await.ok()?;
        serde_json::from_str(&content).ok()
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> AgentResult<Arc<dyn CacheBucket>> {
        validate_bucket_name(name)?;

        let dir = self.bucket_dir(name);
        let open_err = |e: std::io::Error| AgentError::CacheOpen {
            name: name.to_string(),
            reason: e.to_string(),
        };

        fs::create_dir_all(dir.join(ENTRIES_DIR))
            .await
            .map_err(open_err)?;

        if Self::read_meta(&dir).await.is_none() {
            let meta = BucketMeta {
                name: name.to_string(),
                created_at: Utc::now(),
            };
            let content = serde_json::to_vec_pretty(&meta)?;
            write_atomic(&dir.join(BUCKET_META), &content)
                .await
                .map_err(open_err)?;
            debug!("Created cache bucket {} at {}", name, dir.display());
        }

        Ok(Arc::new(DiskBucket {
            name: name.to_string(),
            dir,
        }))
    }

    async fn has(&self, name: &str) -> AgentResult<bool> {
        if validate_bucket_name(name).is_err() {
            return Ok(false);
        }
        Ok(fs::metadata(self.bucket_dir(name).join(BUCKET_META))
            .await
            .is_ok())
    }

    async fn keys(&self) -> AgentResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(AgentError::io(
                    format!("reading cache root {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut buckets = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AgentError::io("reading cache root entry", e))?
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(meta) = Self::read_meta(&path).await {
                buckets.push(meta);
            }
        }

        buckets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(buckets.into_iter().map(|m| m.name).collect())
    }

    async fn delete(&self, name: &str) -> AgentResult<bool> {
        if validate_bucket_name(name).is_err() {
            return Ok(false);
        }

        match fs::remove_dir_all(self.bucket_dir(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AgentError::CacheDelete {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}

/// A bucket stored as a directory of entry files
#[derive(Debug)]
pub struct DiskBucket {
    name: String,
    dir: PathBuf,
}

impl DiskBucket {
    fn entries_dir(&self) -> PathBuf {
        self.dir.join(ENTRIES_DIR)
    }

    fn head_path(&self, key: &CacheKey) -> PathBuf {
        self.entries_dir().join(format!("{}.json", hash_key(key)))
    }

    /// Body file named by a head, rejecting anything outside the entries dir
    fn body_path(&self, name: &str) -> Option<PathBuf> {
        let plain = Path::new(name).file_name().is_some_and(|n| n == name);
        (plain && name.ends_with(".body")).then(|| self.entries_dir().join(name))
    }

    async fn read_head(&self, path: &Path) -> AgentResult<Option<StoredEntry>> {
        match fs::read(path).await {
            Ok(head) => serde_json::from_slice(&head)
                .map(Some)
                .map_err(|e| self.read_err(e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.read_err(e)),
        }
    }

    fn read_err(&self, e: impl ToString) -> AgentError {
        AgentError::CacheRead {
            name: self.name.clone(),
            reason: e.to_string(),
        }
    }

    fn write_err(&self, e: impl ToString) -> AgentError {
        AgentError::CacheWrite {
            name: self.name.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl CacheBucket for DiskBucket {
    async fn match_request(&self, request: &Request) -> AgentResult<Option<Response>> {
        let key = request.cache_key();
        if !key.is_cacheable() {
            return Ok(None);
        }

        let head_path = self.head_path(&key);
        for _ in 0..READ_ATTEMPTS {
            let Some(stored) = self.read_head(&head_path).await? else {
                return Ok(None);
            };

            // Hash collision or a foreign file: treat as a miss
            if stored.key != key {
                return Ok(None);
            }
            let Some(body_path) = self.body_path(&stored.body) else {
                return Err(self.read_err(format!("bad body file name '{}'", stored.body)));
            };

            match fs::read(&body_path).await {
                Ok(body) => {
                    return Ok(Some(Response {
                        status: stored.status,
                        kind: stored.kind,
                        headers: stored.headers,
                        body: Bytes::from(body),
                    }))
                }
                // Replaced between reading the head and the body; read the new head
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Entry {} replaced during read, retrying", key);
                }
                Err(e) => return Err(self.read_err(e)),
            }
        }

        Ok(None)
    }

    async fn put(&self, request: &Request, response: Response) -> AgentResult<()> {
        let key = storable_key(&self.name, request)?;
        let head_path = self.head_path(&key);
        let previous = self.read_head(&head_path).await.ok().flatten();

        let body_name = format!("{}.{}.body", hash_key(&key), Uuid::new_v4().simple());
        let body_path = self.entries_dir().join(&body_name);
        fs::write(&body_path, &response.body)
            .await
            .map_err(|e| self.write_err(e))?;

        let stored = StoredEntry {
            key,
            status: response.status,
            kind: response.kind,
            headers: response.headers,
            body: body_name,
        };
        let head = serde_json::to_vec_pretty(&stored)?;
        if let Err(e) = write_atomic(&head_path, &head).await {
            let _ = fs::remove_file(&body_path).await;
            return Err(self.write_err(e));
        }

        // The replaced head's body is unreachable now
        if let Some(body_path) = previous.and_then(|p| self.body_path(&p.body)) {
            if let Err(e) = fs::remove_file(&body_path).await {
                if e.kind() != ErrorKind::NotFound {
                    debug!("Could not remove old body {}: {}", body_path.display(), e);
                }
            }
        }

        Ok(())
    }

    async fn keys(&self) -> AgentResult<Vec<CacheKey>> {
        let mut entries = fs::read_dir(self.entries_dir())
            .await
            .map_err(|e| self.read_err(e))?;

        let mut keys = vec![];
        while let Some(entry) = entries.next_entry().await.map_err(|e| self.read_err(e))? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Ok(content) = fs::read(&path).await {
                    if let Ok(stored) = serde_json::from_slice::<StoredEntry>(&content) {
                        keys.push(stored.key);
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Hash a cache key using SHA256, returning the full hex digest
fn hash_key(key: &CacheKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.method.as_bytes());
    hasher.update(b" ");
    hasher.update(key.url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Write to a unique temporary sibling, then rename over the target
async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
    fs::write(&tmp, contents).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn req(url: &str) -> Request {
        Request::parse(url).unwrap()
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let request = req("http://localhost:5000/manifest.json");

        {
            let storage = DiskCacheStorage::new(temp.path());
            let bucket = storage.open("youtube-pwa-v1").await.unwrap();
            let response = Response::new(200, r#"{"name":"app"}"#)
                .with_header("Content-Type", "application/json");
            bucket.put(&request, response).await.unwrap();
        }

        let storage = DiskCacheStorage::new(temp.path());
        assert!(storage.has("youtube-pwa-v1").await.unwrap());
        let bucket = storage.open("youtube-pwa-v1").await.unwrap();
        let hit = bucket.match_request(&request).await.unwrap().unwrap();

        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, r#"{"name":"app"}"#);
        assert_eq!(hit.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn keys_in_creation_order() {
        let temp = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(temp.path());

        storage.open("youtube-pwa-v0").await.unwrap();
        storage.open("youtube-pwa-v1").await.unwrap();

        let keys = storage.keys().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"youtube-pwa-v0".to_string()));
        assert!(keys.contains(&"youtube-pwa-v1".to_string()));
    }

    #[tokio::test]
    async fn keys_on_missing_root() {
        let temp = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(temp.path().join("nope"));
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_directory() {
        let temp = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(temp.path());
        let bucket = storage.open("youtube-pwa-v0").await.unwrap();
        bucket
            .put(&req("http://localhost/"), Response::new(200, "x"))
            .await
            .unwrap();

        assert!(storage.delete("youtube-pwa-v0").await.unwrap());
        assert!(!temp.path().join("youtube-pwa-v0").exists());
        assert!(!storage.delete("youtube-pwa-v0").await.unwrap());
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_replaces_and_lists_keys() {
        let temp = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(temp.path());
        let bucket = storage.open("v1").await.unwrap();
        let request = req("http://localhost/index.html");

        bucket.put(&request, Response::new(200, "one")).await.unwrap();
        bucket.put(&request, Response::new(200, "two")).await.unwrap();
        bucket
            .put(&req("http://localhost/"), Response::new(200, "root"))
            .await
            .unwrap();

        let keys = bucket.keys().await.unwrap();
        assert_eq!(keys.len(), 2);
        let hit = bucket.match_request(&request).await.unwrap().unwrap();
        assert_eq!(hit.body, "two");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_never_mix_head_and_body() {
        let temp = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(temp.path());
        let bucket = storage.open("v1").await.unwrap();
        let request = req("http://localhost/app.js");
        bucket.put(&request, Response::new(200, "aaaa")).await.unwrap();

        let writer = {
            let bucket = bucket.clone();
            let request = request.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    let response = if i % 2 == 0 {
                        Response::new(201, "bbbbbbbb")
                    } else {
                        Response::new(200, "aaaa")
                    };
                    bucket.put(&request, response).await.unwrap();
                }
            })
        };

        let mut reads = 0;
        while !writer.is_finished() {
            if let Some(hit) = bucket.match_request(&request).await.unwrap() {
                let expected = if hit.status == 200 { "aaaa" } else { "bbbbbbbb" };
                assert_eq!(hit.body, expected, "status {} served a foreign body", hit.status);
                reads += 1;
            }
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        let last = bucket.match_request(&request).await.unwrap().unwrap();
        assert_eq!((last.status, last.body.as_ref()), (200, b"aaaa".as_ref()));
        assert!(reads > 0);
    }

    #[tokio::test]
    async fn replaced_body_file_is_removed() {
        let temp = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(temp.path());
        let bucket = storage.open("v1").await.unwrap();
        let request = req("http://localhost/index.html");

        for body in ["one", "two", "three"] {
            bucket.put(&request, Response::new(200, body)).await.unwrap();
        }

        let bodies = std::fs::read_dir(temp.path().join("v1").join(ENTRIES_DIR))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "body"))
            .count();
        assert_eq!(bodies, 1);
    }

    #[tokio::test]
    async fn head_naming_foreign_body_is_rejected() {
        let temp = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(temp.path());
        let bucket = storage.open("v1").await.unwrap();
        let request = req("http://localhost/");
        bucket.put(&request, Response::new(200, "root")).await.unwrap();

        let head_path = temp
            .path()
            .join("v1")
            .join(ENTRIES_DIR)
            .join(format!("{}.json", hash_key(&request.cache_key())));
        let mut stored: StoredEntry =
            serde_json::from_slice(&std::fs::read(&head_path).unwrap()).unwrap();
        stored.body = "../../bucket.json".to_string();
        std::fs::write(&head_path, serde_json::to_vec(&stored).unwrap()).unwrap();

        assert!(bucket.match_request(&request).await.is_err());
    }

    #[tokio::test]
    async fn traversal_names_rejected() {
        let temp = TempDir::new().unwrap();
        let storage = DiskCacheStorage::new(temp.path());
        assert!(storage.open("../outside").await.is_err());
        assert!(!storage.has("../outside").await.unwrap());
        assert!(!storage.delete("../outside").await.unwrap());
    }

    #[test]
    fn key_hash_is_stable() {
        let key = req("http://localhost/").cache_key();
        assert_eq!(hash_key(&key), hash_key(&key));
        assert_eq!(hash_key(&key).len(), 64);
    }
}
