//! Response caching with request coalescing.
//!
//! Raw (decoded) response text is cached per request: the key embeds a hash of
//! the resolved URL and body, so an altered request never reads a stale entry.
//! Concurrent misses on the same key share one in-flight fetch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use pulse_host_http::HttpError;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Outcome of one fetch, shared by every caller waiting on it.
pub type FetchResult = Result<String, HttpError>;

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Hex characters of the request hash kept in cache keys.
const HASH_LEN: usize = 16;

struct CacheEntry {
  body: String,
  stored_at: Instant,
}

/// Process-wide response cache and in-flight request table.
///
/// There is no size bound: the key space is bounded by configuration
/// (instances × targets × steps × distinct requests), not by request volume.
#[derive(Clone, Default)]
pub struct ResponseCache {
  entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
  in_flight: Arc<Mutex<HashMap<String, SharedFetch>>>,
}

impl ResponseCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Cache key: `<prefix>_<stepId>_<hash(url + body)>`, where the prefix is
  /// `<instanceId><targetSuffix>`.
  pub fn key(prefix: &str, step_id: &str, url: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(body.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}_{}_{}", prefix, step_id, &digest[..HASH_LEN])
  }

  /// A live entry for `key`, if any.
  ///
  /// `cache_minutes` of 0 never hits; negative values never expire. Expired
  /// entries are dropped on lookup.
  pub fn get_fresh(&self, key: &str, cache_minutes: i64) -> Option<String> {
    if cache_minutes == 0 {
      return None;
    }

    let mut entries = lock(&self.entries);
    let entry = entries.get(key)?;
    if cache_minutes > 0 {
      let ttl = Duration::from_secs(cache_minutes.unsigned_abs() * 60);
      if entry.stored_at.elapsed() >= ttl {
        entries.remove(key);
        return None;
      }
    }
    Some(entry.body.clone())
  }

  pub fn insert(&self, key: impl Into<String>, body: String) {
    lock(&self.entries).insert(
      key.into(),
      CacheEntry {
        body,
        stored_at: Instant::now(),
      },
    );
  }

  pub fn len(&self) -> usize {
    lock(&self.entries).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn in_flight(&self) -> usize {
    lock(&self.in_flight).len()
  }

  /// Fetch through the in-flight table.
  ///
  /// A fresh cache entry found under the in-flight lock is returned without
  /// fetching. If a fetch for `key` is already running, wait for it;
  /// otherwise spawn `fetch` as a detached task. The task stores a successful
  /// result (when `cache_minutes` ≠ 0) and always removes itself from the
  /// in-flight table.
  ///
  /// Returns `None` when `cancel` fires first. The fetch keeps running, so the
  /// next caller finds a warm cache.
  pub async fn fetch(
    &self,
    key: &str,
    cache_minutes: i64,
    cancel: &CancellationToken,
    fetch: BoxFuture<'static, FetchResult>,
  ) -> Option<FetchResult> {
    let shared = {
      // Lock order is in-flight then entries. The fetch task takes them one
      // at a time and stores its result before leaving the in-flight table,
      // so a miss here means no completed fetch is pending storage.
      let mut in_flight = lock(&self.in_flight);
      if let Some(body) = self.get_fresh(key, cache_minutes) {
        debug!(key = %key, "cache filled by a concurrent fetch");
        return Some(Ok(body));
      }
      match in_flight.get(key) {
        Some(existing) => {
          debug!(key = %key, "joining in-flight request");
          existing.clone()
        }
        None => {
          let shared = self.spawn_fetch(key.to_string(), cache_minutes, fetch);
          in_flight.insert(key.to_string(), shared.clone());
          shared
        }
      }
    };

    tokio::select! {
      result = shared => Some(result),
      _ = cancel.cancelled() => {
        debug!(key = %key, "caller cancelled, fetch continues in background");
        None
      }
    }
  }

  // Called with the in-flight lock held; the spawned task cannot remove its
  // entry before it has been inserted.
  fn spawn_fetch(
    &self,
    key: String,
    cache_minutes: i64,
    fetch: BoxFuture<'static, FetchResult>,
  ) -> SharedFetch {
    let cache = self.clone();
    let handle = tokio::spawn(async move {
      let result = fetch.await;
      if cache_minutes != 0
        && let Ok(body) = &result
      {
        cache.insert(key.clone(), body.clone());
      }
      lock(&cache.in_flight).remove(&key);
      result
    });

    async move {
      handle
        .await
        .unwrap_or_else(|e| Err(HttpError::Aborted(e.to_string())))
    }
    .boxed()
    .shared()
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
