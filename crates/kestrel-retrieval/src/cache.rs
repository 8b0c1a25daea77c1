//! Result cache: TTL + LRU storage with single-flight coalescing.
//!
//! At most one computation runs per key; concurrent callers for the same key
//! wait on the in-flight computation and observe its result. Errors are
//! shared with waiters but never stored.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio::sync::{watch, Mutex};
use tracing::debug;

use kestrel_config::CacheConfig;

use crate::types::{Filters, RetrievalError, RetrievalMethod, RetrievedDocument};

type CacheValue = Vec<RetrievedDocument>;
type FlightResult = Result<CacheValue, RetrievalError>;

/// Canonical cache key over (normalized query, k, method, filters). The
/// query is lowercased with whitespace collapsed so trivially different
/// spellings coalesce.
pub fn cache_key(query: &str, k: usize, method: RetrievalMethod, filters: &Filters) -> String {
    let normalized: String = query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let filter_part: String = filters
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(";");

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update([1u8]);
    hasher.update(k.to_le_bytes());
    hasher.update([1u8]);
    hasher.update(method.as_str().as_bytes());
    hasher.update([1u8]);
    hasher.update(filter_part.as_bytes());
    format!("{:x}", hasher.finalize())
}

struct Entry {
    value: CacheValue,
    inserted_at: Instant,
}

/// TTL + LRU storage. Mutations hold a short std mutex; nothing is awaited
/// under it.
struct Store {
    entries: HashMap<String, Entry>,
    access_order: VecDeque<String>,
    max_entries: usize,
    ttl: Duration,
}

impl Store {
    fn get(&mut self, key: &str) -> Option<CacheValue> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            self.remove(key);
            return None;
        }

        self.access_order.retain(|k| k != key);
        self.access_order.push_back(key.to_string());
        self.entries.get(key).map(|e| e.value.clone())
    }

    fn put(&mut self, key: String, value: CacheValue) {
        while self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            match self.access_order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.access_order.retain(|k| k != &key);
        self.access_order.push_back(key.clone());
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    fn remove(&mut self, key: &str) {
        self.access_order.retain(|k| k != key);
        self.entries.remove(key);
    }
}

pub struct QueryCache {
    store: StdMutex<Store>,
    inflight: Mutex<HashMap<String, watch::Receiver<Option<FlightResult>>>>,
}

impl QueryCache {
    pub fn new(cfg: CacheConfig) -> Self {
        Self {
            store: StdMutex::new(Store {
                entries: HashMap::new(),
                access_order: VecDeque::new(),
                max_entries: cfg.max_entries,
                ttl: Duration::from_secs(cfg.ttl_s),
            }),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `(result, served_without_backend_call)`. The boolean is true
    /// for stored hits and for waiters coalesced onto another caller's
    /// computation.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> (FlightResult, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FlightResult>,
    {
        if let Some(value) = self.lookup(key) {
            return (Ok(value), true);
        }

        let role = {
            let mut inflight = self.inflight.lock().await;
            // Re-check under the in-flight lock so a computation finishing
            // between the lookup and here is not repeated.
            if let Some(value) = self.lookup(key) {
                return (Ok(value), true);
            }
            match inflight.get(key) {
                Some(rx) => Role::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(key.to_string(), rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Leader(tx) => {
                let result = compute().await;
                if let Ok(value) = &result {
                    self.store
                        .lock()
                        .expect("cache store mutex poisoned")
                        .put(key.to_string(), value.clone());
                } else {
                    debug!(key, "not caching failed retrieval");
                }
                let _ = tx.send(Some(result.clone()));
                self.inflight.lock().await.remove(key);
                (result, false)
            }
            Role::Follower(mut rx) => loop {
                let settled = rx.borrow().clone();
                if let Some(result) = settled {
                    return (result, true);
                }
                if rx.changed().await.is_err() {
                    return (
                        Err(RetrievalError::Internal(
                            "in-flight retrieval abandoned".into(),
                        )),
                        true,
                    );
                }
            },
        }
    }

    fn lookup(&self, key: &str) -> Option<CacheValue> {
        self.store
            .lock()
            .expect("cache store mutex poisoned")
            .get(key)
    }

    /// Entry count, for introspection.
    pub fn len(&self) -> usize {
        self.store
            .lock()
            .expect("cache store mutex poisoned")
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

enum Role {
    Leader(watch::Sender<Option<FlightResult>>),
    Follower(watch::Receiver<Option<FlightResult>>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn cfg(ttl_s: u64, max_entries: usize) -> CacheConfig {
        CacheConfig { ttl_s, max_entries }
    }

    fn doc(id: &str) -> RetrievedDocument {
        RetrievedDocument {
            doc_id: id.to_string(),
            text: format!("text {id}"),
            score: 1.0,
            source_metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn keys_normalize_query_text() {
        let a = cache_key("  Rust   Retrieval ", 5, RetrievalMethod::Hybrid, &Filters::new());
        let b = cache_key("rust retrieval", 5, RetrievalMethod::Hybrid, &Filters::new());
        assert_eq!(a, b);

        let c = cache_key("rust retrieval", 6, RetrievalMethod::Hybrid, &Filters::new());
        assert_ne!(a, c);
        let d = cache_key("rust retrieval", 5, RetrievalMethod::Dense, &Filters::new());
        assert_ne!(a, d);
    }

    #[tokio::test]
    async fn second_call_hits_the_cache() {
        let cache = QueryCache::new(cfg(600, 16));
        let calls = Arc::new(AtomicUsize::new(0));

        for expect_hit in [false, true] {
            let calls = calls.clone();
            let (result, hit) = cache
                .get_or_compute("k1", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![doc("d1")])
                })
                .await;
            assert_eq!(result.unwrap()[0].doc_id, "d1");
            assert_eq!(hit, expect_hit);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_flight_coalesces_concurrent_callers() {
        let cache = Arc::new(QueryCache::new(cfg(600, 16)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("hot", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(vec![doc("shared")])
                    })
                    .await
            }));
        }

        for handle in handles {
            let (result, _) = handle.await.unwrap();
            assert_eq!(result.unwrap()[0].doc_id, "shared");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_are_shared_but_not_cached() {
        let cache = QueryCache::new(cfg(600, 16));
        let calls = Arc::new(AtomicUsize::new(0));

        {
            let calls = calls.clone();
            let (result, _) = cache
                .get_or_compute("bad", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(RetrievalError::Unavailable("down".into()))
                })
                .await;
            assert!(result.is_err());
        }

        // The failure was not stored; the next caller recomputes.
        {
            let calls = calls.clone();
            let (result, hit) = cache
                .get_or_compute("bad", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![doc("recovered")])
                })
                .await;
            assert!(!hit);
            assert_eq!(result.unwrap()[0].doc_id, "recovered");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn ttl_expires_entries() {
        let cache = QueryCache::new(cfg(600, 16));
        let (_, _) = cache.get_or_compute("k", || async { Ok(vec![doc("d")]) }).await;

        // Force expiry by rewriting the entry's insertion time.
        {
            let mut store = cache.store.lock().unwrap();
            store.ttl = Duration::from_millis(0);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;

        let (_, hit) = cache.get_or_compute("k", || async { Ok(vec![doc("d2")]) }).await;
        assert!(!hit);
    }

    #[tokio::test]
    async fn lru_evicts_the_oldest_entry() {
        let cache = QueryCache::new(cfg(600, 2));
        let _ = cache.get_or_compute("a", || async { Ok(vec![doc("a")]) }).await;
        let _ = cache.get_or_compute("b", || async { Ok(vec![doc("b")]) }).await;

        // Touch "a" so "b" becomes the eviction candidate.
        let (_, hit_a) = cache.get_or_compute("a", || async { Ok(vec![]) }).await;
        assert!(hit_a);

        let _ = cache.get_or_compute("c", || async { Ok(vec![doc("c")]) }).await;
        assert_eq!(cache.len(), 2);

        let (_, hit_b) = cache.get_or_compute("b", || async { Ok(vec![doc("b2")]) }).await;
        assert!(!hit_b);
    }
}
