use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::{Page, RequestKey};

/// Best-effort page cache consumed by the repository.
///
/// `read` returns `None` on a miss *or* on any internal failure; the caller
/// cannot tell the two apart. `write` never fails from the caller's point of
/// view. Implementations log their own errors.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn read(&self, key: &RequestKey) -> Option<Page>;
    async fn write(&self, key: &RequestKey, page: &Page);
}

// ============================================================================
// No-op cache
// ============================================================================

/// Cache that never hits and discards writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait]
impl ResponseCache for NoCache {
    async fn read(&self, _key: &RequestKey) -> Option<Page> {
        None
    }

    async fn write(&self, _key: &RequestKey, _page: &Page) {}
}

// ============================================================================
// In-memory LRU cache
// ============================================================================

/// Bounded in-process page cache with least-recently-used eviction.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<Mutex<LruCache<RequestKey, Page>>>,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` pages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn read(&self, key: &RequestKey) -> Option<Page> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    async fn write(&self, key: &RequestKey, page: &Page) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.put(key.clone(), page.clone());
    }
}

// ============================================================================
// Layered cache
// ============================================================================

/// Two-level cache: a fast front layer backed by a slower durable one.
///
/// Reads try the front first and promote back-layer hits into it.
/// Writes go to both.
pub struct LayeredCache {
    front: Arc<dyn ResponseCache>,
    back: Arc<dyn ResponseCache>,
}

impl LayeredCache {
    pub fn new(front: Arc<dyn ResponseCache>, back: Arc<dyn ResponseCache>) -> Self {
        Self { front, back }
    }
}

#[async_trait]
impl ResponseCache for LayeredCache {
    async fn read(&self, key: &RequestKey) -> Option<Page> {
        if let Some(page) = self.front.read(key).await {
            return Some(page);
        }
        let page = self.back.read(key).await?;
        self.front.write(key, &page).await;
        Some(page)
    }

    async fn write(&self, key: &RequestKey, page: &Page) {
        self.front.write(key, page).await;
        self.back.write(key, page).await;
    }
}
