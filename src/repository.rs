//! Cache-first page repository.
//!
//! One [`Repository::fetch_page`] call produces at most two callbacks:
//!
//! - `cached`: zero or one advisory page served from the response cache
//! - `completion`: exactly one authoritative result from the remote fetcher
//!
//! The cache read and the remote fetch run concurrently inside a single
//! spawned task. A cache hit that resolves before the network is delivered
//! immediately; one that loses the race is dropped, so `cached` never fires
//! after `completion`. Both callbacks pass through the handle's
//! [`DeliveryGate`], so neither fires once the handle is cancelled.

use std::sync::Arc;

use crate::domain::{Category, Page, Query, RequestKey};
use crate::fetch::{DeliveryGate, FetchError, FetchHandle, RemoteFetcher};
use crate::storage::ResponseCache;
use crate::util::{catch_task_panic, BackgroundTasks};

/// Receives an advisory page from the cache.
pub type CachedCallback = Box<dyn FnOnce(Page) + Send + 'static>;

/// Receives the authoritative result of a fetch.
pub type CompletionCallback = Box<dyn FnOnce(Result<Page, FetchError>) + Send + 'static>;

/// Orchestrates the response cache and the remote fetcher for page requests.
#[derive(Clone)]
pub struct Repository {
    fetcher: Arc<dyn RemoteFetcher>,
    cache: Arc<dyn ResponseCache>,
    background: BackgroundTasks,
}

impl Repository {
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, cache: Arc<dyn ResponseCache>) -> Self {
        Self {
            fetcher,
            cache,
            background: BackgroundTasks::new(),
        }
    }

    /// Tracker for cache write-backs and other detached writes made on
    /// behalf of this repository. Drain it before closing the stores.
    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    /// Fetch one page, cache-first.
    ///
    /// On remote success the page is written back to the cache (without
    /// waiting for the write) and then handed to `completion`. The write is
    /// tracked by [`Repository::background`]. On failure the cache is left
    /// untouched.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn fetch_page(
        &self,
        category: Category,
        query: &Query,
        page: u32,
        cached: CachedCallback,
        completion: CompletionCallback,
    ) -> FetchHandle {
        let key = RequestKey::new(category, query, page);
        let gate = DeliveryGate::new();
        let task_gate = gate.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let cache = Arc::clone(&self.cache);
        let background = self.background.clone();

        tracing::debug!(key = %key, "Starting page fetch");

        let task = tokio::spawn(async move {
            let outcome = catch_task_panic(race_cache_and_remote(
                fetcher.as_ref(),
                cache.as_ref(),
                &key,
                &task_gate,
                cached,
            ))
            .await;

            let result = match outcome {
                Ok(result) => result,
                Err(panic_msg) => {
                    tracing::error!(key = %key, error = %panic_msg, "Page fetch task panicked");
                    Err(FetchError::Internal(panic_msg))
                }
            };

            match &result {
                Ok(fresh) => {
                    let cache = Arc::clone(&cache);
                    let write_key = key.clone();
                    let fresh = fresh.clone();
                    background.spawn(async move {
                        cache.write(&write_key, &fresh).await;
                    });
                }
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Page fetch failed");
                }
            }

            if !task_gate.deliver(|| completion(result)) {
                tracing::debug!(key = %key, "Completion suppressed by cancellation");
            }
        });

        FetchHandle::new(gate, task)
    }
}

/// Run the cache read and the remote fetch concurrently.
///
/// Delivers a cache hit through `gate` if it lands first, then returns the
/// remote result.
async fn race_cache_and_remote(
    fetcher: &dyn RemoteFetcher,
    cache: &dyn ResponseCache,
    key: &RequestKey,
    gate: &DeliveryGate,
    cached: CachedCallback,
) -> Result<Page, FetchError> {
    let mut cache_read = cache.read(key);
    let mut remote = fetcher.fetch(key);
    let mut cached = Some(cached);

    loop {
        tokio::select! {
            biased;
            hit = &mut cache_read, if cached.is_some() => {
                let callback = cached.take();
                match (hit, callback) {
                    (Some(page), Some(callback)) => {
                        tracing::debug!(key = %key, items = page.len(), "Serving cached page");
                        gate.deliver(|| callback(page));
                    }
                    _ => tracing::trace!(key = %key, "Page cache miss"),
                }
            }
            result = &mut remote => {
                if cached.is_some() {
                    tracing::trace!(key = %key, "Remote fetch finished before cache read, skipping cached page");
                }
                return result;
            }
        }
    }
}
