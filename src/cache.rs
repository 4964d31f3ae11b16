//! Listing cache
//!
//! Memoized, revalidating fetch per backend path. An entry is refetched
//! when it is missing, explicitly invalidated, older than the stale time,
//! or the window regained focus since it was fetched. Concurrent requests
//! for one path share a single in-flight network call.
//!
//! Writes are keyed by path: a late response can only ever land under the
//! key it was fetched for, so a listing that arrives after the user has
//! navigated away cannot clobber the path they are now viewing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

use crate::api::{ApiError, FileEntry, ListingSource};

/// Age after which a cached listing is eligible for revalidation.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

type FetchResult = Result<Vec<FileEntry>, ApiError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Snapshot of one cache slot as returned to callers.
#[derive(Debug, Clone)]
pub struct Listing {
    pub entries: Vec<FileEntry>,
    pub is_loading: bool,
    pub error: Option<ApiError>,
}

impl Listing {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

struct CacheEntry {
    entries: Vec<FileEntry>,
    fetched_at: Instant,
    /// Focus epoch at fetch time; a lower value than the cache's current
    /// epoch means the window regained focus since, so revalidate.
    focus_epoch: u64,
    stale: bool,
    error: Option<ApiError>,
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,
    inflight: HashMap<String, (u64, SharedFetch)>,
    focus_epoch: u64,
    next_generation: u64,
}

pub struct ListingCache {
    source: Arc<dyn ListingSource>,
    stale_after: Duration,
    state: Mutex<CacheState>,
}

impl ListingCache {
    pub fn new(source: Arc<dyn ListingSource>) -> ListingCache {
        Self::with_stale_after(source, DEFAULT_STALE_AFTER)
    }

    pub fn with_stale_after(source: Arc<dyn ListingSource>, stale_after: Duration) -> ListingCache {
        ListingCache {
            source,
            stale_after,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                inflight: HashMap::new(),
                focus_epoch: 0,
                next_generation: 0,
            }),
        }
    }

    fn needs_revalidation(&self, entry: &CacheEntry, focus_epoch: u64) -> bool {
        entry.stale
            || entry.error.is_some()
            || entry.focus_epoch < focus_epoch
            || entry.fetched_at.elapsed() > self.stale_after
    }

    /// Return the listing for `path`, fetching if needed. Concurrent calls
    /// for the same path attach to the pending fetch instead of issuing a
    /// duplicate request.
    pub async fn get_listing(&self, path: &str) -> Listing {
        let (generation, fetch) = {
            let mut state = self.state.lock().await;
            if let Some(entry) = state.entries.get(path) {
                if !self.needs_revalidation(entry, state.focus_epoch) {
                    return Listing {
                        entries: entry.entries.clone(),
                        is_loading: false,
                        error: None,
                    };
                }
            }
            Self::join_or_start_fetch(&mut state, &self.source, path)
        };
        let result = fetch.await;
        self.commit(path, generation, result).await
    }

    /// Unconditionally re-fetch `path`, joining an already in-flight
    /// request if there is one. Used right after mutations.
    pub async fn refetch(&self, path: &str) -> Listing {
        let (generation, fetch) = {
            let mut state = self.state.lock().await;
            Self::join_or_start_fetch(&mut state, &self.source, path)
        };
        let result = fetch.await;
        self.commit(path, generation, result).await
    }

    /// Mark `path` stale so the next `get_listing` hits the network.
    pub async fn invalidate(&self, path: &str) {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.entries.get_mut(path) {
            entry.stale = true;
        }
    }

    /// Note that the window regained focus: every entry fetched before this
    /// point revalidates on its next read.
    pub async fn focus_regained(&self) {
        let mut state = self.state.lock().await;
        state.focus_epoch += 1;
    }

    /// Current state of a slot without triggering a fetch.
    pub async fn peek(&self, path: &str) -> Option<Listing> {
        let state = self.state.lock().await;
        let is_loading = state.inflight.contains_key(path);
        match state.entries.get(path) {
            Some(entry) => Some(Listing {
                entries: entry.entries.clone(),
                is_loading,
                error: entry.error.clone(),
            }),
            None if is_loading => Some(Listing {
                entries: Vec::new(),
                is_loading: true,
                error: None,
            }),
            None => None,
        }
    }

    fn join_or_start_fetch(
        state: &mut CacheState,
        source: &Arc<dyn ListingSource>,
        path: &str,
    ) -> (u64, SharedFetch) {
        if let Some((generation, fetch)) = state.inflight.get(path) {
            return (*generation, fetch.clone());
        }
        let generation = state.next_generation;
        state.next_generation += 1;
        let source = source.clone();
        let key = path.to_string();
        let fetch: SharedFetch = async move { source.fetch_listing(&key).await }
            .boxed()
            .shared();
        state
            .inflight
            .insert(path.to_string(), (generation, fetch.clone()));
        (generation, fetch)
    }

    /// Store a completed fetch. Only the generation that currently owns the
    /// in-flight slot writes the entry; waiters that commit late (after a
    /// newer fetch replaced the slot) must not overwrite newer data.
    async fn commit(&self, path: &str, generation: u64, result: FetchResult) -> Listing {
        let mut state = self.state.lock().await;
        let owns_slot = state
            .inflight
            .get(path)
            .map(|(g, _)| *g == generation)
            .unwrap_or(false);
        if owns_slot {
            state.inflight.remove(path);
            let focus_epoch = state.focus_epoch;
            match &result {
                Ok(entries) => {
                    state.entries.insert(
                        path.to_string(),
                        CacheEntry {
                            entries: entries.clone(),
                            fetched_at: Instant::now(),
                            focus_epoch,
                            stale: false,
                            error: None,
                        },
                    );
                }
                Err(error) => {
                    // Keep the previous entries visible; record the error
                    // and leave the slot stale so the next read retries.
                    let previous = state
                        .entries
                        .remove(path)
                        .map(|e| e.entries)
                        .unwrap_or_default();
                    state.entries.insert(
                        path.to_string(),
                        CacheEntry {
                            entries: previous,
                            fetched_at: Instant::now(),
                            focus_epoch,
                            stale: true,
                            error: Some(error.clone()),
                        },
                    );
                }
            }
        }
        match result {
            Ok(entries) => Listing {
                entries,
                is_loading: false,
                error: None,
            },
            Err(error) => Listing {
                entries: state
                    .entries
                    .get(path)
                    .map(|e| e.entries.clone())
                    .unwrap_or_default(),
                is_loading: false,
                error: Some(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FileCategory, FileKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entry(name: &str, path: &str) -> FileEntry {
        FileEntry {
            id: format!("id-{}", name),
            name: name.to_string(),
            kind: FileKind::File,
            category: FileCategory::Document,
            size_mb: 1.0,
            thumbnail: None,
            parent_path: path.to_string(),
        }
    }

    struct CountingSource {
        fetches: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ListingSource for CountingSource {
        async fn fetch_listing(&self, path: &str) -> Result<Vec<FileEntry>, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent callers overlap with this fetch.
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(ApiError::Network("unreachable".to_string()));
            }
            Ok(vec![entry("a", path)])
        }
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_fetch() {
        let source = CountingSource::new();
        let cache = ListingCache::new(source.clone());

        let (first, second) = tokio::join!(cache.get_listing("/x"), cache.get_listing("/x"));
        assert_eq!(source.count(), 1);
        assert_eq!(first.entries.len(), 1);
        assert_eq!(second.entries.len(), 1);
        assert!(!first.is_error());
    }

    #[tokio::test]
    async fn test_distinct_paths_fetch_independently() {
        let source = CountingSource::new();
        let cache = ListingCache::new(source.clone());

        let (a, b) = tokio::join!(cache.get_listing("/a"), cache.get_listing("/b"));
        assert_eq!(source.count(), 2);
        assert_eq!(a.entries[0].parent_path, "/a");
        assert_eq!(b.entries[0].parent_path, "/b");
    }

    #[tokio::test]
    async fn test_fresh_entry_served_from_cache() {
        let source = CountingSource::new();
        let cache = ListingCache::new(source.clone());

        cache.get_listing("/x").await;
        cache.get_listing("/x").await;
        assert_eq!(source.count(), 1);
    }

    #[tokio::test]
    async fn test_zero_stale_time_always_revalidates() {
        let source = CountingSource::new();
        let cache = ListingCache::with_stale_after(source.clone(), Duration::ZERO);

        cache.get_listing("/x").await;
        cache.get_listing("/x").await;
        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_next_fetch() {
        let source = CountingSource::new();
        let cache = ListingCache::new(source.clone());

        cache.get_listing("/x").await;
        cache.invalidate("/x").await;
        cache.get_listing("/x").await;
        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn test_focus_regained_revalidates() {
        let source = CountingSource::new();
        let cache = ListingCache::new(source.clone());

        cache.get_listing("/x").await;
        cache.focus_regained().await;
        cache.get_listing("/x").await;
        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn test_refetch_bypasses_freshness() {
        let source = CountingSource::new();
        let cache = ListingCache::new(source.clone());

        cache.get_listing("/x").await;
        cache.refetch("/x").await;
        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn test_error_is_reported_and_retried() {
        let source = CountingSource::failing();
        let cache = ListingCache::new(source.clone());

        let listing = cache.get_listing("/x").await;
        assert!(listing.is_error());
        assert!(listing.entries.is_empty());

        // The error slot is left stale; the next read hits the network.
        cache.get_listing("/x").await;
        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn test_peek_never_fetches() {
        let source = CountingSource::new();
        let cache = ListingCache::new(source.clone());

        assert!(cache.peek("/x").await.is_none());
        cache.get_listing("/x").await;
        let peeked = cache.peek("/x").await.unwrap();
        assert!(!peeked.is_loading);
        assert_eq!(peeked.entries.len(), 1);
        assert_eq!(source.count(), 1);
    }
}
