//! Use cases binding a category (or free-text search) to the repository.
//!
//! Each use case forwards to [`Repository::fetch_page`] and, when the
//! authoritative result is a success, records the effective query as
//! "recent". Saving is fire-and-forget: failures are logged and never reach
//! the caller, and the save is tracked by the repository's
//! [`BackgroundTasks`] so shutdown can wait for it. Cancelling the returned handle suppresses both the completion
//! and the save, since the save runs inside the gated completion.

use std::sync::Arc;

use crate::domain::{Category, Query};
use crate::fetch::FetchHandle;
use crate::repository::{CachedCallback, CompletionCallback, Repository};
use crate::storage::RecentQueries;
use crate::util::BackgroundTasks;

/// Parameters for one page request issued by the list controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub query: Query,
    pub page: u32,
}

impl PageRequest {
    pub fn new(query: Query, page: u32) -> Self {
        Self { query, page }
    }
}

/// Fetches one page for a fixed mode of the list.
pub trait FetchPageUseCase: Send + Sync {
    fn execute(
        &self,
        request: PageRequest,
        cached: CachedCallback,
        completion: CompletionCallback,
    ) -> FetchHandle;
}

/// Wrap `completion` so a successful result first records `query`.
fn record_on_success(
    background: &BackgroundTasks,
    recent: Arc<dyn RecentQueries>,
    query: Query,
    completion: CompletionCallback,
) -> CompletionCallback {
    let background = background.clone();
    Box::new(move |result| {
        if result.is_ok() {
            background.spawn(async move {
                if let Err(e) = recent.save_recent_query(&query).await {
                    tracing::warn!(query = %query, error = %e, "Failed to save recent query");
                }
            });
        }
        completion(result);
    })
}

// ============================================================================
// Fixed categories
// ============================================================================

/// Use case for one of the fixed categories (popular, top rated, upcoming).
///
/// The repository is always called with the empty query; the category alone
/// addresses the content.
pub struct CategoryUseCase {
    category: Category,
    repository: Repository,
    recent: Arc<dyn RecentQueries>,
}

impl CategoryUseCase {
    pub fn popular(repository: Repository, recent: Arc<dyn RecentQueries>) -> Self {
        Self {
            category: Category::Popular,
            repository,
            recent,
        }
    }

    pub fn top_rated(repository: Repository, recent: Arc<dyn RecentQueries>) -> Self {
        Self {
            category: Category::TopRated,
            repository,
            recent,
        }
    }

    pub fn upcoming(repository: Repository, recent: Arc<dyn RecentQueries>) -> Self {
        Self {
            category: Category::Upcoming,
            repository,
            recent,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }
}

impl FetchPageUseCase for CategoryUseCase {
    fn execute(
        &self,
        request: PageRequest,
        cached: CachedCallback,
        completion: CompletionCallback,
    ) -> FetchHandle {
        let query = Query::empty();
        let completion = record_on_success(
            self.repository.background(),
            Arc::clone(&self.recent),
            query.clone(),
            completion,
        );
        self.repository
            .fetch_page(self.category, &query, request.page, cached, completion)
    }
}

// ============================================================================
// Search
// ============================================================================

/// Use case for free-text search.
pub struct SearchUseCase {
    repository: Repository,
    recent: Arc<dyn RecentQueries>,
}

impl SearchUseCase {
    pub fn new(repository: Repository, recent: Arc<dyn RecentQueries>) -> Self {
        Self { repository, recent }
    }
}

impl FetchPageUseCase for SearchUseCase {
    fn execute(
        &self,
        request: PageRequest,
        cached: CachedCallback,
        completion: CompletionCallback,
    ) -> FetchHandle {
        let completion = record_on_success(
            self.repository.background(),
            Arc::clone(&self.recent),
            request.query.clone(),
            completion,
        );
        self.repository.fetch_page(
            Category::Search,
            &request.query,
            request.page,
            cached,
            completion,
        )
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// The four use cases the list controller switches between.
#[derive(Clone)]
pub struct UseCases {
    pub search: Arc<dyn FetchPageUseCase>,
    pub popular: Arc<dyn FetchPageUseCase>,
    pub top_rated: Arc<dyn FetchPageUseCase>,
    pub upcoming: Arc<dyn FetchPageUseCase>,
}

impl UseCases {
    /// Build all four use cases over one repository and recent-query store.
    pub fn new(repository: Repository, recent: Arc<dyn RecentQueries>) -> Self {
        Self {
            search: Arc::new(SearchUseCase::new(repository.clone(), Arc::clone(&recent))),
            popular: Arc::new(CategoryUseCase::popular(
                repository.clone(),
                Arc::clone(&recent),
            )),
            top_rated: Arc::new(CategoryUseCase::top_rated(
                repository.clone(),
                Arc::clone(&recent),
            )),
            upcoming: Arc::new(CategoryUseCase::upcoming(repository, recent)),
        }
    }

    pub fn for_category(&self, category: Category) -> &Arc<dyn FetchPageUseCase> {
        match category {
            Category::Search => &self.search,
            Category::Popular => &self.popular,
            Category::TopRated => &self.top_rated,
            Category::Upcoming => &self.upcoming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Item, Page, RequestKey};
    use crate::fetch::{FetchError, RemoteFetcher};
    use crate::storage::NoCache;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::{mpsc, Notify};

    /// Records every key it is asked for and answers from a fixed result.
    struct RecordingFetcher {
        result: Result<Page, FetchError>,
        release: Option<Arc<Notify>>,
        keys: Mutex<Vec<RequestKey>>,
    }

    #[async_trait]
    impl RemoteFetcher for RecordingFetcher {
        async fn fetch(&self, key: &RequestKey) -> Result<Page, FetchError> {
            self.keys.lock().unwrap().push(key.clone());
            if let Some(release) = &self.release {
                release.notified().await;
            }
            self.result.clone()
        }
    }

    #[derive(Default)]
    struct RecordingRecent {
        saved: Mutex<Vec<Query>>,
        fail: bool,
    }

    #[async_trait]
    impl RecentQueries for RecordingRecent {
        async fn save_recent_query(&self, query: &Query) -> anyhow::Result<()> {
            self.saved.lock().unwrap().push(query.clone());
            if self.fail {
                anyhow::bail!("disk full");
            }
            Ok(())
        }
    }

    fn fetcher(
        result: Result<Page, FetchError>,
        release: Option<Arc<Notify>>,
    ) -> Arc<RecordingFetcher> {
        Arc::new(RecordingFetcher {
            result,
            release,
            keys: Mutex::new(Vec::new()),
        })
    }

    fn ok_page() -> Result<Page, FetchError> {
        Ok(Page::new(1, 2, vec![Item::new(1, "Dune")]))
    }

    fn run(
        use_case: &dyn FetchPageUseCase,
        query: &str,
    ) -> (FetchHandle, mpsc::UnboundedReceiver<Result<Page, FetchError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = use_case.execute(
            PageRequest::new(Query::new(query), 1),
            Box::new(|_| {}),
            Box::new(move |r| {
                let _ = tx.send(r);
            }),
        );
        (handle, rx)
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_search_records_query_on_success() {
        let remote = fetcher(ok_page(), None);
        let recent = Arc::new(RecordingRecent::default());
        let use_case = SearchUseCase::new(
            Repository::new(remote.clone(), Arc::new(NoCache)),
            recent.clone(),
        );

        let (_handle, mut rx) = run(&use_case, "Dune");
        assert!(rx.recv().await.unwrap().is_ok());
        settle().await;

        assert_eq!(*recent.saved.lock().unwrap(), vec![Query::new("dune")]);
        assert_eq!(
            *remote.keys.lock().unwrap(),
            vec![RequestKey::new(Category::Search, &Query::new("Dune"), 1)]
        );
    }

    #[tokio::test]
    async fn test_failure_skips_recent_and_passes_through() {
        let remote = fetcher(Err(FetchError::Connectivity("offline".into())), None);
        let recent = Arc::new(RecordingRecent::default());
        let use_case = SearchUseCase::new(
            Repository::new(remote, Arc::new(NoCache)),
            recent.clone(),
        );

        let (_handle, mut rx) = run(&use_case, "Dune");
        assert_eq!(
            rx.recv().await.unwrap(),
            Err(FetchError::Connectivity("offline".into()))
        );
        settle().await;
        assert!(recent.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_failure_is_not_surfaced() {
        let recent = Arc::new(RecordingRecent {
            fail: true,
            ..RecordingRecent::default()
        });
        let use_case = SearchUseCase::new(
            Repository::new(fetcher(ok_page(), None), Arc::new(NoCache)),
            recent.clone(),
        );

        let (_handle, mut rx) = run(&use_case, "Dune");
        assert!(rx.recv().await.unwrap().is_ok());
        settle().await;
        assert_eq!(recent.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_category_uses_empty_query() {
        let remote = fetcher(ok_page(), None);
        let recent = Arc::new(RecordingRecent::default());
        let use_case = CategoryUseCase::top_rated(
            Repository::new(remote.clone(), Arc::new(NoCache)),
            recent.clone(),
        );
        assert_eq!(use_case.category(), Category::TopRated);

        let (_handle, mut rx) = run(&use_case, "ignored text");
        assert!(rx.recv().await.unwrap().is_ok());
        settle().await;

        let keys = remote.keys.lock().unwrap();
        assert_eq!(keys[0].category, Category::TopRated);
        assert!(keys[0].query.is_empty());
        assert_eq!(*recent.saved.lock().unwrap(), vec![Query::empty()]);
    }

    #[tokio::test]
    async fn test_cancel_suppresses_completion_and_recent() {
        let release = Arc::new(Notify::new());
        let recent = Arc::new(RecordingRecent::default());
        let use_case = SearchUseCase::new(
            Repository::new(fetcher(ok_page(), Some(release.clone())), Arc::new(NoCache)),
            recent.clone(),
        );

        let (handle, mut rx) = run(&use_case, "Dune");
        settle().await;
        handle.cancel();
        release.notify_one();
        settle().await;

        assert!(rx.try_recv().is_err());
        assert!(recent.saved.lock().unwrap().is_empty());
    }

    /// Store whose save takes a while to land.
    #[derive(Default)]
    struct SlowRecent {
        saved: Mutex<Vec<Query>>,
    }

    #[async_trait]
    impl RecentQueries for SlowRecent {
        async fn save_recent_query(&self, query: &Query) -> anyhow::Result<()> {
            tokio::time::sleep(std::time::Duration::from_millis(40)).await;
            self.saved.lock().unwrap().push(query.clone());
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_recent_save_is_tracked_by_repository() {
        let repository = Repository::new(fetcher(ok_page(), None), Arc::new(NoCache));
        let recent = Arc::new(SlowRecent::default());
        let use_case = SearchUseCase::new(repository.clone(), recent.clone());

        let (_handle, mut rx) = run(&use_case, "Dune");
        assert!(rx.recv().await.unwrap().is_ok());
        assert!(recent.saved.lock().unwrap().is_empty());

        repository.background().drain().await;
        assert_eq!(*recent.saved.lock().unwrap(), vec![Query::new("dune")]);
    }

    #[test]
    fn test_bundle_routes_by_category() {
        let repo = Repository::new(fetcher(ok_page(), None), Arc::new(NoCache));
        let use_cases = UseCases::new(repo, Arc::new(RecordingRecent::default()));
        assert!(Arc::ptr_eq(
            use_cases.for_category(Category::Popular),
            &use_cases.popular
        ));
        assert!(Arc::ptr_eq(
            use_cases.for_category(Category::Search),
            &use_cases.search
        ));
        assert!(!Arc::ptr_eq(
            use_cases.for_category(Category::Upcoming),
            &use_cases.top_rated
        ));
    }
}
