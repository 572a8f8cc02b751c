//! List controller: the state machine behind a paginated movie list.
//!
//! All state lives on the task that owns the controller. Fetch callbacks
//! never touch it directly; they post [`ListEvent`]s tagged with the
//! generation of the operation that produced them, and the owner applies
//! them through [`ListController::process_next_event`]. Events from a
//! superseded or cancelled operation are discarded on arrival.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::observable::Observable;
use super::pagination::PaginationState;
use super::slot::LoadSlot;
use crate::domain::{Category, Item, Page, Query};
use crate::fetch::FetchError;
use crate::use_cases::{FetchPageUseCase, PageRequest, UseCases};

pub const SCREEN_TITLE: &str = "Movies";
pub const EMPTY_DATA_TITLE: &str = "Search results";
pub const ERROR_TITLE: &str = "Error";
pub const SEARCH_BAR_PLACEHOLDER: &str = "Search Movies";

pub const NO_INTERNET_MESSAGE: &str = "No internet connection";
pub const FAILED_LOADING_MESSAGE: &str = "Failed loading movies";

/// Kind of load in progress. `None` in an `Option<Loading>` means idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loading {
    /// Full reload after a mode change.
    FullScreen,
    /// Incremental load of the next page.
    NextPage,
}

/// Result delivery from a fetch, posted back to the controller's task.
#[derive(Debug)]
pub enum ListEvent {
    CachedPage {
        generation: u64,
        page: Page,
    },
    Completed {
        generation: u64,
        result: Result<Page, FetchError>,
    },
}

impl ListEvent {
    pub fn generation(&self) -> u64 {
        match self {
            ListEvent::CachedPage { generation, .. } | ListEvent::Completed { generation, .. } => {
                *generation
            }
        }
    }
}

/// User-facing message for a failed load.
pub fn error_message(error: &FetchError) -> &'static str {
    if error.is_connectivity() {
        NO_INTERNET_MESSAGE
    } else {
        FAILED_LOADING_MESSAGE
    }
}

pub struct ListController {
    use_cases: UseCases,
    mode: Category,
    /// Query the active mode fetches with (empty for fixed categories).
    active_query: Query,
    pagination: PaginationState,
    slot: LoadSlot,

    items: Observable<Vec<Item>>,
    loading: Observable<Option<Loading>>,
    query: Observable<String>,
    error: Observable<Option<String>>,

    event_tx: mpsc::UnboundedSender<ListEvent>,
    event_rx: mpsc::UnboundedReceiver<ListEvent>,
}

impl ListController {
    pub fn new(use_cases: UseCases) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            use_cases,
            mode: Category::Upcoming,
            active_query: Query::empty(),
            pagination: PaginationState::new(),
            slot: LoadSlot::new(),
            items: Observable::new(Vec::new()),
            loading: Observable::new(None),
            query: Observable::new(String::new()),
            error: Observable::new(None),
            event_tx,
            event_rx,
        }
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    /// Initial load: upcoming movies, page 1.
    pub fn view_did_load(&mut self) {
        self.change_mode(Category::Upcoming, Query::empty());
    }

    /// Commit a search. Blank text is ignored.
    pub fn did_search(&mut self, text: &str) {
        let query = Query::new(text.trim());
        if query.is_empty() {
            tracing::trace!("Ignoring blank search");
            return;
        }
        self.change_mode(Category::Search, query);
    }

    /// Re-run a recent query picked from the suggestions list.
    pub fn did_select_suggestion(&mut self, query: Query) {
        self.did_search(query.as_str());
    }

    /// Switch tabs. The search tab re-issues the last committed query text.
    pub fn did_select_tab(&mut self, category: Category) {
        let query = if category.is_search() {
            Query::new(self.query.get())
        } else {
            Query::empty()
        };
        self.change_mode(category, query);
    }

    /// Reload the current mode from page 1.
    pub fn reset(&mut self) {
        self.change_mode(self.mode, self.active_query.clone());
    }

    /// Request the page after the last one loaded.
    ///
    /// No-op while a load is in progress or once the last page is loaded.
    pub fn did_load_next_page(&mut self) {
        if !self.pagination.has_more_pages() || self.loading.with(Option::is_some) {
            tracing::trace!(
                current = self.pagination.current_page(),
                total = self.pagination.total_pages(),
                "Next page not available"
            );
            return;
        }
        let page = self.pagination.next_page();
        self.start_load(Loading::NextPage, page);
    }

    /// Abort the outstanding load, if any, and go idle.
    pub fn did_cancel_search(&mut self) {
        if self.slot.in_flight() {
            tracing::debug!(generation = self.slot.generation(), "Load cancelled");
        }
        self.slot.invalidate();
        self.loading.set(None);
    }

    /// Item at `index` in the merged list.
    pub fn did_select_item(&self, index: usize) -> Option<Item> {
        self.pagination.item_at(index).cloned()
    }

    // ========================================================================
    // Event pump
    // ========================================================================

    /// Wait for the next fetch event and apply it.
    ///
    /// Returns `false` only if the event channel is closed, which cannot
    /// happen while the controller is alive.
    pub async fn process_next_event(&mut self) -> bool {
        match self.event_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Apply every event already queued without waiting. Returns the count.
    pub fn process_pending_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Apply events until no load is in progress.
    pub async fn run_until_idle(&mut self) {
        while self.slot.in_flight() {
            if !self.process_next_event().await {
                break;
            }
        }
        self.process_pending_events();
    }

    fn handle_event(&mut self, event: ListEvent) {
        let generation = event.generation();
        if !self.slot.is_live(generation) {
            tracing::debug!(
                expected = self.slot.generation(),
                got = generation,
                "Ignoring stale list event"
            );
            return;
        }

        match event {
            ListEvent::CachedPage { page, .. } => {
                tracing::debug!(page = page.page, items = page.len(), "Merging cached page");
                self.pagination.merge(page);
                self.publish_items();
            }
            ListEvent::Completed { result, .. } => {
                self.slot.finish(generation);
                match result {
                    Ok(page) => {
                        tracing::debug!(
                            page = page.page,
                            total_pages = page.total_pages,
                            items = page.len(),
                            "Page loaded"
                        );
                        self.pagination.apply(page);
                        self.publish_items();
                    }
                    Err(e) => {
                        tracing::warn!(
                            category = %self.mode,
                            error = %e,
                            "Page load failed"
                        );
                        self.error.set(Some(error_message(&e).to_string()));
                    }
                }
                self.loading.set(None);
            }
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    fn change_mode(&mut self, category: Category, query: Query) {
        self.slot.invalidate();
        self.pagination.reset();
        self.publish_items();
        self.mode = category;
        self.active_query = query;

        if category.is_search() {
            self.query.set(self.active_query.as_str().to_string());
            if self.active_query.is_empty() {
                // Nothing to search for yet
                self.loading.set(None);
                return;
            }
        }

        tracing::debug!(category = %category, query = %self.active_query, "Mode changed");
        self.start_load(Loading::FullScreen, 1);
    }

    fn start_load(&mut self, kind: Loading, page: u32) {
        let generation = self.slot.begin();
        self.loading.set(Some(kind));
        self.error.set(None);

        let use_case: Arc<dyn FetchPageUseCase> =
            Arc::clone(self.use_cases.for_category(self.mode));
        let request = PageRequest::new(self.active_query.clone(), page);

        tracing::debug!(
            generation,
            category = %self.mode,
            page,
            loading = ?kind,
            "Starting load"
        );

        let cached_tx = self.event_tx.clone();
        let done_tx = self.event_tx.clone();
        let handle = use_case.execute(
            request,
            Box::new(move |page| {
                let _ = cached_tx.send(ListEvent::CachedPage { generation, page });
            }),
            Box::new(move |result| {
                let _ = done_tx.send(ListEvent::Completed { generation, result });
            }),
        );
        self.slot.attach(generation, handle);
    }

    fn publish_items(&self) {
        self.items.set(self.pagination.items());
    }

    // ========================================================================
    // Outputs
    // ========================================================================

    pub fn items(&self) -> watch::Receiver<Vec<Item>> {
        self.items.subscribe()
    }

    pub fn loading(&self) -> watch::Receiver<Option<Loading>> {
        self.loading.subscribe()
    }

    pub fn query(&self) -> watch::Receiver<String> {
        self.query.subscribe()
    }

    pub fn error(&self) -> watch::Receiver<Option<String>> {
        self.error.subscribe()
    }

    pub fn current_items(&self) -> Vec<Item> {
        self.items.get()
    }

    pub fn current_loading(&self) -> Option<Loading> {
        self.loading.get()
    }

    pub fn current_error(&self) -> Option<String> {
        self.error.get()
    }

    pub fn is_empty(&self) -> bool {
        self.items.with(Vec::is_empty)
    }

    pub fn mode(&self) -> Category {
        self.mode
    }

    pub fn has_more_pages(&self) -> bool {
        self.pagination.has_more_pages()
    }

    pub fn next_page(&self) -> u32 {
        self.pagination.next_page()
    }

    pub fn current_page(&self) -> u32 {
        self.pagination.current_page()
    }

    pub fn total_pages(&self) -> u32 {
        self.pagination.total_pages()
    }

    pub fn held_pages(&self) -> Vec<u32> {
        self.pagination.held_pages()
    }

    pub fn screen_title(&self) -> &'static str {
        SCREEN_TITLE
    }

    pub fn empty_data_title(&self) -> &'static str {
        EMPTY_DATA_TITLE
    }

    pub fn error_title(&self) -> &'static str {
        ERROR_TITLE
    }

    pub fn search_bar_placeholder(&self) -> &'static str {
        SEARCH_BAR_PLACEHOLDER
    }
}
