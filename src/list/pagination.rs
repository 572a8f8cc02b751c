use std::collections::BTreeMap;

use crate::domain::{Item, Page};

/// In-memory paging state for one list mode.
///
/// Pages are keyed by page number, so a later delivery of an already-held
/// page replaces it in place and the merged item list is always in
/// ascending page order regardless of arrival order.
#[derive(Debug, Clone)]
pub struct PaginationState {
    pages: BTreeMap<u32, Page>,
    current_page: u32,
    total_pages: u32,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            pages: BTreeMap::new(),
            current_page: 0,
            total_pages: 1,
        }
    }
}

impl PaginationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every held page and return to "nothing loaded".
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Insert `page`, replacing any held page with the same number.
    ///
    /// Leaves the current/total counters alone; cached pages go through
    /// here so they never override authoritative paging.
    pub fn merge(&mut self, page: Page) -> Option<Page> {
        self.pages.insert(page.page, page)
    }

    /// Merge an authoritative page and take its paging attributes.
    pub fn apply(&mut self, page: Page) {
        self.current_page = page.page;
        self.total_pages = page.total_pages;
        self.merge(page);
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Page number the next request should ask for.
    pub fn next_page(&self) -> u32 {
        if self.has_more_pages() {
            self.current_page + 1
        } else {
            self.current_page
        }
    }

    /// Held page numbers in ascending order.
    pub fn held_pages(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    pub fn page(&self, number: u32) -> Option<&Page> {
        self.pages.get(&number)
    }

    /// Flattened items of all held pages, in page order.
    pub fn items(&self) -> Vec<Item> {
        self.pages
            .values()
            .flat_map(|p| p.items.iter().cloned())
            .collect()
    }

    pub fn item_at(&self, index: usize) -> Option<&Item> {
        self.pages.values().flat_map(|p| &p.items).nth(index)
    }

    pub fn item_count(&self) -> usize {
        self.pages.values().map(Page::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u32, total: u32, ids: &[i64]) -> Page {
        Page::new(
            n,
            total,
            ids.iter().map(|&id| Item::new(id, format!("#{id}"))).collect(),
        )
    }

    fn ids(state: &PaginationState) -> Vec<i64> {
        state.items().iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_default_state() {
        let state = PaginationState::new();
        assert_eq!(state.current_page(), 0);
        assert_eq!(state.total_pages(), 1);
        assert!(state.has_more_pages());
        assert_eq!(state.next_page(), 1);
        assert!(state.items().is_empty());
    }

    #[test]
    fn test_out_of_order_pages_merge_in_page_order() {
        let mut state = PaginationState::new();
        state.merge(page(2, 3, &[20, 21]));
        state.apply(page(1, 3, &[10, 11]));
        assert_eq!(ids(&state), vec![10, 11, 20, 21]);
        assert_eq!(state.held_pages(), vec![1, 2]);
    }

    #[test]
    fn test_same_page_replaces_in_place() {
        let mut state = PaginationState::new();
        state.merge(page(1, 5, &[1, 2, 3]));
        let replaced = state.merge(page(1, 3, &[7, 8]));
        assert_eq!(replaced.map(|p| p.len()), Some(3));
        assert_eq!(ids(&state), vec![7, 8]);
        assert_eq!(state.item_count(), 2);
    }

    #[test]
    fn test_merge_keeps_counters_apply_updates_them() {
        let mut state = PaginationState::new();
        state.merge(page(1, 5, &[1]));
        assert_eq!(state.current_page(), 0);
        assert_eq!(state.total_pages(), 1);

        state.apply(page(1, 3, &[1]));
        assert_eq!(state.current_page(), 1);
        assert_eq!(state.total_pages(), 3);
        assert_eq!(state.next_page(), 2);
    }

    #[test]
    fn test_last_page_stops_paging() {
        let mut state = PaginationState::new();
        state.apply(page(2, 2, &[1]));
        assert!(!state.has_more_pages());
        assert_eq!(state.next_page(), 2);
    }

    #[test]
    fn test_item_at_crosses_pages() {
        let mut state = PaginationState::new();
        state.apply(page(1, 2, &[1, 2]));
        state.apply(page(2, 2, &[3]));
        assert_eq!(state.item_at(2).map(|i| i.id), Some(3));
        assert!(state.item_at(3).is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = PaginationState::new();
        state.apply(page(1, 4, &[1, 2]));
        state.reset();
        assert_eq!(state.current_page(), 0);
        assert_eq!(state.total_pages(), 1);
        assert!(state.held_pages().is_empty());
    }
}
