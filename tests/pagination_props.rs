//! Property tests for page merging.
//!
//! Whatever order pages arrive in, and however often a page is re-delivered,
//! the merged list is the held pages concatenated by ascending page number,
//! each page represented by its latest delivery.

use std::collections::BTreeMap;

use proptest::prelude::*;
use showreel::domain::{Item, Page};
use showreel::list::PaginationState;

/// A delivery of page `number`; `version` distinguishes re-deliveries.
fn delivery(number: u32, version: u32, len: usize) -> Page {
    Page::new(
        number,
        20,
        (0..len)
            .map(|i| {
                Item::new(
                    i64::from(number) * 10_000 + i64::from(version) * 100 + i as i64,
                    format!("p{number}v{version}i{i}"),
                )
            })
            .collect(),
    )
}

fn deliveries() -> impl Strategy<Value = Vec<(u32, usize)>> {
    prop::collection::vec((1u32..=8, 0usize..5), 0..40)
}

proptest! {
    #[test]
    fn merged_items_follow_page_order(arrivals in deliveries()) {
        let mut state = PaginationState::new();
        let mut latest: BTreeMap<u32, Page> = BTreeMap::new();

        for (version, (number, len)) in arrivals.into_iter().enumerate() {
            let page = delivery(number, version as u32, len);
            latest.insert(number, page.clone());
            state.merge(page);
        }

        let expected: Vec<Item> = latest.values().flat_map(|p| p.items.clone()).collect();
        prop_assert_eq!(state.items(), expected);
        prop_assert_eq!(state.held_pages(), latest.keys().copied().collect::<Vec<_>>());
    }

    #[test]
    fn redelivery_keeps_single_copy(number in 1u32..=8, first in 0usize..5, second in 0usize..5) {
        let mut state = PaginationState::new();
        state.merge(delivery(number, 0, first));
        state.apply(delivery(number, 1, second));

        prop_assert_eq!(state.held_pages(), vec![number]);
        prop_assert_eq!(state.item_count(), second);
        prop_assert_eq!(state.page(number).cloned(), Some(delivery(number, 1, second)));
    }

    #[test]
    fn apply_takes_counters_from_page(number in 1u32..=20, total in 1u32..=40) {
        prop_assume!(number <= total);
        let mut state = PaginationState::new();
        state.merge(Page::new(number, total + 5, vec![]));
        state.apply(Page::new(number, total, vec![]));

        prop_assert_eq!(state.current_page(), number);
        prop_assert_eq!(state.total_pages(), total);
        prop_assert_eq!(state.has_more_pages(), number < total);
    }
}
