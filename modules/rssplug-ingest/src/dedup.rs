use std::collections::HashSet;

use rssplug_common::FeedItem;
use tracing::{debug, warn};

/// Feed items not yet published, oldest first.
///
/// `feed` is newest first. It is walked in reverse so that new items are
/// published in the order they appeared upstream. The link is the only
/// dedup key: an item whose link is in `history`, or repeats an earlier
/// item's link in the same feed, is skipped.
pub fn new_items(feed: &[FeedItem], history: &HashSet<String>) -> Vec<FeedItem> {
    let mut seen = HashSet::new();

    feed.iter()
        .rev()
        .filter(|&item| {
            if item.link.trim().is_empty() {
                warn!(title = item.title.as_str(), "dedup: skipping item without a link");
                return false;
            }
            if history.contains(&item.link) {
                debug!(link = item.link.as_str(), "dedup: skipping, already posted");
                return false;
            }
            seen.insert(item.link.as_str())
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(link: &str) -> FeedItem {
        FeedItem {
            title: format!("title of {link}"),
            link: link.to_string(),
            content: String::new(),
            summary: String::new(),
            image: None,
        }
    }

    fn links(items: &[FeedItem]) -> Vec<&str> {
        items.iter().map(|i| i.link.as_str()).collect()
    }

    #[test]
    fn new_items_come_out_oldest_first() {
        let feed = vec![item("C"), item("B"), item("A")];

        let fresh = new_items(&feed, &HashSet::new());

        assert_eq!(links(&fresh), vec!["A", "B", "C"]);
    }

    #[test]
    fn published_links_are_skipped() {
        let feed = vec![item("C"), item("B"), item("A")];
        let history: HashSet<String> = ["B".to_string()].into();

        let fresh = new_items(&feed, &history);

        assert_eq!(links(&fresh), vec!["A", "C"]);
    }

    #[test]
    fn fully_published_feed_yields_nothing() {
        let feed = vec![item("B"), item("A")];
        let history: HashSet<String> = ["A".to_string(), "B".to_string()].into();

        assert!(new_items(&feed, &history).is_empty());
    }

    #[test]
    fn duplicate_links_within_a_feed_count_once() {
        let feed = vec![item("B"), item("A"), item("B")];

        let fresh = new_items(&feed, &HashSet::new());

        assert_eq!(links(&fresh), vec!["B", "A"]);
    }

    #[test]
    fn items_without_links_are_skipped() {
        let feed = vec![item(""), item("A")];

        assert_eq!(links(&new_items(&feed, &HashSet::new())), vec!["A"]);
    }

    proptest! {
        #[test]
        fn history_links_never_selected(
            feed_links in prop::collection::vec("[a-e]", 0..20),
            history_links in prop::collection::hash_set("[a-e]", 0..5),
        ) {
            let feed: Vec<FeedItem> = feed_links.iter().map(|l| item(l)).collect();

            let fresh = new_items(&feed, &history_links);

            for selected in &fresh {
                prop_assert!(!history_links.contains(&selected.link));
            }
            let unique: HashSet<_> = fresh.iter().map(|i| &i.link).collect();
            prop_assert_eq!(unique.len(), fresh.len());
        }
    }
}
