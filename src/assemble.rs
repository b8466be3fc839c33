// src/assemble.rs
use crate::snapshot::PublishedItem;

/// Newest first, capped at `max_count`. The sort is stable, so equal
/// timestamps keep feed-iteration order.
pub fn assemble(mut items: Vec<PublishedItem>, max_count: usize) -> Vec<PublishedItem> {
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    items.truncate(max_count);
    items
}
