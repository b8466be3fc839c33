// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod assemble;
pub mod canonical;
pub mod config;
pub mod dedup;
pub mod ingest;
pub mod outlet;
pub mod relevance;
pub mod snapshot;

// ---- Re-exports for stable public API ----
pub use crate::config::CollectorConfig;
pub use crate::ingest::{normalize_text, run_guarded, run_once, Pipeline};
pub use crate::snapshot::{PublishedItem, Snapshot};

use crate::ingest::providers::rss::{build_client, RssProvider};
use crate::ingest::types::SourceProvider;

/// HTTP providers for every configured feed, sharing one client.
pub fn http_providers(cfg: &CollectorConfig) -> anyhow::Result<Vec<Box<dyn SourceProvider>>> {
    let client = build_client(&cfg.fetch)?;
    Ok(cfg
        .feeds
        .iter()
        .cloned()
        .map(|f| {
            Box::new(RssProvider::from_http(f, client.clone(), cfg.fetch.max_attempts))
                as Box<dyn SourceProvider>
        })
        .collect())
}
