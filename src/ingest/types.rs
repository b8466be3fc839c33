// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One configured feed: a display label and the endpoint it is fetched from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub label: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }

    /// Lower-cased host of the feed endpoint ("" when the URL does not parse).
    pub fn host(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
            .unwrap_or_default()
    }
}

/// Publisher metadata some feeds embed per entry (RSS `<source url="…">Title</source>`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntrySource {
    pub title: Option<String>,
    pub href: Option<String>,
}

/// A feed entry as yielded by a provider, before any normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source_label: Option<EntrySource>,
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_entries(&self) -> Result<Vec<RawEntry>>;
    fn source(&self) -> &FeedSource;
}
