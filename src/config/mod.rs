// src/config/mod.rs
//! Collector configuration: feed list, topic vocabulary, fetch limits, output.
//!
//! Resolution order used by [`load_default`]:
//! 1) `$COLLECTOR_CONFIG_PATH`
//! 2) `config/collector.toml`
//! 3) `config/collector.json`
//! 4) built-in defaults

pub mod topic;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::types::FeedSource;
pub use topic::TopicConfig;

pub const ENV_CONFIG_PATH: &str = "COLLECTOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_TOML: &str = "config/collector.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/collector.json";

pub const DEFAULT_MAX_ITEMS: usize = 50;
pub const DEFAULT_OUTPUT_PATH: &str = "items.json";

/// How entries without a usable timestamp are ranked.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UndatedPolicy {
    /// Treat as observed at run time (ranks among the most recent).
    #[default]
    Newest,
    /// Treat as the Unix epoch (ranks last).
    Oldest,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            concurrency: 4,
            max_attempts: 2,
            user_agent: concat!("feed-collector/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    pub max_items: usize,
    pub undated: UndatedPolicy,
    pub output_path: PathBuf,
    pub fetch: FetchConfig,
    pub topic: TopicConfig,
    pub feeds: Vec<FeedSource>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            undated: UndatedPolicy::default(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            fetch: FetchConfig::default(),
            topic: TopicConfig::default(),
            feeds: default_feeds(),
        }
    }
}

impl CollectorConfig {
    /// Normalize term lists, repair feed labels, clamp fetch limits.
    pub fn sanitized(mut self) -> Self {
        self.topic = self.topic.sanitized();
        self.fetch.concurrency = self.fetch.concurrency.max(1);
        self.fetch.max_attempts = self.fetch.max_attempts.max(1);
        self.feeds = self
            .feeds
            .into_iter()
            .filter_map(|f| {
                let url = f.url.trim().to_string();
                if url.is_empty() {
                    tracing::warn!(target: "config", label = %f.label, "feed without url dropped");
                    return None;
                }
                let mut feed = FeedSource::new(f.label.trim(), url);
                if feed.label.is_empty() {
                    let host = feed.host();
                    feed.label = if host.is_empty() { feed.url.clone() } else { host };
                }
                Some(feed)
            })
            .collect();
        self
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<CollectorConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading collector config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing collector config {}", path.display()))
}

/// Load config using env var + fallbacks (see module docs).
pub fn load_default() -> Result<CollectorConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in [DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_JSON] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_from(&p);
        }
    }
    Ok(CollectorConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<CollectorConfig> {
    let cfg = if hint_ext == "json" {
        serde_json::from_str::<CollectorConfig>(s)?
    } else if hint_ext == "toml" {
        toml::from_str::<CollectorConfig>(s)?
    } else {
        // Unknown extension: JSON if it looks like an object, TOML otherwise.
        if s.trim_start().starts_with('{') {
            serde_json::from_str::<CollectorConfig>(s)?
        } else {
            toml::from_str::<CollectorConfig>(s)?
        }
    };
    Ok(cfg.sanitized())
}

fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new(
            "Google News",
            "https://news.google.com/rss/search?q=%22Notre+Dame+Fighting+Irish+football%22&hl=en-US&gl=US&ceid=US:en",
        ),
        FeedSource::new(
            "On3",
            "https://www.on3.com/teams/notre-dame-fighting-irish/football/feed/",
        ),
        FeedSource::new(
            "Fighting Irish Wire",
            "https://fightingirishwire.usatoday.com/feed/",
        ),
        FeedSource::new(
            "ESPN",
            "https://www.espn.com/college-football/team/_/id/87/notre-dame-fighting-irish/rss",
        ),
        FeedSource::new("247Sports", "https://247sports.com/college/notre-dame/Article/feed/"),
    ]
}
