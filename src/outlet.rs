// src/outlet.rs
//! # Outlet attribution
//!
//! Decides which publisher an item is credited to. Priority chain:
//! 1. Title suffix: `Headline - Outlet` (hyphen, en- or em-dash between single spaces).
//! 2. Feed-supplied `<source>` metadata, unless it merely names an aggregator.
//! 3. Canonical link domain through the domain→label table (parent domains
//!    tried too); unmapped hosts fall back to the bare host. Aggregator hosts
//!    are never credited.
//! 4. The feed's configured label.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::canonical::{bare_host, AggregatorHosts};
use crate::config::TopicConfig;
use crate::ingest::types::EntrySource;

/// Longest trailing run accepted as an outlet name.
pub const MAX_OUTLET_CHARS: usize = 48;

static OUTLET_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s[-–—]\s([A-Za-z0-9&@.,'()/:+ ]+?)\s*$").expect("outlet suffix regex")
});

/// Which step of the chain produced the outlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutletVia {
    TitleSuffix,
    FeedSource,
    Domain,
    FeedLabel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub display_title: String,
    pub outlet: String,
    pub via: OutletVia,
}

/// Split `Headline - Outlet` into `(headline, Some(outlet))`.
/// Titles without a qualifying suffix come back unchanged with `None`.
pub fn split_title_outlet(title: &str) -> (String, Option<String>) {
    let Some(caps) = OUTLET_SUFFIX.captures(title) else {
        return (title.to_string(), None);
    };
    let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
        return (title.to_string(), None);
    };
    let outlet = name.as_str().trim();
    let len = outlet.chars().count();
    if !(2..=MAX_OUTLET_CHARS).contains(&len) {
        return (title.to_string(), None);
    }
    let clean = title[..whole.start()].trim_end();
    if clean.is_empty() {
        return (title.to_string(), None);
    }
    (clean.to_string(), Some(outlet.to_string()))
}

#[derive(Debug, Clone)]
pub struct OutletResolver {
    labels: BTreeMap<String, String>,
    aggregators: AggregatorHosts,
    brands: Vec<String>,
}

impl OutletResolver {
    pub fn new(topic: &TopicConfig) -> Self {
        let aggregators = AggregatorHosts::new(&topic.aggregator_hosts);
        let brands = aggregators.brands();
        Self {
            labels: topic.domain_labels.clone(),
            aggregators,
            brands,
        }
    }

    pub fn resolve(
        &self,
        title: &str,
        canonical_link: &str,
        entry_source: Option<&EntrySource>,
        feed_label: &str,
    ) -> Resolved {
        let (display_title, from_title) = split_title_outlet(title);

        if let Some(outlet) = from_title {
            return Resolved {
                display_title,
                outlet,
                via: OutletVia::TitleSuffix,
            };
        }

        if let Some(outlet) = entry_source.and_then(|s| self.from_entry_source(s)) {
            return Resolved {
                display_title,
                outlet,
                via: OutletVia::FeedSource,
            };
        }

        if let Some(outlet) = self.from_link(canonical_link) {
            return Resolved {
                display_title,
                outlet,
                via: OutletVia::Domain,
            };
        }

        Resolved {
            display_title,
            outlet: feed_label.to_string(),
            via: OutletVia::FeedLabel,
        }
    }

    /// Label for a link's host; `None` for unparseable links and aggregator hosts.
    pub fn from_link(&self, link: &str) -> Option<String> {
        let url = url::Url::parse(link).ok()?;
        let host = bare_host(url.host_str()?);
        if host.is_empty() || self.aggregators.contains(&host) {
            return None;
        }
        Some(self.label_for_host(&host))
    }

    /// Table lookup on the host, then on each parent domain; bare host otherwise.
    pub fn label_for_host(&self, host: &str) -> String {
        let mut candidate = host;
        loop {
            if let Some(label) = self.labels.get(candidate) {
                return label.clone();
            }
            match candidate.split_once('.') {
                Some((_, parent)) if parent.contains('.') => candidate = parent,
                _ => return host.to_string(),
            }
        }
    }

    fn from_entry_source(&self, src: &EntrySource) -> Option<String> {
        if let Some(title) = src.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return (!self.names_aggregator(title)).then(|| title.to_string());
        }
        let href = src.href.as_deref().map(str::trim).filter(|h| !h.is_empty())?;
        self.from_link(href)
    }

    /// Whole-word brand match: "Google News" names an aggregator, "Climbing Irish Weekly" does not.
    fn names_aggregator(&self, label: &str) -> bool {
        let l = label.to_lowercase();
        l.split(|c: char| !c.is_alphanumeric())
            .any(|word| self.brands.iter().any(|b| b == word))
            || self.aggregators.contains(&l)
    }
}
