// src/ingest/mod.rs
pub mod providers;
pub mod types;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use std::time::Duration;

use crate::assemble::assemble;
use crate::canonical::{canonicalize, AggregatorHosts};
use crate::config::{CollectorConfig, UndatedPolicy};
use crate::dedup::{title_fingerprint, Admission, DedupeState};
use crate::ingest::types::{FeedSource, RawEntry, SourceProvider};
use crate::outlet::OutletResolver;
use crate::relevance::{RelevanceGate, Verdict};
use crate::snapshot::{PublishedItem, Snapshot};

/// One-time metrics registration (so series show up once a recorder is installed).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total entries parsed from feeds.");
        describe_counter!(
            "ingest_kept_total",
            "Entries admitted into the snapshot candidate list."
        );
        describe_counter!(
            "ingest_filtered_total",
            "Entries rejected as malformed or off-topic."
        );
        describe_counter!(
            "ingest_dedup_total",
            "Entries rejected by link or title deduplication."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Feed fetch/parse errors and timeouts."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when the ingest pipeline last ran."
        );
    });
}

/// Normalize text: strip tags, decode entities, collapse all whitespace.
pub fn normalize_text(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    // 1) Tags become a single space (before decoding, so escaped markup stays text)
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?s)<[^>]+>").unwrap());
    let out = re_tags.replace_all(s, " ");

    // 2) HTML entity decode
    let out = html_escape::decode_html_entities(&out);

    // 3) Collapse whitespace, Unicode spaces and zero-width breaks included
    out.split(|c: char| c.is_whitespace() || matches!(c, '\u{200B}' | '\u{2060}' | '\u{FEFF}'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Entries fetched from one source; `failed` marks a fetch/parse error or timeout.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source: FeedSource,
    pub entries: Vec<RawEntry>,
    pub failed: bool,
}

impl SourceBatch {
    pub fn new(source: FeedSource, entries: Vec<RawEntry>) -> Self {
        Self {
            source,
            entries,
            failed: false,
        }
    }

    pub fn failed(source: FeedSource) -> Self {
        Self {
            source,
            entries: Vec::new(),
            failed: true,
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub fetched: usize,
    pub malformed: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub kept: usize,
    pub failed_sources: usize,
}

/// Why an entry did not become an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    Malformed,
    Filtered(Verdict),
    Duplicate(Admission),
}

/// Compiled pipeline for one configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    gate: RelevanceGate,
    resolver: OutletResolver,
    aggregators: AggregatorHosts,
    max_items: usize,
    undated: UndatedPolicy,
    concurrency: usize,
    fetch_deadline: Duration,
}

impl Pipeline {
    pub fn new(cfg: &CollectorConfig) -> Self {
        let attempts = cfg.fetch.max_attempts.max(1);
        // per-request timeout for every attempt, plus backoff slack
        let fetch_deadline = cfg.fetch.timeout() * attempts + Duration::from_secs(5);
        Self {
            gate: RelevanceGate::new(&cfg.topic),
            resolver: OutletResolver::new(&cfg.topic),
            aggregators: AggregatorHosts::new(&cfg.topic.aggregator_hosts),
            max_items: cfg.max_items,
            undated: cfg.undated,
            concurrency: cfg.fetch.concurrency.max(1),
            fetch_deadline,
        }
    }

    pub fn with_fetch_deadline(mut self, deadline: Duration) -> Self {
        self.fetch_deadline = deadline;
        self
    }

    /// Fetch all sources concurrently. Results come back in declared order,
    /// whatever order the fetches finish in.
    pub async fn fetch_all(&self, providers: &[Box<dyn SourceProvider>]) -> Vec<SourceBatch> {
        let fetches: Vec<_> = providers
            .iter()
            .map(|p| fetch_source(p.as_ref(), self.fetch_deadline))
            .collect();
        stream::iter(fetches)
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Single sequential pass over all batches in the order given, with one
    /// run-scoped dedupe state. Returns admitted items in admission order.
    pub fn process_batches(
        &self,
        batches: Vec<SourceBatch>,
        now: DateTime<Utc>,
    ) -> (Vec<PublishedItem>, RunStats) {
        let mut state = DedupeState::new();
        let mut stats = RunStats::default();
        let mut items = Vec::new();

        for batch in batches {
            if batch.failed {
                stats.failed_sources += 1;
            }
            let feed_host = batch.source.host();
            let mut kept_here = 0usize;

            for entry in batch.entries {
                stats.fetched += 1;
                match self.process_entry(entry, &batch.source, &feed_host, &mut state, now) {
                    Ok(item) => {
                        kept_here += 1;
                        items.push(item);
                    }
                    Err(Skip::Malformed) => stats.malformed += 1,
                    Err(Skip::Filtered(v)) => {
                        tracing::debug!(target: "ingest", feed = %batch.source.label, reason = %v.reason(), "entry filtered");
                        stats.filtered += 1;
                    }
                    Err(Skip::Duplicate(a)) => {
                        tracing::debug!(target: "ingest", feed = %batch.source.label, admission = ?a, "entry deduplicated");
                        stats.duplicates += 1;
                    }
                }
            }

            tracing::debug!(target: "ingest", feed = %batch.source.label, kept = kept_here, "source done");
        }

        stats.kept = items.len();
        (items, stats)
    }

    /// Normalize → classify → canonicalize → resolve outlet → dedupe.
    pub fn process_entry(
        &self,
        entry: RawEntry,
        source: &FeedSource,
        feed_host: &str,
        state: &mut DedupeState,
        now: DateTime<Utc>,
    ) -> Result<PublishedItem, Skip> {
        let title = normalize_text(&entry.title);
        let raw_link = entry.link.trim();
        if title.is_empty() || raw_link.is_empty() {
            return Err(Skip::Malformed);
        }
        let summary = normalize_text(&entry.summary);

        let verdict = self.gate.evaluate(&title, &summary, feed_host);
        if !verdict.is_relevant() {
            return Err(Skip::Filtered(verdict));
        }

        let link = canonicalize(raw_link, &self.aggregators);
        let resolved = self.resolver.resolve(
            &title,
            &link,
            entry.source_label.as_ref(),
            &source.label,
        );

        let fingerprint = title_fingerprint(&resolved.display_title);
        let admission = state.admit(&link, &fingerprint);
        if !admission.is_admitted() {
            return Err(Skip::Duplicate(admission));
        }

        let at = entry.published_at.unwrap_or(match self.undated {
            UndatedPolicy::Newest => now,
            UndatedPolicy::Oldest => DateTime::<Utc>::UNIX_EPOCH,
        });

        Ok(PublishedItem::new(resolved.display_title, link, resolved.outlet, at))
    }

    /// Fetch, process, rank, cap. Never fails: a source that errors or times
    /// out contributes zero items.
    pub async fn run_once(
        &self,
        providers: &[Box<dyn SourceProvider>],
        now: DateTime<Utc>,
    ) -> Snapshot {
        ensure_metrics_described();

        let batches = self.fetch_all(providers).await;
        let (items, stats) = self.process_batches(batches, now);
        let items = assemble(items, self.max_items);

        counter!("ingest_kept_total").increment(stats.kept as u64);
        counter!("ingest_filtered_total").increment((stats.filtered + stats.malformed) as u64);
        counter!("ingest_dedup_total").increment(stats.duplicates as u64);
        gauge!("ingest_pipeline_last_run_ts").set(now.timestamp() as f64);

        tracing::info!(
            target: "ingest",
            sources = providers.len(),
            failed_sources = stats.failed_sources,
            fetched = stats.fetched,
            malformed = stats.malformed,
            filtered = stats.filtered,
            duplicates = stats.duplicates,
            kept = stats.kept,
            published = items.len(),
            "ingest run finished"
        );

        Snapshot::new(items, now)
    }
}

/// One provider under the fetch deadline. Errors and timeouts become a failed batch.
async fn fetch_source(provider: &dyn SourceProvider, deadline: Duration) -> SourceBatch {
    let source = provider.source().clone();
    match tokio::time::timeout(deadline, provider.fetch_entries()).await {
        Ok(Ok(entries)) => {
            tracing::info!(
                target: "ingest",
                feed = %source.label,
                entries = entries.len(),
                "feed fetched"
            );
            SourceBatch::new(source, entries)
        }
        Ok(Err(e)) => {
            tracing::warn!(target: "ingest", error = ?e, feed = %source.label, "provider error");
            counter!("ingest_provider_errors_total").increment(1);
            SourceBatch::failed(source)
        }
        Err(_) => {
            tracing::warn!(
                target: "ingest",
                feed = %source.label,
                timeout_ms = deadline.as_millis() as u64,
                "provider timed out"
            );
            counter!("ingest_provider_errors_total").increment(1);
            SourceBatch::failed(source)
        }
    }
}

/// Convenience: build the pipeline from `cfg` and run it once.
pub async fn run_once(
    providers: &[Box<dyn SourceProvider>],
    cfg: &CollectorConfig,
    now: DateTime<Utc>,
) -> Snapshot {
    Pipeline::new(cfg).run_once(providers, now).await
}

/// Run on a separate task so a panic anywhere in the run still yields a
/// valid (empty) snapshot stamped `now`.
pub async fn run_guarded(
    providers: Vec<Box<dyn SourceProvider>>,
    cfg: CollectorConfig,
    now: DateTime<Utc>,
) -> Snapshot {
    let run = tokio::spawn(async move { Pipeline::new(&cfg).run_once(&providers, now).await });
    match run.await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!(target: "ingest", error = %e, "ingest run aborted; publishing empty snapshot");
            Snapshot::empty(now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        assert_eq!(normalize_text("<b>Hello</b>&nbsp;World"), "Hello World");
    }

    #[test]
    fn normalize_text_keeps_escaped_markup_as_text() {
        assert_eq!(normalize_text("a &lt;b&gt; c"), "a <b> c");
    }

    #[test]
    fn undated_policy_oldest_uses_epoch() {
        let cfg = CollectorConfig {
            undated: UndatedPolicy::Oldest,
            ..CollectorConfig::default()
        };
        let p = Pipeline::new(&cfg);
        let src = FeedSource::new("ESPN", "https://www.espn.com/rss");
        let entry = RawEntry {
            title: "Fighting Irish depth chart released".into(),
            link: "https://www.espn.com/story/1".into(),
            ..RawEntry::default()
        };
        let mut st = DedupeState::new();
        let item = p
            .process_entry(entry, &src, "www.espn.com", &mut st, Utc::now())
            .unwrap();
        assert_eq!(item.timestamp, 0);
        assert_eq!(item.source, "ESPN");
    }

    #[test]
    fn missing_link_is_malformed() {
        let p = Pipeline::new(&CollectorConfig::default());
        let src = FeedSource::new("ESPN", "https://www.espn.com/rss");
        let entry = RawEntry {
            title: "Fighting Irish".into(),
            link: "   ".into(),
            ..RawEntry::default()
        };
        let mut st = DedupeState::new();
        assert_eq!(
            p.process_entry(entry, &src, "www.espn.com", &mut st, Utc::now()),
            Err(Skip::Malformed)
        );
        assert!(st.is_empty());
    }
}
