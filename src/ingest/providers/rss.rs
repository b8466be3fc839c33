// src/ingest/providers/rss.rs
//! RSS 2.0, RSS 1.0 (RDF) and Atom 1.0 provider, from an in-memory document or over HTTP.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::time::Duration;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::config::FetchConfig;
use crate::ingest::types::{EntrySource, FeedSource, RawEntry, SourceProvider};

/* ----------------------------
Document model
---------------------------- */

/// Which entry vocabulary a document uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    /// RSS 2.0 and RSS 1.0 (RDF): `<item>` elements.
    Rss,
    /// Atom 1.0: `<entry>` elements.
    Atom,
}

impl Dialect {
    fn entry_tag(self) -> &'static str {
        match self {
            Dialect::Rss => "item",
            Dialect::Atom => "entry",
        }
    }
}

#[derive(Debug, Clone)]
struct AtomLink {
    href: String,
    rel: Option<String>,
}

/// Entry child whose text is being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Guid,
    Summary,
    Content,
    Published,
    Updated,
    SourceTitle,
}

/// Field for an element path relative to the entry (`path[0]` is the entry).
/// Names are qualified, so extension elements (`media:title`, `atom:link`)
/// never shadow the core ones.
fn field_for(dialect: Dialect, path: &[String]) -> Option<Field> {
    let names: Vec<&str> = path.iter().skip(1).map(String::as_str).collect();
    match (dialect, names.as_slice()) {
        (Dialect::Rss, ["title"]) => Some(Field::Title),
        (Dialect::Rss, ["link"]) => Some(Field::Link),
        (Dialect::Rss, ["guid"]) => Some(Field::Guid),
        (Dialect::Rss, ["description"]) => Some(Field::Summary),
        (Dialect::Rss, ["content:encoded"]) => Some(Field::Content),
        (Dialect::Rss, ["pubDate"]) => Some(Field::Published),
        (Dialect::Rss, ["dc:date"]) => Some(Field::Updated),
        (Dialect::Rss, ["source"]) => Some(Field::SourceTitle),
        (Dialect::Atom, ["title"]) => Some(Field::Title),
        (Dialect::Atom, ["summary"]) => Some(Field::Summary),
        (Dialect::Atom, ["content"]) => Some(Field::Content),
        (Dialect::Atom, ["published"]) => Some(Field::Published),
        (Dialect::Atom, ["updated"]) => Some(Field::Updated),
        (Dialect::Atom, ["source", "title"]) => Some(Field::SourceTitle),
        _ => None,
    }
}

/// Fields of one entry as they are found. The first occurrence of each wins.
#[derive(Debug, Default)]
struct EntryBuilder {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    summary: Option<String>,
    content: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    source_title: Option<String>,
    source_href: Option<String>,
    links: Vec<AtomLink>,
    source_links: Vec<AtomLink>,
}

impl EntryBuilder {
    fn set(&mut self, field: Field, text: String) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Guid => &mut self.guid,
            Field::Summary => &mut self.summary,
            Field::Content => &mut self.content,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::SourceTitle => &mut self.source_title,
        };
        if slot.is_none() {
            *slot = Some(text.trim().to_string());
        }
    }

    /// Attribute-carried data: Atom links and the RSS `<source url>`.
    fn start_element(&mut self, dialect: Dialect, path: &[String], e: &BytesStart<'_>) {
        let names: Vec<&str> = path.iter().skip(1).map(String::as_str).collect();
        match (dialect, names.as_slice()) {
            (Dialect::Atom, ["link"]) => self.links.extend(atom_link(e)),
            (Dialect::Atom, ["source", "link"]) => self.source_links.extend(atom_link(e)),
            (Dialect::Rss, ["source"]) => {
                if self.source_href.is_none() {
                    self.source_href = attr(e, b"url");
                }
            }
            _ => {}
        }
    }

    fn build(self, dialect: Dialect) -> RawEntry {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        match dialect {
            Dialect::Rss => {
                let link = non_empty(self.link)
                    .or_else(|| {
                        non_empty(self.guid)
                            .filter(|g| g.starts_with("http://") || g.starts_with("https://"))
                    })
                    .unwrap_or_default();
                let title = non_empty(self.source_title);
                let href = non_empty(self.source_href);
                RawEntry {
                    title: self.title.unwrap_or_default(),
                    link,
                    summary: non_empty(self.summary)
                        .or(non_empty(self.content))
                        .unwrap_or_default(),
                    published_at: self
                        .published
                        .as_deref()
                        .and_then(parse_timestamp)
                        .or_else(|| self.updated.as_deref().and_then(parse_timestamp)),
                    source_label: (title.is_some() || href.is_some())
                        .then_some(EntrySource { title, href }),
                }
            }
            Dialect::Atom => {
                let title = non_empty(self.source_title);
                let href = pick_link(&self.source_links);
                RawEntry {
                    title: self.title.unwrap_or_default(),
                    link: pick_link(&self.links).unwrap_or_default(),
                    summary: non_empty(self.summary)
                        .or(non_empty(self.content))
                        .unwrap_or_default(),
                    published_at: self
                        .published
                        .as_deref()
                        .and_then(parse_timestamp)
                        .or_else(|| self.updated.as_deref().and_then(parse_timestamp)),
                    source_label: (title.is_some() || href.is_some())
                        .then_some(EntrySource { title, href }),
                }
            }
        }
    }
}

fn qname(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| {
            a.unescape_value()
                .map(Cow::into_owned)
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned())
        })
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn atom_link(e: &BytesStart<'_>) -> Option<AtomLink> {
    Some(AtomLink {
        href: attr(e, b"href")?,
        rel: attr(e, b"rel"),
    })
}

/* ----------------------------
Parsing
---------------------------- */

/// Parse an RSS 2.0, RSS 1.0 (RDF) or Atom 1.0 document into raw entries.
///
/// Entries are returned in document order; nothing is normalized here.
/// Unknown and extension elements are ignored, the first occurrence of a
/// repeated field wins, and markup nested inside a text field is kept as
/// text. A syntax error ends the walk: entries completed before it are
/// kept, the one in progress is dropped.
pub fn parse_feed(xml: &str) -> Result<Vec<RawEntry>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);

    let dialect = match root_element(&xml_clean).as_deref() {
        Some("rss") | Some("rdf") => Dialect::Rss,
        Some("feed") => Dialect::Atom,
        Some(other) => bail!("unsupported feed root element <{other}>"),
        None => bail!("document has no root element"),
    };
    let entries = walk_entries(&xml_clean, dialect)?;

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_events_total").increment(entries.len() as u64);
    Ok(entries)
}

fn walk_entries(xml: &str, dialect: Dialect) -> Result<Vec<RawEntry>> {
    let mut reader = Reader::from_str(xml);
    // stray `</p>` or an unclosed `<br>` inside a description must not end the walk
    reader.config_mut().check_end_names = false;

    let entry_tag = dialect.entry_tag();
    let mut entries = Vec::new();
    let mut current: Option<EntryBuilder> = None;
    // element names from the entry element down
    let mut path: Vec<String> = Vec::new();
    // (depth the capture started at, field, text so far)
    let mut capture: Option<(usize, Field, String)> = None;

    loop {
        let event = match reader.read_event() {
            Ok(ev) => ev,
            Err(e) => {
                if entries.is_empty() && current.is_none() {
                    return Err(anyhow!(e)).context("parsing feed xml");
                }
                tracing::warn!(
                    target: "ingest",
                    error = %e,
                    position = reader.buffer_position(),
                    kept = entries.len(),
                    dropped_partial = current.is_some(),
                    "feed xml error; keeping entries parsed so far"
                );
                counter!("ingest_filtered_total").increment(u64::from(current.is_some()));
                break;
            }
        };

        match event {
            Event::Start(e) => {
                let name = qname(e.name().as_ref());
                if current.is_none() {
                    if name == entry_tag {
                        current = Some(EntryBuilder::default());
                        path.push(name);
                    }
                    continue;
                }
                let Some(builder) = current.as_mut() else {
                    continue;
                };
                path.push(name);
                builder.start_element(dialect, &path, &e);
                match capture.as_mut() {
                    // nested markup inside a text field reads as a word break
                    Some((_, _, buf)) => buf.push(' '),
                    None => {
                        capture = field_for(dialect, &path).map(|f| (path.len(), f, String::new()));
                    }
                }
            }
            Event::Empty(e) => {
                if let Some(builder) = current.as_mut() {
                    path.push(qname(e.name().as_ref()));
                    builder.start_element(dialect, &path, &e);
                    path.pop();
                    if let Some((_, _, buf)) = capture.as_mut() {
                        buf.push(' ');
                    }
                }
            }
            Event::Text(t) => {
                if let Some((_, _, buf)) = capture.as_mut() {
                    match t.unescape() {
                        Ok(s) => buf.push_str(&s),
                        // bare `&` and friends: keep the raw text
                        Err(_) => buf.push_str(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Event::CData(c) => {
                if let Some((_, _, buf)) = capture.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => {
                if current.is_none() {
                    continue;
                }
                let name = qname(e.name().as_ref());
                // close back to the matching open element; ignore strays
                let Some(pos) = path.iter().rposition(|n| *n == name) else {
                    continue;
                };
                path.truncate(pos);

                if let Some((depth, field, buf)) = capture.take() {
                    if path.len() < depth {
                        if let Some(builder) = current.as_mut() {
                            builder.set(field, buf);
                        }
                    } else {
                        let mut buf = buf;
                        buf.push(' ');
                        capture = Some((depth, field, buf));
                    }
                }

                if path.is_empty() {
                    if let Some(builder) = current.take() {
                        entries.push(builder.build(dialect));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// `rel="alternate"` (or no rel) wins over other link relations.
fn pick_link(links: &[AtomLink]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")) && !l.href.trim().is_empty())
        .or_else(|| links.iter().find(|l| !l.href.trim().is_empty()))
        .map(|l| l.href.trim().to_string())
}

/// RFC 2822 (RSS) or RFC 3339 (Atom); `None` when neither parses.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let odt = OffsetDateTime::parse(s, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .ok();
    if let Some(odt) = odt {
        return Utc.timestamp_opt(odt.unix_timestamp(), 0).single();
    }
    // chrono is more forgiving with legacy zone names ("EST", "PDT")
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Local name of the first element, lower-cased.
fn root_element(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

static NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]{1,31});").expect("entity regex"));

/// HTML named entities are not valid XML; rewrite them as numeric references.
/// Unknown names are escaped so the document still parses.
fn scrub_html_entities_for_xml(s: &str) -> Cow<'_, str> {
    NAMED_ENTITY.replace_all(s, |caps: &Captures| {
        let name = &caps[1];
        if matches!(name, "amp" | "lt" | "gt" | "quot" | "apos") {
            return caps[0].to_string();
        }
        let decoded = html_escape::decode_html_entities(&caps[0]);
        if decoded == caps[0] {
            return format!("&amp;{name};");
        }
        decoded.chars().map(|c| format!("&#{};", c as u32)).collect()
    })
}

/* ----------------------------
Provider
---------------------------- */

pub struct RssProvider {
    source: FeedSource,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        max_attempts: u32,
    },
}

/// Shared HTTP client for all feed fetches.
pub fn build_client(cfg: &FetchConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(cfg.timeout())
        .user_agent(cfg.user_agent.clone())
        .build()
        .context("failed to build reqwest client")
}

impl RssProvider {
    /// Serve a fixed document (tests, offline runs).
    pub fn from_fixture(source: FeedSource, xml: &str) -> Self {
        Self {
            source,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_http(source: FeedSource, client: reqwest::Client, max_attempts: u32) -> Self {
        Self {
            source,
            mode: Mode::Http {
                client,
                max_attempts: max_attempts.max(1),
            },
        }
    }

    async fn fetch_body(&self, client: &reqwest::Client, max_attempts: u32) -> Result<String> {
        let url = self.source.url.as_str();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let backoff = Duration::from_millis(500u64 << (attempt - 2).min(4));
                tracing::info!(
                    target: "ingest",
                    feed = %self.source.label,
                    attempt,
                    max_attempts,
                    ?backoff,
                    "retrying feed fetch"
                );
                tokio::time::sleep(backoff).await;
            }

            match client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.text().await.context("reading feed body");
                    }
                    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(anyhow!("feed fetch failed with status: {status}"));
                        continue;
                    }
                    bail!("feed fetch failed with status: {status}");
                }
                Err(e) => {
                    last_error = Some(anyhow::Error::new(e).context("network error during fetch"));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("feed fetch gave up without a response")))
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch_entries(&self) -> Result<Vec<RawEntry>> {
        match &self.mode {
            Mode::Fixture(s) => parse_feed(s),
            Mode::Http {
                client,
                max_attempts,
            } => {
                let body = self.fetch_body(client, *max_attempts).await?;
                parse_feed(&body).with_context(|| format!("parsing feed {}", self.source.url))
            }
        }
    }

    fn source(&self) -> &FeedSource {
        &self.source
    }
}
