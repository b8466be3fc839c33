// src/snapshot.rs
//! The published artifact: one JSON document per run, replacing the previous
//! one wholesale.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::path::Path;

const ID_SLUG_MAX: usize = 96;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishedItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub source: String,
    /// Unix seconds.
    #[serde(alias = "ts")]
    pub timestamp: i64,
    #[serde(alias = "published_iso")]
    pub timestamp_iso: String,
}

impl PublishedItem {
    pub fn new(title: String, link: String, source: String, at: DateTime<Utc>) -> Self {
        Self {
            id: make_id(&link),
            title,
            link,
            source,
            timestamp: at.timestamp(),
            timestamp_iso: iso(at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    #[serde(alias = "updated_iso")]
    pub updated_at: String,
    pub count: usize,
    pub items: Vec<PublishedItem>,
}

impl Snapshot {
    pub fn new(items: Vec<PublishedItem>, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: iso(now),
            count: items.len(),
            items,
        }
    }

    pub fn empty(now: DateTime<Utc>) -> Self {
        Self::new(Vec::new(), now)
    }

    /// Write to a temp file beside `path`, sync, then rename over `path`, so
    /// readers see either the old document or the complete new one.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating snapshot dir {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, self).context("serializing snapshot")?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all().context("syncing snapshot temp file")?;
        tmp.persist(path)
            .with_context(|| format!("publishing snapshot to {}", path.display()))?;
        Ok(())
    }

    /// Read a snapshot; a missing or malformed file reads as zero items.
    pub fn load_or_empty(path: &Path) -> Self {
        let parsed = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str::<Snapshot>(&s).ok());
        match parsed {
            Some(mut snap) => {
                snap.count = snap.items.len();
                snap
            }
            None => Self::empty(Utc.timestamp_opt(0, 0).single().unwrap_or_else(Utc::now)),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing snapshot")
    }
}

/// Stable id for a canonical link: readable slug plus a short SHA-256 prefix.
pub fn make_id(link: &str) -> String {
    let mut slug = String::with_capacity(link.len().min(ID_SLUG_MAX));
    let mut pending_dash = false;
    for ch in link.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
        if slug.len() >= ID_SLUG_MAX {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        link_hash(link)
    } else {
        format!("{slug}-{}", link_hash(link))
    }
}

fn link_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_and_slugged() {
        let a = make_id("https://espn.com/story?id=1");
        assert_eq!(a, make_id("https://espn.com/story?id=1"));
        assert!(a.starts_with("https-espn-com-story-id-1-"));
        assert_eq!(a.len(), "https-espn-com-story-id-1-".len() + 12);
    }

    #[test]
    fn long_links_with_shared_prefix_differ() {
        let base = format!("https://x.test/{}", "a".repeat(200));
        assert_ne!(make_id(&format!("{base}/1")), make_id(&format!("{base}/2")));
    }

    #[test]
    fn legacy_field_names_deserialize() {
        let json = r#"{"updated_iso":"2024-09-01T00:00:00+00:00","count":9,
            "items":[{"id":"a","title":"T","link":"https://x.test","source":"X",
            "ts":5,"published_iso":"1970-01-01T00:00:05+00:00"}]}"#;
        let snap: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.items[0].timestamp, 5);
    }

    #[test]
    fn count_matches_items() {
        let now = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap();
        let s = Snapshot::new(
            vec![PublishedItem::new("T".into(), "https://x.test/a".into(), "X".into(), now)],
            now,
        );
        assert_eq!(s.count, 1);
        assert_eq!(s.updated_at, "2024-09-01T12:00:00Z");
        assert_eq!(s.items[0].timestamp_iso, "2024-09-01T12:00:00Z");
    }
}
