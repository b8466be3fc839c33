// src/canonical.rs
//! Link canonicalization: aggregator redirect unwrapping, tracking-parameter
//! removal, host normalization. The canonical form is the identity key used
//! for deduplication and item ids.

use thiserror::Error;
use url::Url;

/// Query-key prefixes treated as tracking noise (matched case-insensitively).
pub const TRACKING_PREFIXES: [&str; 4] = ["utm_", "fbclid", "gclid", "ocid"];

/// Query parameters aggregators use to carry the destination URL, in lookup order.
const DESTINATION_PARAMS: [&str; 2] = ["url", "u"];

/// Bound on nested redirect wrappers.
const MAX_UNWRAP_HOPS: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CanonicalError {
    #[error("unparseable url: {0}")]
    Parse(#[from] url::ParseError),
    #[error("url has no host")]
    NoHost,
}

/// Set of aggregator hosts compared without case or a leading `www.`.
#[derive(Debug, Clone, Default)]
pub struct AggregatorHosts {
    hosts: Vec<String>,
}

impl AggregatorHosts {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for h in hosts {
            let h = bare_host(h.as_ref());
            if !h.is_empty() && !out.contains(&h) {
                out.push(h);
            }
        }
        Self { hosts: out }
    }

    pub fn contains(&self, host: &str) -> bool {
        let h = bare_host(host);
        self.hosts.iter().any(|a| *a == h)
    }

    /// Brand words of the aggregators ("google" for `news.google.com`), used to
    /// spot feed-supplied source labels that merely name the aggregator.
    pub fn brands(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for h in &self.hosts {
            let labels: Vec<&str> = h.split('.').collect();
            let brand = if labels.len() >= 2 {
                labels[labels.len() - 2]
            } else {
                labels[0]
            };
            if !brand.is_empty() && !out.iter().any(|b| b == brand) {
                out.push(brand.to_string());
            }
        }
        out
    }
}

/// Lower-case `host` and strip leading `www.` labels, never down to a single label.
pub fn bare_host(host: &str) -> String {
    let mut h = host.trim().trim_end_matches('.').to_ascii_lowercase();
    while let Some(rest) = h.strip_prefix("www.") {
        if !rest.contains('.') {
            break;
        }
        h = rest.to_string();
    }
    h
}

/// Canonicalize `raw`, falling back to the unmodified input on any failure.
pub fn canonicalize(raw: &str, aggregators: &AggregatorHosts) -> String {
    match try_canonicalize(raw, aggregators) {
        Ok(u) => u,
        Err(e) => {
            tracing::debug!(target: "ingest", error = %e, url = raw, "canonicalize fallback");
            raw.to_string()
        }
    }
}

pub fn try_canonicalize(raw: &str, aggregators: &AggregatorHosts) -> Result<String, CanonicalError> {
    let mut url = Url::parse(raw.trim())?;
    if url.host_str().is_none() {
        return Err(CanonicalError::NoHost);
    }

    for _ in 0..MAX_UNWRAP_HOPS {
        match unwrap_redirect(&url, aggregators) {
            Some(dest) => url = dest,
            None => break,
        }
    }

    strip_tracking(&mut url);

    let host = bare_host(url.host_str().ok_or(CanonicalError::NoHost)?);
    url.set_host(Some(&host))?;
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_fragment(None);

    Ok(url.to_string())
}

/// Destination carried by an aggregator wrapper, if it is itself a usable URL.
fn unwrap_redirect(url: &Url, aggregators: &AggregatorHosts) -> Option<Url> {
    let host = url.host_str()?;
    if !aggregators.contains(host) {
        return None;
    }
    for name in DESTINATION_PARAMS {
        let Some((_, value)) = url.query_pairs().find(|(k, _)| k == name) else {
            continue;
        };
        if let Ok(dest) = Url::parse(value.trim()) {
            if dest.host_str().is_some() {
                return Some(dest);
            }
        }
    }
    None
}

fn is_tracking_key(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    TRACKING_PREFIXES.iter().any(|p| k.starts_with(p))
}

fn strip_tracking(url: &mut Url) {
    if url.query().is_none() {
        return;
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_key(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}
