// src/config/topic.rs
//! Topic vocabulary and attribution tables.
//!
//! Everything the classifier, canonicalizer, and outlet resolver consult is
//! configurable here; `TopicConfig::default()` is the built-in seed used when
//! no config file is found (or a section is omitted).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TopicConfig {
    /// Team-identity phrases; at least one must appear.
    pub required_terms: Vec<String>,
    /// Terms naming other sports/programs; any hit rejects.
    pub exclusion_terms: Vec<String>,
    /// Sport vocabulary demanded of aggregator results.
    pub sport_hints: Vec<String>,
    /// Hosts that re-publish third-party links (news search, redirectors).
    pub aggregator_hosts: Vec<String>,
    /// Domain (without `www.`) → outlet display label.
    pub domain_labels: BTreeMap<String, String>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            required_terms: strings(&[
                "notre dame football",
                "nd football",
                "fighting irish",
                "marcus freeman",
                "irish football",
                "south bend",
                "notre dame vs",
                "notre dame at",
                "nd vs",
                "nd at",
            ]),
            exclusion_terms: strings(&[
                "women",
                "wbb",
                "volleyball",
                "basketball",
                "softball",
                "baseball",
                "soccer",
                "lacrosse",
                "hockey",
                "wrestling",
            ]),
            sport_hints: strings(&[
                "football",
                "ncaaf",
                "ncf",
                "qb",
                "quarterback",
                "defense",
                "offense",
                "linebacker",
                "receiver",
                "running back",
                "depth chart",
                "bye week",
            ]),
            aggregator_hosts: strings(&["news.google.com", "www.bing.com", "bing.com"]),
            domain_labels: default_domain_labels(),
        }
    }
}

impl TopicConfig {
    /// Trim, lower-case and de-duplicate every term list and table key.
    pub fn sanitized(mut self) -> Self {
        self.required_terms = clean_terms(self.required_terms);
        self.exclusion_terms = clean_terms(self.exclusion_terms);
        self.sport_hints = clean_terms(self.sport_hints);
        self.aggregator_hosts = clean_terms(self.aggregator_hosts);
        self.domain_labels = self
            .domain_labels
            .into_iter()
            .filter_map(|(domain, label)| {
                let d = domain.trim().to_ascii_lowercase();
                let d = d.strip_prefix("www.").unwrap_or(&d).to_string();
                let l = label.trim().to_string();
                (!d.is_empty() && !l.is_empty()).then_some((d, l))
            })
            .collect();
        self
    }
}

fn default_domain_labels() -> BTreeMap<String, String> {
    [
        ("espn.com", "ESPN"),
        ("cbssports.com", "CBS Sports"),
        ("247sports.com", "247Sports"),
        ("blueandgold.com", "Blue & Gold (On3)"),
        ("on3.com", "On3"),
        ("southbendtribune.com", "South Bend Tribune"),
        ("fightingirishwire.usatoday.com", "Fighting Irish Wire"),
        ("usatoday.com", "USA Today"),
        ("si.com", "Sports Illustrated"),
        ("sports.yahoo.com", "Yahoo Sports"),
        ("yahoo.com", "Yahoo"),
        ("nbcsports.com", "NBC Sports"),
        ("foxsports.com", "FOX Sports"),
        ("onefootdown.com", "One Foot Down"),
        ("fightingirish.com", "FightingIrish.com"),
        ("insideindsports.com", "Inside ND Sports"),
        ("notredame.rivals.com", "Inside ND Sports (Rivals)"),
        ("wndu.com", "WNDU"),
        ("theathletic.com", "The Athletic"),
        ("apnews.com", "AP News"),
        ("bleacherreport.com", "Bleacher Report"),
        ("reddit.com", "Reddit"),
    ]
    .into_iter()
    .map(|(d, l)| (d.to_string(), l.to_string()))
    .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn clean_terms(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim().to_lowercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_trims_lowercases_and_dedups() {
        let cfg = TopicConfig {
            required_terms: vec![" Fighting Irish ".into(), "fighting irish".into(), "".into()],
            domain_labels: [("WWW.ESPN.com".to_string(), " ESPN ".to_string())]
                .into_iter()
                .collect(),
            ..TopicConfig::default()
        }
        .sanitized();

        assert_eq!(cfg.required_terms, vec!["fighting irish".to_string()]);
        assert_eq!(cfg.domain_labels.get("espn.com").map(String::as_str), Some("ESPN"));
    }

    #[test]
    fn default_seed_is_already_clean() {
        let seed = TopicConfig::default();
        assert_eq!(seed.clone().sanitized().required_terms, seed.required_terms);
        assert!(seed.aggregator_hosts.contains(&"news.google.com".to_string()));
    }
}
