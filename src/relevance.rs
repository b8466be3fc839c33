// src/relevance.rs
//! Relevance gate: keyword predicate deciding whether an entry is on-topic.
//!
//! Order is reject-first:
//! 1) any exclusion term → reject
//! 2) no required-topic term → reject
//! 3) aggregator feed without a sport-context hint → reject

use crate::canonical::AggregatorHosts;
use crate::config::TopicConfig;

/// Outcome of a relevance evaluation, with the reason for rejections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Relevant,
    Excluded(String),
    MissingTopic,
    MissingSportContext,
}

impl Verdict {
    pub fn is_relevant(&self) -> bool {
        matches!(self, Verdict::Relevant)
    }

    /// Short label for logs.
    pub fn reason(&self) -> String {
        match self {
            Verdict::Relevant => "relevant".into(),
            Verdict::Excluded(term) => format!("excluded:{term}"),
            Verdict::MissingTopic => "missing_topic".into(),
            Verdict::MissingSportContext => "missing_sport_context".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelevanceGate {
    required: Vec<String>,
    excluded: Vec<String>,
    hints: Vec<String>,
    aggregators: AggregatorHosts,
}

impl RelevanceGate {
    /// Build from a topic config; terms are expected lower-cased (see `TopicConfig::sanitized`).
    pub fn new(topic: &TopicConfig) -> Self {
        Self {
            required: topic.required_terms.clone(),
            excluded: topic.exclusion_terms.clone(),
            hints: topic.sport_hints.clone(),
            aggregators: AggregatorHosts::new(&topic.aggregator_hosts),
        }
    }

    pub fn evaluate(&self, title: &str, summary: &str, feed_host: &str) -> Verdict {
        let text = format!("{title} {summary}").to_lowercase();

        if let Some(term) = first_hit(&text, &self.excluded) {
            return Verdict::Excluded(term.to_string());
        }
        if first_hit(&text, &self.required).is_none() {
            return Verdict::MissingTopic;
        }
        if self.aggregators.contains(feed_host) && first_hit(&text, &self.hints).is_none() {
            return Verdict::MissingSportContext;
        }
        Verdict::Relevant
    }

    pub fn is_relevant(&self, title: &str, summary: &str, feed_host: &str) -> bool {
        self.evaluate(title, summary, feed_host).is_relevant()
    }
}

fn first_hit<'a>(text: &str, terms: &'a [String]) -> Option<&'a str> {
    terms
        .iter()
        .map(String::as_str)
        .find(|t| text.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> RelevanceGate {
        RelevanceGate::new(&TopicConfig::default())
    }

    #[test]
    fn direct_feed_needs_only_topic() {
        let g = gate();
        assert!(g.is_relevant("Fighting Irish hold practice", "", "www.espn.com"));
    }

    #[test]
    fn exclusion_wins_over_topic() {
        let g = gate();
        let v = g.evaluate(
            "Fighting Irish basketball tops Duke",
            "Notre Dame football fans watched too",
            "www.espn.com",
        );
        assert_eq!(v, Verdict::Excluded("basketball".into()));
        assert_eq!(v.reason(), "excluded:basketball");
    }

    #[test]
    fn aggregator_requires_sport_hint() {
        let g = gate();
        assert_eq!(
            g.evaluate("South Bend weather update", "", "news.google.com"),
            Verdict::MissingSportContext
        );
        assert!(g.is_relevant(
            "South Bend: Irish quarterback named starter",
            "",
            "news.google.com"
        ));
        // same text from a direct outlet passes without the hint
        assert!(g.is_relevant("South Bend weather update", "", "www.southbendtribune.com"));
    }

    #[test]
    fn missing_topic_rejected() {
        assert_eq!(
            gate().evaluate("Ohio State quarterback update", "", "espn.com"),
            Verdict::MissingTopic
        );
    }
}
