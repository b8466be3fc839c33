// tests/relevance_gate.rs
use feed_collector::config::TopicConfig;
use feed_collector::relevance::{RelevanceGate, Verdict};

fn gate() -> RelevanceGate {
    RelevanceGate::new(&TopicConfig::default())
}

#[test]
fn basketball_story_with_team_name_is_rejected() {
    let v = gate().evaluate(
        "Fighting Irish basketball lands transfer",
        "Notre Dame adds a guard",
        "www.on3.com",
    );
    assert_eq!(v, Verdict::Excluded("basketball".into()));
}

#[test]
fn exclusion_checked_before_topic() {
    let v = gate().evaluate("Women's soccer preview", "", "www.espn.com");
    assert!(matches!(v, Verdict::Excluded(_)));
}

#[test]
fn direct_feed_needs_only_topic() {
    assert!(gate().is_relevant("Marcus Freeman press conference", "", "www.on3.com"));
    assert_eq!(
        gate().evaluate("Big Ten roundup", "Ohio State rolls", "www.on3.com"),
        Verdict::MissingTopic
    );
}

#[test]
fn aggregator_feed_needs_sport_context() {
    assert_eq!(
        gate().evaluate("South Bend road closures", "Traffic update", "news.google.com"),
        Verdict::MissingSportContext
    );
    assert!(gate().is_relevant(
        "South Bend buzz",
        "Irish quarterback battle heats up",
        "news.google.com"
    ));
}

#[test]
fn matching_ignores_case() {
    assert!(gate().is_relevant("FIGHTING IRISH DEPTH CHART", "", "www.espn.com"));
}

#[test]
fn custom_topic_vocabulary() {
    let topic = TopicConfig {
        required_terms: vec!["wolverines".into()],
        exclusion_terms: vec!["hockey".into()],
        sport_hints: vec!["football".into()],
        aggregator_hosts: vec!["bing.com".into()],
        ..TopicConfig::default()
    }
    .sanitized();
    let g = RelevanceGate::new(&topic);
    assert!(g.is_relevant("Wolverines depth chart", "", "www.mlive.com"));
    assert!(!g.is_relevant("Wolverines hockey recap", "", "www.mlive.com"));
    assert!(!g.is_relevant("Fighting Irish", "", "www.mlive.com"));
    assert_eq!(
        g.evaluate("Wolverines news", "", "www.bing.com"),
        Verdict::MissingSportContext
    );
}
