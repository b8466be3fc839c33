// tests/collector_config.rs
use feed_collector::config::{load_default, load_from, UndatedPolicy, ENV_CONFIG_PATH};
use feed_collector::CollectorConfig;
use serial_test::serial;
use std::path::Path;
use std::{env, fs};

#[serial]
#[test]
fn shipped_config_matches_builtin_seed() {
    let cfg = load_from(Path::new("config/collector.toml")).unwrap();
    let seed = CollectorConfig::default();
    assert_eq!(cfg.max_items, seed.max_items);
    assert_eq!(cfg.undated, UndatedPolicy::Newest);
    assert_eq!(cfg.feeds.len(), seed.feeds.len());
    assert_eq!(cfg.topic.required_terms, seed.topic.required_terms);
    assert_eq!(cfg.topic.domain_labels, seed.topic.domain_labels);
}

#[serial]
#[test]
fn overrides_are_sanitized() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("custom.toml");
    fs::write(
        &p,
        r#"
max_items = 3

[fetch]
concurrency = 0

[topic]
required_terms = [" Wolverines ", "wolverines", ""]

[topic.domain_labels]
"WWW.MLive.com" = " MLive "

[[feeds]]
label = "MLive"
url = "https://www.mlive.com/wolverines/rss"
"#,
    )
    .unwrap();

    let cfg = load_from(&p).unwrap();
    assert_eq!(cfg.max_items, 3);
    assert_eq!(cfg.fetch.concurrency, 1);
    assert_eq!(cfg.topic.required_terms, vec!["wolverines".to_string()]);
    assert_eq!(
        cfg.topic.domain_labels.get("mlive.com").map(String::as_str),
        Some("MLive")
    );
    // omitted lists keep the seed
    assert_eq!(
        cfg.topic.exclusion_terms,
        CollectorConfig::default().topic.exclusion_terms
    );
    assert_eq!(cfg.feeds.len(), 1);
}

#[serial]
#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("broken.toml");
    fs::write(&p, "max_items = \"many\"").unwrap();
    assert!(load_from(&p).is_err());
    assert!(load_from(&dir.path().join("absent.toml")).is_err());
}

#[serial]
#[test]
fn default_resolution_order() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);

    // ./config/collector.toml is picked up
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("collector.toml"), "max_items = 12").unwrap();
    assert_eq!(load_default().unwrap().max_items, 12);

    // env var wins over the fallback
    let p_env = tmp.path().join("elsewhere.json");
    fs::write(&p_env, r#"{"max_items": 4}"#).unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    assert_eq!(load_default().unwrap().max_items, 4);

    // env var to a missing file is an error, not a silent fallback
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(load_default().is_err());
    env::remove_var(ENV_CONFIG_PATH);

    env::set_current_dir(&old).unwrap();
}
