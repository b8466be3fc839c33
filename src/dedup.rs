// src/dedup.rs
//! Run-scoped duplicate suppression on two keys: the canonical link and a
//! normalized title fingerprint. Either collision rejects an item.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static OUTLET_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s-\s[a-z0-9&@.,'()/:+ ]+$").expect("outlet tail regex"));
static NON_KEY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9 ]+").expect("non-key chars regex"));

/// Lower-cased, dash-unified, outlet-suffix-free, punctuation-stripped title key.
pub fn title_fingerprint(title: &str) -> String {
    let t = title.to_lowercase().replace(['–', '—'], "-");
    let t = OUTLET_TAIL.replace(&t, "");
    let t = NON_KEY_CHARS.replace_all(&t, " ");
    t.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    DuplicateLink,
    DuplicateTitle,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Identity sets for one run. Create empty per run; never share across runs.
#[derive(Debug, Default)]
pub struct DedupeState {
    seen_links: HashSet<String>,
    seen_title_fingerprints: HashSet<String>,
}

impl DedupeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link is checked before the fingerprint. Both keys are recorded only on
    /// admission. An empty fingerprint carries no identity and is skipped.
    pub fn admit(&mut self, canonical_link: &str, fingerprint: &str) -> Admission {
        if self.seen_links.contains(canonical_link) {
            return Admission::DuplicateLink;
        }
        if !fingerprint.is_empty() && self.seen_title_fingerprints.contains(fingerprint) {
            return Admission::DuplicateTitle;
        }
        self.seen_links.insert(canonical_link.to_string());
        if !fingerprint.is_empty() {
            self.seen_title_fingerprints.insert(fingerprint.to_string());
        }
        Admission::Admitted
    }

    pub fn len(&self) -> usize {
        self.seen_links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_normalizes_case_dashes_and_suffix() {
        assert_eq!(
            title_fingerprint("Notre Dame's Freeman: \"We're ready\" — ESPN"),
            "notre dame s freeman we re ready"
        );
        assert_eq!(
            title_fingerprint("Notre Dame's Freeman: \"We're ready\" - CBS Sports"),
            "notre dame s freeman we re ready"
        );
    }

    #[test]
    fn link_collision_reported_before_title() {
        let mut st = DedupeState::new();
        assert_eq!(st.admit("https://a.test/1", "same"), Admission::Admitted);
        assert_eq!(st.admit("https://a.test/1", "same"), Admission::DuplicateLink);
        assert_eq!(st.admit("https://a.test/2", "same"), Admission::DuplicateTitle);
        assert_eq!(st.admit("https://a.test/2", "other"), Admission::Admitted);
        assert_eq!(st.len(), 2);
    }

    #[test]
    fn rejected_items_leave_no_trace() {
        let mut st = DedupeState::new();
        st.admit("https://a.test/1", "alpha");
        // title dup: its link must not become "seen"
        assert_eq!(st.admit("https://a.test/9", "alpha"), Admission::DuplicateTitle);
        assert_eq!(st.admit("https://a.test/9", "beta"), Admission::Admitted);
    }

    #[test]
    fn empty_fingerprints_do_not_collide() {
        let mut st = DedupeState::new();
        assert_eq!(title_fingerprint("¡¿…!"), "");
        assert!(st.admit("https://a.test/1", "").is_admitted());
        assert!(st.admit("https://a.test/2", "").is_admitted());
    }
}
