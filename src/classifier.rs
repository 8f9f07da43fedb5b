//! Regional relevance classification
//!
//! Flags lines whose host part points at a regional domain or a known
//! regional site. Matching is plain substring containment and over-matches
//! (`bb.com` also hits `webb.com`).

use crate::rules::Ruleset;
use crate::validator::field_spans;

/// Stateless classifier bound to a [`Ruleset`]
#[derive(Debug, Clone, Copy)]
pub struct RegionClassifier<'r> {
    rules: &'r Ruleset,
}

impl<'r> RegionClassifier<'r> {
    pub fn new(rules: &'r Ruleset) -> Self {
        Self { rules }
    }

    /// Check whether a raw line is regionally relevant.
    ///
    /// Works on the raw line rather than a parsed credential: the host
    /// fragment is re-derived here independently of validation.
    pub fn is_regional(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        let fragment = self.url_fragment(&lower);

        if fragment.contains(self.rules.regional_marker()) {
            return true;
        }

        self.rules
            .regional_sites()
            .iter()
            .any(|site| fragment.contains(site.as_str()))
    }

    /// Pick the part of a lowercased line that should carry the host
    fn url_fragment<'a>(&self, lower: &'a str) -> &'a str {
        if !lower.contains(':') {
            return lower;
        }

        let spans = field_spans(lower, self.rules);
        let first = &lower[spans[0].clone()];

        if self.rules.has_url_prefix(first) {
            if spans.len() >= 3 {
                first
            } else {
                lower
            }
        } else {
            first
        }
    }
}
