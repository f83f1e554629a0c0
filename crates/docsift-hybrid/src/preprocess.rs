//! Query normalization and abbreviation expansion.
//!
//! The lexical path gets the normalized text with every known abbreviation
//! followed by its expansion (`po` -> `po purchase order`). The vector path
//! gets the raw text, trimmed, since a dense encoder gains nothing from it.

use std::collections::BTreeMap;

use serde::Serialize;

use docsift_cache::fingerprint;
use docsift_core::config::{QueryConfig, SearchConfig};
use docsift_core::hashing::normalize_text;
use docsift_core::types::{Query, SearchFilters};
use docsift_core::{Error, Result};

const BUILTIN_ABBREVIATIONS: &[(&str, &str)] = &[
    ("asap", "as soon as possible"),
    ("eod", "end of day"),
    ("eta", "estimated time of arrival"),
    ("fyi", "for your information"),
    ("inv", "invoice"),
    ("mtg", "meeting"),
    ("nda", "non disclosure agreement"),
    ("po", "purchase order"),
    ("q1", "first quarter"),
    ("q2", "second quarter"),
    ("q3", "third quarter"),
    ("q4", "fourth quarter"),
    ("rfp", "request for proposal"),
    ("yoy", "year over year"),
];

/// A validated query split into its lexical and semantic forms.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    /// Lowercased, whitespace-collapsed input. Part of the cache key.
    pub normalized: String,
    pub lexical: String,
    pub semantic: String,
    pub filters: SearchFilters,
    pub limit: usize,
}

#[derive(Serialize)]
struct CacheKeyParts<'a> {
    query: &'a str,
    filters: &'a SearchFilters,
    limit: usize,
}

impl PreparedQuery {
    /// Fingerprint of normalized text, filters and limit.
    pub fn cache_key(&self) -> Result<String> {
        fingerprint(&CacheKeyParts { query: &self.normalized, filters: &self.filters, limit: self.limit })
    }
}

#[derive(Debug, Clone)]
pub struct QueryPreprocessor {
    abbreviations: BTreeMap<String, String>,
    max_limit: usize,
}

impl QueryPreprocessor {
    pub fn new(max_limit: usize) -> Self {
        let abbreviations = BUILTIN_ABBREVIATIONS.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Self { abbreviations, max_limit }
    }

    pub fn from_config(search: &SearchConfig, query: &QueryConfig) -> Result<Self> {
        search.validate()?;
        let mut pre = Self::new(search.max_limit);
        for (token, expansion) in &query.abbreviations {
            pre = pre.with_abbreviation(token, expansion)?;
        }
        Ok(pre)
    }

    /// Add or replace one expansion. Tokens are matched after normalization.
    pub fn with_abbreviation(mut self, token: &str, expansion: &str) -> Result<Self> {
        let token = normalize_text(token);
        let expansion = normalize_text(expansion);
        if token.is_empty() || token.contains(' ') || expansion.is_empty() {
            return Err(Error::ConfigInvalid(format!("abbreviation {token:?} -> {expansion:?} must map one token to a phrase")));
        }
        self.abbreviations.insert(token, expansion);
        Ok(self)
    }

    pub fn prepare(&self, query: &Query) -> Result<PreparedQuery> {
        if query.limit == 0 || query.limit > self.max_limit {
            return Err(Error::InvalidQuery(format!("limit {} outside [1, {}]", query.limit, self.max_limit)));
        }
        let normalized = normalize_text(&query.text);
        if normalized.is_empty() {
            return Err(Error::InvalidQuery("query is empty".into()));
        }
        if let Some(range) = query.filters.time_range {
            if let (Some(s), Some(e)) = (range.start, range.end) {
                if s > e {
                    return Err(Error::InvalidQuery(format!("time range start {s} is after end {e}")));
                }
            }
        }
        Ok(PreparedQuery {
            lexical: self.expand(&normalized),
            semantic: query.text.trim().to_string(),
            normalized,
            filters: query.filters.clone(),
            limit: query.limit,
        })
    }

    fn expand(&self, normalized: &str) -> String {
        let mut out: Vec<&str> = Vec::new();
        for token in normalized.split(' ') {
            out.push(token);
            let bare = token.trim_matches(|c: char| !c.is_alphanumeric());
            if let Some(expansion) = self.abbreviations.get(bare) {
                out.extend(expansion.split(' '));
            }
        }
        out.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsift_core::types::TimeRange;

    #[test]
    fn expands_only_the_lexical_form() {
        let pre = QueryPreprocessor::new(200);
        let p = pre.prepare(&Query::new("  Approved PO,  for Q3 ", 10)).unwrap();
        assert_eq!(p.normalized, "approved po, for q3");
        assert_eq!(p.lexical, "approved po, purchase order for q3 third quarter");
        assert_eq!(p.semantic, "Approved PO,  for Q3");
    }

    #[test]
    fn rejects_empty_and_out_of_range() {
        let pre = QueryPreprocessor::new(200);
        assert!(matches!(pre.prepare(&Query::new(" \t\n", 10)), Err(Error::InvalidQuery(_))));
        assert!(matches!(pre.prepare(&Query::new("x", 0)), Err(Error::InvalidQuery(_))));
        assert!(matches!(pre.prepare(&Query::new("x", 201)), Err(Error::InvalidQuery(_))));
        assert!(pre.prepare(&Query::new("x", 200)).is_ok());
        let backwards = SearchFilters { time_range: Some(TimeRange { start: Some(10), end: Some(5) }), ..Default::default() };
        assert!(matches!(pre.prepare(&Query::new("x", 5).with_filters(backwards)), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn config_entries_override_builtins() {
        let mut query = QueryConfig::default();
        query.abbreviations.insert("PO".into(), "post office".into());
        let pre = QueryPreprocessor::from_config(&SearchConfig::default(), &query).unwrap();
        assert_eq!(pre.prepare(&Query::new("po box", 5)).unwrap().lexical, "po post office box");

        let mut bad = QueryConfig::default();
        bad.abbreviations.insert("two words".into(), "x".into());
        assert!(matches!(QueryPreprocessor::from_config(&SearchConfig::default(), &bad), Err(Error::ConfigInvalid(_))));
    }

    #[test]
    fn case_variants_share_a_cache_key() {
        let pre = QueryPreprocessor::new(50);
        let a = pre.prepare(&Query::new("Invoice  Q3", 10)).unwrap().cache_key().unwrap();
        let b = pre.prepare(&Query::new("invoice q3", 10)).unwrap().cache_key().unwrap();
        let c = pre.prepare(&Query::new("invoice q3", 11)).unwrap().cache_key().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
