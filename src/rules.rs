//! Per-source inclusion/exclusion rules.
//!
//! A [`SourceRules`] value is user-authored: substrings a title or URL must
//! (or must not) contain, flags requiring a description or publish date, and a
//! count of leading articles to drop unconditionally (sites whose first slot is
//! always a pinned or promotional item). Matching is case-insensitive.
//!
//! Serialization omits default fields, so the JSON written to storage is the
//! compact form: `{"titleExcludes":["sponsored"]}` rather than a full record.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;

use crate::feed::Article;

/// Filter configuration for a single source URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SourceRules {
    /// Every entry must appear in the title.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub title_includes: Vec<String>,
    /// No entry may appear in the title.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub title_excludes: Vec<String>,
    /// Every entry must appear in the URL.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub url_includes: Vec<String>,
    /// No entry may appear in the URL.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub url_excludes: Vec<String>,
    /// Drop articles without a description.
    #[serde(skip_serializing_if = "is_false")]
    pub require_description: bool,
    /// Drop articles without a publish timestamp.
    #[serde(skip_serializing_if = "is_false")]
    pub require_published_at: bool,
    /// Number of leading articles to skip before any matching.
    #[serde(skip_serializing_if = "is_zero")]
    pub skip_top_count: usize,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl SourceRules {
    /// Trims every pattern, drops blank ones and removes duplicates
    /// (case-insensitively, first spelling wins).
    pub fn normalize(mut self) -> Self {
        for list in [
            &mut self.title_includes,
            &mut self.title_excludes,
            &mut self.url_includes,
            &mut self.url_excludes,
        ] {
            normalize_patterns(list);
        }
        self
    }

    /// True when at least one constraint would change the article list.
    pub fn is_active(&self) -> bool {
        !self.title_includes.is_empty()
            || !self.title_excludes.is_empty()
            || !self.url_includes.is_empty()
            || !self.url_excludes.is_empty()
            || self.require_description
            || self.require_published_at
            || self.skip_top_count > 0
    }

    /// Compact JSON for persistence; default fields are omitted.
    pub fn to_compact_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.clone().normalize())
    }

    /// Parses stored JSON. Absent fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Self>(json).map(Self::normalize)
    }

    fn matches(&self, matcher: &LoweredRules, article: &Article) -> bool {
        let title = article.title.to_lowercase();
        let url = article.url.to_lowercase();

        matcher.title_includes.iter().all(|p| title.contains(p.as_str()))
            && !matcher.title_excludes.iter().any(|p| title.contains(p.as_str()))
            && matcher.url_includes.iter().all(|p| url.contains(p.as_str()))
            && !matcher.url_excludes.iter().any(|p| url.contains(p.as_str()))
            && (!self.require_description
                || article.description.as_deref().is_some_and(|d| !d.trim().is_empty()))
            && (!self.require_published_at || article.published_at.is_some())
    }
}

fn normalize_patterns(list: &mut Vec<String>) {
    let mut seen = HashSet::new();
    let patterns = std::mem::take(list);
    for pattern in patterns {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            list.push(trimmed.to_owned());
        }
    }
}

/// Lowercased copies of the pattern lists, built once per application.
struct LoweredRules {
    title_includes: Vec<String>,
    title_excludes: Vec<String>,
    url_includes: Vec<String>,
    url_excludes: Vec<String>,
}

impl LoweredRules {
    fn new(rules: &SourceRules) -> Self {
        let lower = |list: &[String]| -> Vec<String> {
            list.iter().map(|p| p.to_lowercase()).collect()
        };
        Self {
            title_includes: lower(&rules.title_includes),
            title_excludes: lower(&rules.title_excludes),
            url_includes: lower(&rules.url_includes),
            url_excludes: lower(&rules.url_excludes),
        }
    }
}

/// Result of applying a rule set to an article list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutcome {
    /// Articles that survived.
    pub articles: Vec<Article>,
    /// Articles dropped by the leading skip.
    pub skipped_top_count: usize,
    /// Articles dropped by predicate matching after the skip.
    pub rule_filtered_count: usize,
    /// `skipped_top_count + rule_filtered_count`.
    pub filtered_out_count: usize,
    /// The normalized rules that were applied (compact when serialized).
    pub applied_rules: SourceRules,
}

/// Applies `rules` to `articles`.
///
/// An inactive rule set is an identity: the list comes back untouched and all
/// counts are zero. Otherwise the first `skip_top_count` articles are dropped
/// (clamped to the list length) and the remainder is filtered by the title,
/// URL, description and timestamp predicates.
pub fn apply_rules(articles: Vec<Article>, rules: &SourceRules) -> RuleOutcome {
    let rules = rules.clone().normalize();
    if !rules.is_active() {
        return RuleOutcome {
            articles,
            skipped_top_count: 0,
            rule_filtered_count: 0,
            filtered_out_count: 0,
            applied_rules: rules,
        };
    }

    let skipped_top_count = rules.skip_top_count.min(articles.len());
    let remainder: Vec<Article> = articles.into_iter().skip(skipped_top_count).collect();
    let remainder_len = remainder.len();

    let matcher = LoweredRules::new(&rules);
    let kept: Vec<Article> = remainder
        .into_iter()
        .filter(|article| rules.matches(&matcher, article))
        .collect();

    let rule_filtered_count = remainder_len - kept.len();
    tracing::debug!(
        skipped_top = skipped_top_count,
        rule_filtered = rule_filtered_count,
        kept = kept.len(),
        "Applied source rules"
    );

    RuleOutcome {
        articles: kept,
        skipped_top_count,
        rule_filtered_count,
        filtered_out_count: skipped_top_count + rule_filtered_count,
        applied_rules: rules,
    }
}

// ============================================================================
// Rule lookup
// ============================================================================

/// Read access to persisted rules, keyed by source URL.
///
/// Extraction only ever reads rules; writing is the storage layer's business.
pub trait RuleStore {
    /// Rules stored for `source_url`, or `None` when the source has none.
    fn load_rules(
        &self,
        source_url: &str,
    ) -> impl Future<Output = anyhow::Result<Option<SourceRules>>> + Send;
}

/// A store that never has rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRules;

impl RuleStore for NoRules {
    fn load_rules(
        &self,
        _source_url: &str,
    ) -> impl Future<Output = anyhow::Result<Option<SourceRules>>> + Send {
        std::future::ready(Ok(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn article(i: usize, title: &str) -> Article {
        Article {
            title: title.to_string(),
            url: format!("https://example.com/news/{i}"),
            description: None,
            published_at: None,
            author: None,
        }
    }

    fn ten_articles() -> Vec<Article> {
        (0..10).map(|i| article(i, &format!("Story number {i}"))).collect()
    }

    #[test]
    fn test_default_rules_are_identity() {
        let input = ten_articles();
        let outcome = apply_rules(input.clone(), &SourceRules::default());
        assert_eq!(outcome.articles, input);
        assert_eq!(outcome.skipped_top_count, 0);
        assert_eq!(outcome.rule_filtered_count, 0);
        assert_eq!(outcome.filtered_out_count, 0);
        assert!(!outcome.applied_rules.is_active());
    }

    #[test]
    fn test_blank_patterns_are_inactive() {
        let rules = SourceRules {
            title_excludes: vec!["  ".into(), String::new()],
            ..Default::default()
        };
        assert!(!rules.clone().normalize().is_active());
        let outcome = apply_rules(ten_articles(), &rules);
        assert_eq!(outcome.articles.len(), 10);
    }

    #[test]
    fn test_exclude_is_case_insensitive() {
        let mut input = ten_articles();
        input[2].title = "Sponsored: buy things".into();
        let rules = SourceRules {
            title_excludes: vec!["sponsored".into()],
            ..Default::default()
        };
        let outcome = apply_rules(input, &rules);
        assert_eq!(outcome.articles.len(), 9);
        assert_eq!(outcome.rule_filtered_count, 1);
        assert_eq!(outcome.filtered_out_count, 1);
        assert!(outcome.articles.iter().all(|a| !a.title.contains("Sponsored")));
    }

    #[test]
    fn test_exclude_matching_everything_empties_list() {
        let rules = SourceRules {
            title_excludes: vec!["STORY".into()],
            skip_top_count: 3,
            ..Default::default()
        };
        let outcome = apply_rules(ten_articles(), &rules);
        assert!(outcome.articles.is_empty());
        assert_eq!(outcome.skipped_top_count, 3);
        assert_eq!(outcome.rule_filtered_count, 7);
        assert_eq!(outcome.filtered_out_count, 10);
    }

    #[test]
    fn test_includes_require_every_pattern() {
        let mut input = ten_articles();
        input[0].title = "Rust release notes".into();
        input[1].title = "Rust meetup".into();
        let rules = SourceRules {
            title_includes: vec!["rust".into(), "release".into()],
            ..Default::default()
        };
        let outcome = apply_rules(input, &rules);
        assert_eq!(outcome.articles.len(), 1);
        assert_eq!(outcome.articles[0].title, "Rust release notes");
    }

    #[test]
    fn test_url_patterns() {
        let mut input = ten_articles();
        input[4].url = "https://example.com/video/4".into();
        let rules = SourceRules {
            url_includes: vec!["EXAMPLE.com".into()],
            url_excludes: vec!["/video/".into()],
            ..Default::default()
        };
        let outcome = apply_rules(input, &rules);
        assert_eq!(outcome.articles.len(), 9);
        assert!(outcome.articles.iter().all(|a| !a.url.contains("/video/")));
    }

    #[test]
    fn test_require_description_and_date() {
        let mut input = ten_articles();
        input[0].description = Some("has text".into());
        input[0].published_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        input[1].description = Some("   ".into());
        input[2].published_at = Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());

        let rules = SourceRules {
            require_description: true,
            ..Default::default()
        };
        assert_eq!(apply_rules(input.clone(), &rules).articles.len(), 1);

        let rules = SourceRules {
            require_published_at: true,
            ..Default::default()
        };
        assert_eq!(apply_rules(input.clone(), &rules).articles.len(), 2);

        let rules = SourceRules {
            require_description: true,
            require_published_at: true,
            ..Default::default()
        };
        let outcome = apply_rules(input, &rules);
        assert_eq!(outcome.articles.len(), 1);
        assert_eq!(outcome.rule_filtered_count, 9);
    }

    #[test]
    fn test_skip_top_clamped() {
        let rules = SourceRules {
            skip_top_count: 25,
            ..Default::default()
        };
        let outcome = apply_rules(ten_articles(), &rules);
        assert!(outcome.articles.is_empty());
        assert_eq!(outcome.skipped_top_count, 10);
        assert_eq!(outcome.rule_filtered_count, 0);
    }

    #[test]
    fn test_normalize_dedupes_and_trims() {
        let rules = SourceRules {
            title_excludes: vec![" Ad ".into(), "ad".into(), "promo".into(), "".into()],
            ..Default::default()
        }
        .normalize();
        assert_eq!(rules.title_excludes, vec!["Ad".to_string(), "promo".to_string()]);
    }

    #[test]
    fn test_compact_json_omits_defaults() {
        let rules = SourceRules {
            title_excludes: vec!["sponsored".into()],
            ..Default::default()
        };
        assert_eq!(rules.to_compact_json().unwrap(), r#"{"titleExcludes":["sponsored"]}"#);
        assert_eq!(SourceRules::default().to_compact_json().unwrap(), "{}");
    }

    #[test]
    fn test_json_with_absent_fields_uses_defaults() {
        let rules = SourceRules::from_json(r#"{"skipTopCount":2,"requireDescription":true}"#)
            .unwrap();
        assert_eq!(rules.skip_top_count, 2);
        assert!(rules.require_description);
        assert!(rules.title_includes.is_empty());
        assert!(!rules.require_published_at);
    }

    #[test]
    fn test_applied_rules_are_normalized() {
        let rules = SourceRules {
            url_excludes: vec!["/ads/".into(), "/ADS/".into()],
            ..Default::default()
        };
        let outcome = apply_rules(ten_articles(), &rules);
        assert_eq!(outcome.applied_rules.url_excludes, vec!["/ads/".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_skip_top_count_arithmetic(n in 0usize..=10) {
            let rules = SourceRules { skip_top_count: n, ..Default::default() };
            let outcome = apply_rules(ten_articles(), &rules);
            prop_assert_eq!(outcome.articles.len(), 10 - n);
            prop_assert_eq!(outcome.rule_filtered_count, 0);
            prop_assert_eq!(outcome.skipped_top_count, n);
        }

        #[test]
        fn prop_default_rules_identity(titles in proptest::collection::vec("[a-zA-Z ]{1,20}", 0..30)) {
            let input: Vec<Article> = titles.iter().enumerate().map(|(i, t)| article(i, t)).collect();
            let outcome = apply_rules(input.clone(), &SourceRules::default());
            prop_assert_eq!(outcome.articles, input);
            prop_assert_eq!(outcome.filtered_out_count, 0);
        }

        #[test]
        fn prop_counts_add_up(skip in 0usize..15, exclude in "[a-e]") {
            let input: Vec<Article> = (0..12).map(|i| article(i, &format!("title {i} {}", (b'a' + (i % 5) as u8) as char))).collect();
            let rules = SourceRules { skip_top_count: skip, title_excludes: vec![exclude], ..Default::default() };
            let outcome = apply_rules(input, &rules);
            prop_assert_eq!(outcome.filtered_out_count, outcome.skipped_top_count + outcome.rule_filtered_count);
            prop_assert_eq!(outcome.articles.len() + outcome.filtered_out_count, 12);
        }
    }
}
