//! Purchase-intent classification.
//!
//! Signals are extracted from search queries and funnel-site visits, scored
//! per segment over a sliding decay window, and folded into a short list of
//! winning categories for ad targeting.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

use super::funnel_sites;
use super::keywords::{DEFAULT_FUNNEL_WEIGHT, FUNNEL_KEYWORDS, SEGMENT_KEYWORDS};
use super::search_providers;
use super::signal::{PurchaseIntentSignal, SegmentHistoryMap, SignalRecord};

/// Every signal record contributes this base level, scaled by its weight.
const SIGNAL_LEVEL: u16 = 1;

const MAX_QUERY_WORDS: usize = 1000;

static STRIP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^\w\s]|_").unwrap()
});
static COLLAPSE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lowercase `text`, strip punctuation, and split into a word set capped at
/// [`MAX_QUERY_WORDS`] entries.
fn transform_into_word_set(text: &str) -> HashSet<String> {
    let stripped = STRIP_PATTERN.replace_all(text, "");
    let collapsed = COLLAPSE_PATTERN.replace_all(&stripped, " ");
    collapsed
        .to_lowercase()
        .split_whitespace()
        .take(MAX_QUERY_WORDS)
        .map(str::to_string)
        .collect()
}

fn is_subset(needles: &HashSet<String>, haystack: &HashSet<String>) -> bool {
    needles.is_subset(haystack)
}

/// Extracts signals from page visits and scores segment history.
#[derive(Debug, Clone)]
pub struct Classifier {
    decay_window: Duration,
    score_threshold: u64,
}

impl Classifier {
    pub fn new(decay_window_days: i64, score_threshold: u64) -> Self {
        Self {
            decay_window: Duration::days(decay_window_days),
            score_threshold,
        }
    }

    /// Extract a purchase-intent signal from a page visit.
    ///
    /// Search results pages are classified by query keywords; known funnel
    /// sites match by domain. Anything else yields an empty signal.
    pub fn extract_signal(&self, url: &str, now: DateTime<Utc>) -> PurchaseIntentSignal {
        if let Some(query) = search_providers::extract_search_query(url) {
            return self.classify_query(&query, now);
        }

        if let Some(site) = funnel_sites::find_funnel_site(url) {
            debug!(domain = site.domain, "funnel site visit");
            return PurchaseIntentSignal {
                at: now,
                segments: site.segments.iter().map(|s| s.to_string()).collect(),
                weight: site.weight,
            };
        }

        PurchaseIntentSignal::default()
    }

    fn classify_query(&self, query: &str, now: DateTime<Utc>) -> PurchaseIntentSignal {
        let words = transform_into_word_set(query);

        let segments = SEGMENT_KEYWORDS.iter().find_map(|info| {
            let keywords = transform_into_word_set(info.keywords);
            is_subset(&keywords, &words)
                .then(|| info.segments.iter().map(|s| s.to_string()).collect::<Vec<_>>())
        });

        let Some(segments) = segments else {
            return PurchaseIntentSignal::default();
        };

        let weight = FUNNEL_KEYWORDS
            .iter()
            .find(|info| is_subset(&transform_into_word_set(info.keywords), &words))
            .map(|info| info.weight)
            .unwrap_or(DEFAULT_FUNNEL_WEIGHT);

        PurchaseIntentSignal {
            at: now,
            segments,
            weight,
        }
    }

    /// Score a segment's history: the weighted sum of records that fall
    /// inside the decay window, boundary inclusive.
    pub fn score_segment(&self, records: &[SignalRecord], now: DateTime<Utc>) -> u64 {
        records
            .iter()
            .filter(|record| now - record.at <= self.decay_window)
            .map(|record| u64::from(SIGNAL_LEVEL) * u64::from(record.weight))
            .sum()
    }

    /// The highest-scoring segments whose score strictly exceeds the
    /// threshold, at most `max_count` of them. Ties keep the history map's
    /// iteration order.
    pub fn winning_categories(
        &self,
        history: &SegmentHistoryMap,
        max_count: usize,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let mut scored: Vec<(String, u64)> = history
            .iter()
            .map(|(segment, records)| (segment.to_string(), self.score_segment(records, now)))
            .filter(|(_, score)| *score > self.score_threshold)
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(max_count);
        scored.into_iter().map(|(segment, _)| segment).collect()
    }
}
