//! Text Matcher: finds where a proposed change's original text sits in the estimated layout.
//!
//! Tiers run in order of decreasing confidence and the first tier that produces
//! a span wins; within a tier the earliest span in document order wins.
//!
//! 1. Containment: the span contains the whole (trimmed, lowercased) search text.
//! 2. Token overlap: ≥ 60% of the search tokens (len > 2) occur in one span (span len > 10).
//! 3. Adjacent pair: ≥ 50% of the search tokens occur in two consecutive spans joined together.
//! 4. Significant word: the first span containing any search token longer than 4 chars.

use serde::Serialize;

use crate::models::TextSpan;

/// Spans must be longer than this (normalized chars) to take part in token overlap.
const OVERLAP_MIN_SPAN_LEN: usize = 10;
/// Search text must be longer than this (normalized chars) to take part in token overlap.
const OVERLAP_MIN_SEARCH_LEN: usize = 5;
/// Tokens must be longer than this to count towards overlap ratios.
const MIN_TOKEN_LEN: usize = 2;
/// Tokens must be longer than this to be matched on their own.
const SIGNIFICANT_WORD_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Containment,
    TokenOverlap,
    AdjacentPair,
    SignificantWord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanMatch {
    pub span: TextSpan,
    pub tier: MatchTier,
}

/// Returns the best span for `search_text`, or `None` when every tier misses.
pub fn locate(search_text: &str, spans: &[TextSpan]) -> Option<TextSpan> {
    locate_with_tier(search_text, spans).map(|m| m.span)
}

/// Like `locate`, but also reports which tier produced the match.
pub fn locate_with_tier(search_text: &str, spans: &[TextSpan]) -> Option<SpanMatch> {
    let needle = normalize(search_text);
    if needle.is_empty() || spans.is_empty() {
        return None;
    }

    let haystack: Vec<String> = spans.iter().map(|s| normalize(&s.text)).collect();
    let tokens: Vec<&str> = needle
        .split_whitespace()
        .filter(|t| t.chars().count() > MIN_TOKEN_LEN)
        .collect();

    containment(&needle, spans, &haystack)
        .map(|span| (span, MatchTier::Containment))
        .or_else(|| {
            token_overlap(&needle, &tokens, spans, &haystack).map(|s| (s, MatchTier::TokenOverlap))
        })
        .or_else(|| adjacent_pair(&tokens, spans, &haystack).map(|s| (s, MatchTier::AdjacentPair)))
        .or_else(|| {
            significant_word(&needle, spans, &haystack).map(|s| (s, MatchTier::SignificantWord))
        })
        .map(|(span, tier)| SpanMatch { span, tier })
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// `ceil(count × numerator / denominator)` without floating-point drift.
fn ceil_ratio(count: usize, numerator: usize, denominator: usize) -> usize {
    (count * numerator).div_ceil(denominator)
}

fn count_present(tokens: &[&str], text: &str) -> usize {
    tokens.iter().filter(|t| text.contains(**t)).count()
}

fn containment(needle: &str, spans: &[TextSpan], haystack: &[String]) -> Option<TextSpan> {
    haystack
        .iter()
        .position(|text| text.contains(needle))
        .map(|i| spans[i].clone())
}

fn token_overlap(
    needle: &str,
    tokens: &[&str],
    spans: &[TextSpan],
    haystack: &[String],
) -> Option<TextSpan> {
    if needle.chars().count() <= OVERLAP_MIN_SEARCH_LEN || tokens.is_empty() {
        return None;
    }
    let required = ceil_ratio(tokens.len(), 3, 5);

    haystack
        .iter()
        .position(|text| {
            text.chars().count() > OVERLAP_MIN_SPAN_LEN && count_present(tokens, text) >= required
        })
        .map(|i| spans[i].clone())
}

/// Pairs never straddle a page break: one cover rectangle cannot span two pages.
fn adjacent_pair(tokens: &[&str], spans: &[TextSpan], haystack: &[String]) -> Option<TextSpan> {
    if tokens.len() < 2 {
        return None;
    }
    let required = ceil_ratio(tokens.len(), 1, 2);

    (0..spans.len().saturating_sub(1))
        .find(|&i| {
            spans[i].page_index == spans[i + 1].page_index && {
                let joined = format!("{} {}", haystack[i], haystack[i + 1]);
                count_present(tokens, &joined) >= required
            }
        })
        .map(|i| spans[i].extended_to(&spans[i + 1]))
}

fn significant_word(needle: &str, spans: &[TextSpan], haystack: &[String]) -> Option<TextSpan> {
    needle
        .split_whitespace()
        .filter(|t| t.chars().count() > SIGNIFICANT_WORD_LEN)
        .find_map(|token| haystack.iter().position(|text| text.contains(token)))
        .map(|i| spans[i].clone())
}
