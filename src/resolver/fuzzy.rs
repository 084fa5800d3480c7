//! Scored fuzzy matching against live candidate value lists.
//!
//! Used when no alias table hit and a free-text fragment must be matched
//! against the distinct values currently present in a column (program or
//! lesson names the alias tables do not cover).
//!
//! Scoring tiers:
//! - 1.0  exact equality of cleaned query and candidate
//! - 0.9  substring containment in either direction
//! - else token overlap: query tokens that equal, contain, or are
//!   contained by a candidate token, divided by
//!   max(query token count, candidate token count)
//!
//! Candidates scoring strictly above [`SCORE_THRESHOLD`] are returned in
//! descending score order; ties keep the original candidate order.

use super::normalize::{normalize_text, tokenize};

/// Minimum score (exclusive) for a candidate to be kept.
pub const SCORE_THRESHOLD: f64 = 0.3;

/// A candidate value with its match score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub value: String,
    pub score: f64,
}

/// Score one candidate against an already-normalized, stop-word-stripped
/// query string.
pub fn score_candidate(query_clean: &str, candidate: &str) -> f64 {
    let candidate_clean = normalize_text(candidate, false);
    if query_clean.is_empty() || candidate_clean.is_empty() {
        return 0.0;
    }

    if query_clean == candidate_clean {
        return 1.0;
    }

    if query_clean.contains(&candidate_clean) || candidate_clean.contains(query_clean) {
        return 0.9;
    }

    let query_tokens = tokenize(query_clean);
    let candidate_tokens = tokenize(&candidate_clean);
    if query_tokens.is_empty() || candidate_tokens.is_empty() {
        return 0.0;
    }

    let hits = query_tokens
        .iter()
        .filter(|qt| {
            candidate_tokens
                .iter()
                .any(|ct| *qt == ct || ct.contains(qt.as_str()) || qt.contains(ct.as_str()))
        })
        .count();

    hits as f64 / query_tokens.len().max(candidate_tokens.len()) as f64
}

/// Rank live candidate values against raw question text.
///
/// The query is normalized and stop-word-stripped once; candidates above
/// the threshold come back sorted by score descending (stable, so ties
/// preserve the original iteration order).
pub fn rank_candidates(query: &str, candidates: &[String]) -> Vec<ScoredCandidate> {
    let query_clean = normalize_text(query, true);
    if query_clean.is_empty() {
        return vec![];
    }

    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|c| ScoredCandidate {
            value: c.clone(),
            score: score_candidate(&query_clean, c),
        })
        .filter(|s| s.score > SCORE_THRESHOLD)
        .collect();

    // sort_by is stable: equal scores keep candidate order
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored
}
