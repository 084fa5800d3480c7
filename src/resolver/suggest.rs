//! "Did you mean" suggestions over small in-memory candidate lists.
//!
//! Jaro-Winkler ranking used for degraded responses (no data found,
//! missing second comparison entity). Suitable for lookup-table-sized
//! lists; the live distinct-value sets are capped well below that.

/// Minimum Jaro-Winkler similarity for a suggestion
const JARO_WINKLER_THRESHOLD: f64 = 0.6;

/// Find the best matches for a term in a small list using Jaro-Winkler
pub fn closest_matches<'a>(
    term: &str,
    candidates: &'a [String],
    max_results: usize,
) -> Vec<(&'a str, f64)> {
    if candidates.is_empty() {
        return vec![];
    }

    let term_lower = term.to_lowercase();

    let mut scored: Vec<(&str, f64)> = candidates
        .iter()
        .map(|c| {
            let score = strsim::jaro_winkler(&term_lower, &c.to_lowercase());
            (c.as_str(), score)
        })
        .filter(|(_, score)| *score >= JARO_WINKLER_THRESHOLD)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(max_results);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn programs() -> Vec<String> {
        vec![
            "ASG Primary Path".to_string(),
            "ASG Onboarding Path".to_string(),
            "LPW Path".to_string(),
            "Digital Nurture Path".to_string(),
        ]
    }

    #[test]
    fn test_exact_term_ranks_first() {
        let results = closest_matches("lpw path", &programs(), 3);
        assert!(!results.is_empty());
        assert_eq!(results[0].0, "LPW Path");
        assert!(results[0].1 > 0.99);
    }

    #[test]
    fn test_typo_still_matches() {
        let results = closest_matches("LPW Pth", &programs(), 3);
        assert!(!results.is_empty());
        assert_eq!(results[0].0, "LPW Path");
    }

    #[test]
    fn test_no_good_match() {
        let results = closest_matches("zzzz9999", &programs(), 3);
        assert!(results.is_empty());
    }
}
