//! Time-filter extraction.
//!
//! Always attempted, independent of the primary intent kind. Priority:
//! explicit quarter token ("Q3", "quarter 3") over month names (mapped
//! through the fixed month table) over the literal "this/current quarter"
//! phrase (resolved against today and tagged as assumed) over no filter.
//!
//! The absent/assumed distinction is load-bearing: an absent filter means
//! "all time", an assumed filter means the system defaulted to the current
//! quarter and the narrative says so.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::aliases::MONTH_QUARTERS;

/// The time scope of one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum TimeScope {
    /// No time reference in the question - all time.
    Unbounded,
    /// The question said "this/current quarter"; we resolved it for them.
    AssumedCurrent { quarter: String },
    /// The question named a quarter or a month.
    Explicit { quarter: String },
}

impl TimeScope {
    /// The quarter token to filter by, if any.
    pub fn quarter(&self) -> Option<&str> {
        match self {
            TimeScope::Unbounded => None,
            TimeScope::AssumedCurrent { quarter } | TimeScope::Explicit { quarter } => {
                Some(quarter)
            }
        }
    }

    pub fn is_assumed(&self) -> bool {
        matches!(self, TimeScope::AssumedCurrent { .. })
    }
}

fn quarter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:q\s*([1-4])|quarter\s+([1-4]))\b").expect("valid quarter regex")
    })
}

fn current_quarter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:this|current)\s+quarter\b").expect("valid current-quarter regex")
    })
}

/// The quarter token for a calendar date.
pub fn quarter_of(date: NaiveDate) -> String {
    format!("Q{}", (date.month0() / 3) + 1)
}

/// Extract the time scope from question text, resolving "current" against
/// `today`.
pub fn extract_time_scope(text: &str, today: NaiveDate) -> TimeScope {
    if let Some(caps) = quarter_re().captures(text) {
        let digit = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or("1");
        return TimeScope::Explicit {
            quarter: format!("Q{digit}"),
        };
    }

    let lower = text.to_lowercase();
    for (month, quarter) in MONTH_QUARTERS {
        let abbrev: String = month.chars().take(3).collect();
        if contains_word(&lower, month) || contains_word(&lower, &abbrev) {
            return TimeScope::Explicit {
                quarter: (*quarter).to_string(),
            };
        }
    }

    if current_quarter_re().is_match(text) {
        return TimeScope::AssumedCurrent {
            quarter: quarter_of(today),
        };
    }

    TimeScope::Unbounded
}

/// Extract the time scope resolved against the real-world current date.
pub fn extract_time_scope_now(text: &str) -> TimeScope {
    extract_time_scope(text, Utc::now().date_naive())
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.split(|c: char| !c.is_alphanumeric()).any(|t| t == word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 15).expect("valid date")
    }

    #[test]
    fn test_explicit_quarter_token() {
        assert_eq!(
            extract_time_scope("ASG clicks in Q3", today()),
            TimeScope::Explicit {
                quarter: "Q3".to_string()
            }
        );
        assert_eq!(
            extract_time_scope("quarter 2 results", today()),
            TimeScope::Explicit {
                quarter: "Q2".to_string()
            }
        );
    }

    #[test]
    fn test_month_maps_to_quarter() {
        assert_eq!(
            extract_time_scope("opens in November", today()),
            TimeScope::Explicit {
                quarter: "Q4".to_string()
            }
        );
        assert_eq!(
            extract_time_scope("opens in nov", today()),
            TimeScope::Explicit {
                quarter: "Q4".to_string()
            }
        );
    }

    #[test]
    fn test_quarter_token_beats_month() {
        assert_eq!(
            extract_time_scope("Q1 not January", today()),
            TimeScope::Explicit {
                quarter: "Q1".to_string()
            }
        );
    }

    #[test]
    fn test_current_quarter_is_assumed() {
        let scope = extract_time_scope("funnel for this quarter", today());
        assert_eq!(
            scope,
            TimeScope::AssumedCurrent {
                quarter: "Q3".to_string()
            }
        );
        assert!(scope.is_assumed());
    }

    #[test]
    fn test_no_time_reference_is_unbounded() {
        let scope = extract_time_scope("ASG funnel", today());
        assert_eq!(scope, TimeScope::Unbounded);
        assert_eq!(scope.quarter(), None);
    }

    #[test]
    fn test_quarter_of() {
        assert_eq!(quarter_of(NaiveDate::from_ymd_opt(2025, 1, 1).expect("date")), "Q1");
        assert_eq!(quarter_of(NaiveDate::from_ymd_opt(2025, 12, 31).expect("date")), "Q4");
    }
}
