//! Read-only statement gate.
//!
//! Defense in depth: this check runs on the requesting side (the builder
//! validates every statement it emits) AND inside the executing store,
//! which may be reached by other callers. The duplication is the design -
//! do not dedupe it away.
//!
//! Forbidden keywords are matched as whole words, never plain substrings:
//! a program named "Update Path" inside a filter literal still trips the
//! gate (rejecting is the safe direction), but a column like
//! "created_at" must not.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{GuardResult, QueryGuardError};

/// Keywords that mark a statement as mutating.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "create", "alter", "truncate", "grant", "revoke",
];

fn forbidden_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"\b({})\b", FORBIDDEN_KEYWORDS.join("|"));
        Regex::new(&pattern).expect("valid forbidden-keyword regex")
    })
}

/// Reject any statement that is not a pure read request.
///
/// On violation the error names the offending keyword; the statement is
/// never stripped or rewritten.
pub fn validate_read_only(statement: &str) -> GuardResult<()> {
    let lowered = statement.trim().to_lowercase();

    if lowered.is_empty() {
        return Err(QueryGuardError::Empty);
    }

    if !lowered.starts_with("select") {
        let found = lowered
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        return Err(QueryGuardError::NotReadOnly { found });
    }

    if let Some(m) = forbidden_re().find(&lowered) {
        return Err(QueryGuardError::ForbiddenKeyword {
            keyword: m.as_str().to_string(),
        });
    }

    Ok(())
}
