//! Text normalization for entity matching
//!
//! Provides normalization for question text and candidate values:
//! - Unicode NFKC normalization
//! - Lowercase conversion
//! - Punctuation stripping (digits kept)
//! - Whitespace collapsing
//! - Optional stop-word removal

use unicode_normalization::UnicodeNormalization;

use crate::aliases::STOP_WORDS;

/// Normalize text for matching.
///
/// Performs:
/// - Unicode NFKC fold
/// - Lowercase conversion
/// - Strip punctuation (replace with space)
/// - Collapse whitespace
/// - Optionally strip stop words
///
/// # Examples
///
/// ```
/// use engage_poc::resolver::normalize::normalize_text;
///
/// assert_eq!(normalize_text("Show me the ASG funnel!", true), "asg");
/// assert_eq!(normalize_text("ASG Win-Back Path", false), "asg win back path");
/// ```
pub fn normalize_text(s: &str, strip_stop_words: bool) -> String {
    // Unicode NFKC normalization
    let folded: String = s.nfkc().collect();

    // Replace non-alphanumeric with space, lowercase
    let stripped: String = folded
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    let tokens: Vec<&str> = stripped.split_whitespace().collect();

    let filtered: Vec<&str> = if strip_stop_words {
        tokens.into_iter().filter(|t| !is_stop_word(t)).collect()
    } else {
        tokens
    };

    filtered.join(" ")
}

/// Check if a token is on the fixed stop-word list
pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Tokenize text for overlap matching.
///
/// Returns normalized tokens with stop words kept, suitable for
/// token-by-token comparison.
pub fn tokenize(s: &str) -> Vec<String> {
    normalize_text(s, false)
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}
