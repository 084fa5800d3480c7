//! Static alias tables for entity resolution.
//!
//! These are immutable, module-level lookup tables: program aliases (an
//! umbrella code fans out to several canonical program names), region
//! synonyms (many spellings collapse to one canonical region), and the
//! month-to-quarter table. They are plain const slices - safe for
//! concurrent read-only access and checked in declaration order.
//!
//! Ordering invariant: when one alias pattern contains another ("asg
//! primary path" contains "asg"), the longer pattern appears first. The
//! resolver consumes the matched span, so a fully-qualified name never
//! also fires its umbrella alias.

/// Program aliases, most specific first. Patterns are matched against
/// normalized text (lowercase, punctuation stripped).
///
/// An alias maps to one or more canonical program names; the umbrella
/// "asg" code fans out to all three ASG paths.
pub const PROGRAM_ALIASES: &[(&str, &[&str])] = &[
    ("digital nurture path", &["Digital Nurture Path"]),
    ("asg onboarding path", &["ASG Onboarding Path"]),
    ("asg win back path", &["ASG Win-Back Path"]),
    ("asg primary path", &["ASG Primary Path"]),
    ("digital nurture", &["Digital Nurture Path"]),
    ("asg onboarding", &["ASG Onboarding Path"]),
    ("asg win back", &["ASG Win-Back Path"]),
    ("lpw pilot path", &["LPW Pilot Path"]),
    ("asg primary", &["ASG Primary Path"]),
    ("lpw pilot", &["LPW Pilot Path"]),
    ("lpw path", &["LPW Path"]),
    ("nurture", &["Digital Nurture Path"]),
    ("lpw", &["LPW Path"]),
    (
        "asg",
        &["ASG Primary Path", "ASG Onboarding Path", "ASG Win-Back Path"],
    ),
];

/// Region synonyms, most specific first. One-to-one, unlike programs.
pub const REGION_ALIASES: &[(&str, &str)] = &[
    ("asia pacific", "APAC"),
    ("latin america", "LATAM"),
    ("north america", "AMER"),
    ("united states", "AMER"),
    ("middle east", "EMEA"),
    ("americas", "AMER"),
    ("america", "AMER"),
    ("europe", "EMEA"),
    ("africa", "EMEA"),
    ("brazil", "LATAM"),
    ("mexico", "LATAM"),
    ("japan", "APAC"),
    ("asia", "APAC"),
    ("latam", "LATAM"),
    ("apac", "APAC"),
    ("emea", "EMEA"),
    ("amer", "AMER"),
    ("usa", "AMER"),
    ("anz", "APAC"),
];

/// Month name to fiscal quarter. The fiscal year is calendar-aligned.
pub const MONTH_QUARTERS: &[(&str, &str)] = &[
    ("january", "Q1"),
    ("february", "Q1"),
    ("march", "Q1"),
    ("april", "Q2"),
    ("may", "Q2"),
    ("june", "Q2"),
    ("july", "Q3"),
    ("august", "Q3"),
    ("september", "Q3"),
    ("october", "Q4"),
    ("november", "Q4"),
    ("december", "Q4"),
];

/// Stop words stripped from a question before fuzzy matching.
pub const STOP_WORDS: &[&str] = &[
    "show", "me", "the", "a", "an", "for", "of", "in", "on", "at", "to", "is",
    "are", "was", "were", "what", "whats", "which", "how", "many", "much",
    "did", "does", "do", "please", "give", "get", "tell", "about", "data",
    "numbers", "stats", "metrics", "funnel", "performance", "this", "that",
    "current", "quarter", "and", "with", "compare", "vs", "versus", "against",
    "by", "breakdown", "broken", "down", "trend", "over", "time",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_umbrella_alias_fans_out_to_three() {
        let (_, canonicals) = PROGRAM_ALIASES
            .iter()
            .find(|(alias, _)| *alias == "asg")
            .expect("umbrella alias present");
        assert_eq!(canonicals.len(), 3);
    }

    #[test]
    fn test_qualified_aliases_map_to_one() {
        for (alias, canonicals) in PROGRAM_ALIASES {
            if *alias != "asg" {
                assert_eq!(canonicals.len(), 1, "alias '{alias}' should be one-to-one");
            }
        }
    }

    #[test]
    fn test_program_alias_specificity_ordering() {
        // If one pattern contains another, the longer must come first.
        for (i, (later, _)) in PROGRAM_ALIASES.iter().enumerate() {
            for (earlier, _) in &PROGRAM_ALIASES[..i] {
                assert!(
                    !later.contains(earlier),
                    "'{earlier}' listed before '{later}' which contains it"
                );
            }
        }
    }

    #[test]
    fn test_region_aliases_collapse_to_canonical_set() {
        let canonical = ["AMER", "EMEA", "APAC", "LATAM"];
        for (_, region) in REGION_ALIASES {
            assert!(canonical.contains(region));
        }
    }

    #[test]
    fn test_month_table_is_complete() {
        assert_eq!(MONTH_QUARTERS.len(), 12);
        for (_, quarter) in MONTH_QUARTERS {
            assert!(matches!(*quarter, "Q1" | "Q2" | "Q3" | "Q4"));
        }
    }
}
