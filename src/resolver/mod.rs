//! Entity & alias resolution
//!
//! Maps free-text fragments of a question to canonical program names, a
//! canonical region, and (as a fallback) lesson names. Alias tables are
//! checked first, in specificity order, with matched spans consumed so a
//! fully-qualified name never also fires the umbrella alias it contains.
//! Fragments no alias covers go through scored fuzzy matching against the
//! live distinct-value sets.
//!
//! Resolution never errors: if the live value lists cannot be fetched the
//! resolver returns an empty match set and the caller falls back to a
//! help/suggestion response.

pub mod fuzzy;
pub mod normalize;
pub mod suggest;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aliases::{PROGRAM_ALIASES, REGION_ALIASES};
use crate::schema::columns;
use crate::store::EngagementStore;
use normalize::normalize_text;

/// How a canonical value was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Alias,
    Fuzzy,
    /// Carried over from an earlier turn in the same session
    Memory,
}

/// Which column family an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Program,
    Region,
    Lesson,
}

/// A (raw span, canonical value) pair produced by resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    /// The text fragment that matched
    pub raw: String,
    /// The authoritative spelling as it appears in the dataset
    pub canonical: String,
    pub kind: EntityKind,
    pub source: MatchSource,
}

/// Everything resolution found in one question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedEntities {
    pub programs: Vec<ResolvedEntity>,
    pub region: Option<ResolvedEntity>,
    pub lessons: Vec<ResolvedEntity>,
}

impl ResolvedEntities {
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty() && self.region.is_none() && self.lessons.is_empty()
    }

    /// Canonical program names, fan-out included, duplicates removed.
    pub fn program_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entity in &self.programs {
            if !names.contains(&entity.canonical) {
                names.push(entity.canonical.clone());
            }
        }
        names
    }

    pub fn lesson_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entity in &self.lessons {
            if !names.contains(&entity.canonical) {
                names.push(entity.canonical.clone());
            }
        }
        names
    }

    pub fn region_name(&self) -> Option<&str> {
        self.region.as_ref().map(|r| r.canonical.as_str())
    }
}

/// Resolves question text against alias tables and live column values.
pub struct EntityResolver {
    store: Arc<dyn EngagementStore>,
}

/// Maximum fuzzy matches kept per column family
const MAX_FUZZY_MATCHES: usize = 3;

impl EntityResolver {
    pub fn new(store: Arc<dyn EngagementStore>) -> Self {
        Self { store }
    }

    /// Resolve programs, region, and lessons from raw question text.
    pub async fn resolve(&self, text: &str) -> ResolvedEntities {
        let live_programs = match self.store.distinct_values(columns::PROGRAM_NAME).await {
            Ok(values) => values,
            Err(e) => {
                warn!("program value lookup failed, resolving nothing: {e}");
                return ResolvedEntities::default();
            }
        };
        let live_regions = match self.store.distinct_values(columns::REGION).await {
            Ok(values) => values,
            Err(e) => {
                warn!("region value lookup failed, resolving nothing: {e}");
                return ResolvedEntities::default();
            }
        };

        let norm = normalize_text(text, false);

        let mut resolved = ResolvedEntities {
            programs: resolve_program_aliases(&norm, &live_programs),
            region: resolve_region_alias(&norm, &live_regions),
            lessons: vec![],
        };

        // Entities found via alias tables are not re-scored; fuzzy matching
        // only runs when the alias pass came up empty for programs.
        if resolved.programs.is_empty() {
            resolved.programs = self.fuzzy_resolve(
                text,
                &live_programs,
                EntityKind::Program,
            );
        }

        // Last resort: the fragment may name a lesson rather than a program.
        if resolved.programs.is_empty() {
            match self.store.distinct_values(columns::LESSON_NAME).await {
                Ok(live_lessons) => {
                    resolved.lessons =
                        self.fuzzy_resolve(text, &live_lessons, EntityKind::Lesson);
                }
                Err(e) => {
                    warn!("lesson value lookup failed, skipping lesson matching: {e}");
                }
            }
        }

        debug!(
            programs = resolved.programs.len(),
            region = resolved.region.is_some(),
            lessons = resolved.lessons.len(),
            "resolution complete"
        );
        resolved
    }

    fn fuzzy_resolve(
        &self,
        text: &str,
        candidates: &[String],
        kind: EntityKind,
    ) -> Vec<ResolvedEntity> {
        let cleaned = normalize_text(text, true);
        fuzzy::rank_candidates(text, candidates)
            .into_iter()
            .take(MAX_FUZZY_MATCHES)
            .map(|scored| ResolvedEntity {
                raw: cleaned.clone(),
                canonical: scored.value,
                kind,
                source: MatchSource::Fuzzy,
            })
            .collect()
    }
}

/// Find `pattern` as a whole-word substring of normalized `haystack`.
///
/// Returns the byte span in `haystack`, searching from `from`.
fn find_word_span(haystack: &str, pattern: &str, from: usize) -> Option<(usize, usize)> {
    let mut search_start = from;
    while search_start <= haystack.len() {
        let rel = haystack[search_start..].find(pattern)?;
        let start = search_start + rel;
        let end = start + pattern.len();
        let boundary_before = start == 0 || haystack.as_bytes()[start - 1] == b' ';
        let boundary_after = end == haystack.len() || haystack.as_bytes()[end] == b' ';
        if boundary_before && boundary_after {
            return Some((start, end));
        }
        search_start = next_char_boundary(haystack, start);
    }
    None
}

/// The next char boundary strictly after `pos`.
fn next_char_boundary(s: &str, pos: usize) -> usize {
    let mut next = pos + 1;
    while next < s.len() && !s.is_char_boundary(next) {
        next += 1;
    }
    next
}

fn overlaps(span: (usize, usize), consumed: &[(usize, usize)]) -> bool {
    consumed
        .iter()
        .any(|c| !(span.1 <= c.0 || span.0 >= c.1))
}

/// Scan the program alias table in specificity order, consuming spans.
fn resolve_program_aliases(norm: &str, live: &[String]) -> Vec<ResolvedEntity> {
    let mut consumed: Vec<(usize, usize)> = Vec::new();
    let mut positioned: Vec<(usize, ResolvedEntity)> = Vec::new();

    for (alias, canonicals) in PROGRAM_ALIASES {
        let mut from = 0;
        while let Some(span) = find_word_span(norm, alias, from) {
            if overlaps(span, &consumed) {
                from = next_char_boundary(norm, span.0);
                continue;
            }
            consumed.push(span);
            for canonical in *canonicals {
                if !is_live(canonical, live) {
                    debug!("alias '{alias}' maps to '{canonical}', absent from live values");
                    continue;
                }
                if !positioned.iter().any(|(_, e)| e.canonical == *canonical) {
                    positioned.push((
                        span.0,
                        ResolvedEntity {
                            raw: norm[span.0..span.1].to_string(),
                            canonical: (*canonical).to_string(),
                            kind: EntityKind::Program,
                            source: MatchSource::Alias,
                        },
                    ));
                }
            }
            from = span.1;
        }
    }

    // Report matches in question order, not table order
    positioned.sort_by_key(|(pos, _)| *pos);
    positioned.into_iter().map(|(_, e)| e).collect()
}

/// Scan the region alias table; regions are one-to-one.
fn resolve_region_alias(norm: &str, live: &[String]) -> Option<ResolvedEntity> {
    for (alias, canonical) in REGION_ALIASES {
        if let Some(span) = find_word_span(norm, alias, 0) {
            if !is_live(canonical, live) {
                debug!("region alias '{alias}' maps to '{canonical}', absent from live values");
                continue;
            }
            return Some(ResolvedEntity {
                raw: norm[span.0..span.1].to_string(),
                canonical: (*canonical).to_string(),
                kind: EntityKind::Region,
                source: MatchSource::Alias,
            });
        }
    }
    None
}

/// Membership test against the live distinct-value set, case-insensitive.
fn is_live(canonical: &str, live: &[String]) -> bool {
    live.iter().any(|v| v.eq_ignore_ascii_case(canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExecutionError, ExecutionResult};
    use crate::store::Row;
    use async_trait::async_trait;

    struct FakeStore {
        fail: bool,
    }

    #[async_trait]
    impl EngagementStore for FakeStore {
        async fn execute(&self, _statement: &str) -> ExecutionResult<Vec<Row>> {
            Ok(vec![])
        }

        async fn distinct_values(&self, column: &str) -> ExecutionResult<Vec<String>> {
            if self.fail {
                return Err(ExecutionError::Transport("down".to_string()));
            }
            Ok(match column {
                columns::PROGRAM_NAME => vec![
                    "ASG Primary Path".to_string(),
                    "ASG Onboarding Path".to_string(),
                    "ASG Win-Back Path".to_string(),
                    "LPW Path".to_string(),
                    "Digital Nurture Path".to_string(),
                ],
                columns::REGION => vec![
                    "AMER".to_string(),
                    "EMEA".to_string(),
                    "APAC".to_string(),
                    "LATAM".to_string(),
                ],
                columns::LESSON_NAME => vec![
                    "Getting Started".to_string(),
                    "Advanced Segmentation".to_string(),
                ],
                _ => vec![],
            })
        }
    }

    fn resolver(fail: bool) -> EntityResolver {
        EntityResolver::new(Arc::new(FakeStore { fail }))
    }

    #[tokio::test]
    async fn test_umbrella_alias_fans_out() {
        let resolved = resolver(false).resolve("How is ASG doing?").await;
        assert_eq!(resolved.program_names().len(), 3);
        assert!(resolved
            .programs
            .iter()
            .all(|p| p.source == MatchSource::Alias));
    }

    #[tokio::test]
    async fn test_qualified_name_resolves_to_itself() {
        let resolved = resolver(false).resolve("ASG Primary Path funnel").await;
        assert_eq!(resolved.program_names(), vec!["ASG Primary Path"]);
    }

    #[tokio::test]
    async fn test_two_entities_for_comparison() {
        let resolved = resolver(false)
            .resolve("Compare ASG Primary Path with LPW Path")
            .await;
        assert_eq!(
            resolved.program_names(),
            vec!["ASG Primary Path", "LPW Path"]
        );
    }

    #[tokio::test]
    async fn test_region_synonym() {
        let resolved = resolver(false).resolve("clicks in Europe").await;
        assert_eq!(resolved.region_name(), Some("EMEA"));
    }

    #[tokio::test]
    async fn test_fuzzy_fallback_for_lessons() {
        let resolved = resolver(false)
            .resolve("show advanced segmentation numbers")
            .await;
        assert!(resolved.programs.is_empty());
        assert_eq!(resolved.lesson_names(), vec!["Advanced Segmentation"]);
        assert_eq!(resolved.lessons[0].source, MatchSource::Fuzzy);
    }

    #[tokio::test]
    async fn test_store_failure_resolves_nothing() {
        let resolved = resolver(true).resolve("ASG Primary Path").await;
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn test_no_match_is_empty_not_error() {
        let resolved = resolver(false).resolve("hello there").await;
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_find_word_span_boundaries() {
        assert_eq!(find_word_span("asg primary path", "asg", 0), Some((0, 3)));
        assert_eq!(find_word_span("the lpw path", "lpw path", 0), Some((4, 12)));
        // "asg" inside "asgx" is not a word match
        assert_eq!(find_word_span("asgx primary", "asg", 0), None);
    }

    #[test]
    fn test_alias_span_consumption() {
        let live = vec![
            "ASG Primary Path".to_string(),
            "ASG Onboarding Path".to_string(),
            "ASG Win-Back Path".to_string(),
        ];
        // The umbrella "asg" occurs only inside the consumed qualified span
        let out = resolve_program_aliases("asg primary path", &live);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].canonical, "ASG Primary Path");

        // A bare umbrella still fans out
        let out = resolve_program_aliases("asg results", &live);
        assert_eq!(out.len(), 3);
    }
}
