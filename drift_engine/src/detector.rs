//! Entity candidate detection: an ordered cascade of typed regex patterns.
//!
//! Each pattern carries a confidence score and an extraction rule (whole
//! match, a single capture group, or dual work+author emission). Matches run
//! against markdown-stripped text and are translated back to original byte
//! offsets through the span map; candidates whose positions cannot be
//! recovered are silently discarded. Detection never fails — malformed input
//! just yields fewer candidates.

use regex::Regex;
use tracing::debug;

use drift_core::{EntityCandidate, EntityType};

use crate::markdown::{strip_markdown, StrippedText};

/// Surfaces that are never emitted as candidates, and that short-circuit
/// detection when they are the entire input. Low-signal tokens only.
const STOPLIST: &[&str] = &[
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
    "today",
    "tomorrow",
    "yesterday",
    "hello",
    "thanks",
    "thank you",
    "okay",
    "ok",
    "yes",
    "no",
    "the",
    "this",
    "that",
    "also",
    "however",
    "anyway",
];

/// Organizational suffixes checked by type inference (against the last
/// token of the normalized surface).
const ORG_SUFFIXES: &[&str] = &[
    "inc",
    "inc.",
    "corp",
    "corp.",
    "llc",
    "ltd",
    "ltd.",
    "company",
    "foundation",
    "university",
    "institute",
    "committee",
    "department",
    "agency",
    "association",
    "society",
    "press",
    "court",
];

/// Statute/citation tokens checked by type inference.
const LAW_TOKENS: &[&str] = &["act", "amendment", "code", "statute", "u.s.c.", "cfr", "§"];

/// Work-ish nouns checked by type inference.
const WORK_TOKENS: &[&str] = &[
    "book", "novel", "paper", "essay", "report", "study", "article", "memoir", "trilogy",
];

/// How a pattern turns a regex match into candidates.
enum Extraction {
    /// The whole match is one candidate; `None` type means infer from surface.
    Whole(Option<EntityType>),
    /// Dual emission: one work candidate and one person candidate from the
    /// same match (`Title by Author` and dash-separated variants).
    WorkAndAuthor { work: usize, author: usize },
}

/// One entry in the detection cascade.
struct EntityPattern {
    name: &'static str,
    regex: Regex,
    confidence: f32,
    extraction: Extraction,
}

/// The ordered pattern cascade plus the shape regexes used by type inference.
pub struct EntityDetector {
    patterns: Vec<EntityPattern>,
    person_shape: Regex,
    title_case_shape: Regex,
}

impl Default for EntityDetector {
    fn default() -> Self {
        Self::new()
    }
}

// A person name: leading capitalized token, optional middle initials, then
// one or two more capitalized tokens.
const NAME: &str = r"[A-Z][a-z]+(?:\s+[A-Z]\.)*(?:\s+[A-Z][a-z]+){1,2}";
// A title: capitalized head token, then up to seven more title words or
// lowercase connectives. Non-greedy so `by`/dash separators terminate it.
const TITLE: &str = r"[A-Z][\w'’]*(?:\s+(?:of|the|and|a|an|in|for|[A-Z][\w'’]*)){0,7}?";

impl EntityDetector {
    /// Compile the cascade. Pattern order is significant: earlier patterns
    /// produce higher-priority candidates and overlap resolution prefers
    /// longer spans at equal starts.
    pub fn new() -> Self {
        let patterns = vec![
            EntityPattern {
                name: "titled_person",
                regex: Regex::new(
                    r"\b(?:Justice|Judge|Prof\.|Professor|Dr\.|President|Senator)\s+[A-Z][a-z]+(?:\s+[A-Z]\.)*(?:\s+[A-Z][a-z]+){0,2}\b",
                )
                .expect("titled_person pattern"),
                confidence: 0.95,
                extraction: Extraction::Whole(Some(EntityType::Person)),
            },
            EntityPattern {
                name: "person_name",
                regex: Regex::new(&format!(r"\b{NAME}\b")).expect("person_name pattern"),
                confidence: 0.90,
                extraction: Extraction::Whole(Some(EntityType::Person)),
            },
            EntityPattern {
                name: "possessive_work",
                regex: Regex::new(r"\b[A-Z][a-z]+(?:'|’)s\s+(?:book|paper|novel|essay|work)\b")
                    .expect("possessive_work pattern"),
                confidence: 0.92,
                extraction: Extraction::Whole(Some(EntityType::Work)),
            },
            EntityPattern {
                name: "title_by_author",
                regex: Regex::new(&format!(r"\b({TITLE})\s+by\s+({NAME})\b"))
                    .expect("title_by_author pattern"),
                confidence: 0.96,
                extraction: Extraction::WorkAndAuthor { work: 1, author: 2 },
            },
            EntityPattern {
                name: "title_dash_author",
                regex: Regex::new(&format!(r"\b({TITLE})(?:\s+-\s+|\s*[—–]\s*)({NAME})\b"))
                    .expect("title_dash_author pattern"),
                confidence: 0.95,
                extraction: Extraction::WorkAndAuthor { work: 1, author: 2 },
            },
            EntityPattern {
                name: "title_case_fallback",
                regex: Regex::new(r"\b[A-Z][\w'’]*(?:\s+(?:of|the|and|[A-Z][\w'’]*)){1,6}\b")
                    .expect("title_case_fallback pattern"),
                confidence: 0.75,
                extraction: Extraction::Whole(None),
            },
            EntityPattern {
                name: "isbn",
                regex: Regex::new(
                    r"\bISBN(?:-1[03])?:?\s*(?:97[89][- ]?)?\d{1,5}[- ]?\d{1,7}[- ]?\d{1,7}[- ]?[\dXx]\b",
                )
                .expect("isbn pattern"),
                confidence: 0.92,
                extraction: Extraction::Whole(Some(EntityType::Book)),
            },
            EntityPattern {
                name: "case_id",
                regex: Regex::new(r"\b\d{3,}-\d{2,}\b").expect("case_id pattern"),
                confidence: 0.80,
                extraction: Extraction::Whole(Some(EntityType::Case)),
            },
        ];

        Self {
            patterns,
            person_shape: Regex::new(&format!(r"^{NAME}$")).expect("person_shape"),
            title_case_shape: Regex::new(r"^[A-Z][\w'’]*(?:\s+(?:of|the|and|[A-Z][\w'’]*))+$")
                .expect("title_case_shape"),
        }
    }

    /// Detect entity candidates in a message's raw markdown text.
    ///
    /// Returns a non-overlapping list ordered left to right. Never fails;
    /// empty or stoplisted input returns `[]`.
    pub fn detect(&self, text: &str, message_id: &str) -> Vec<EntityCandidate> {
        let trimmed = text.trim();
        if trimmed.is_empty() || STOPLIST.contains(&trimmed.to_lowercase().as_str()) {
            return Vec::new();
        }

        let stripped = strip_markdown(text);
        let mut candidates = Vec::new();

        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(&stripped.clean) {
                for (surface, start, end, fixed_type) in extract(&pattern.extraction, &caps) {
                    self.push_candidate(
                        &mut candidates,
                        &stripped,
                        message_id,
                        pattern.confidence,
                        surface,
                        start,
                        end,
                        fixed_type,
                    );
                }
            }
        }

        let resolved = resolve_overlaps(candidates);
        debug!(
            message_id,
            candidates = resolved.len(),
            "entity detection complete"
        );
        resolved
    }

    /// Validate, translate, and append one raw match as a candidate.
    #[allow(clippy::too_many_arguments)]
    fn push_candidate(
        &self,
        out: &mut Vec<EntityCandidate>,
        stripped: &StrippedText,
        message_id: &str,
        confidence: f32,
        surface: &str,
        clean_start: usize,
        clean_end: usize,
        fixed_type: Option<EntityType>,
    ) {
        if surface.chars().count() < 2 || STOPLIST.contains(&surface.to_lowercase().as_str()) {
            return;
        }
        let Some((start, end)) = stripped.map_span(clean_start, clean_end) else {
            // Position not recoverable in the original text: drop silently.
            return;
        };
        let entity_type = fixed_type.unwrap_or_else(|| self.infer_type(surface));
        out.push(EntityCandidate {
            surface: surface.to_string(),
            start,
            end,
            entity_type,
            message_id: message_id.to_string(),
            confidence,
        });
    }

    /// Heuristic type inference for patterns without a fixed type.
    pub(crate) fn infer_type(&self, surface: &str) -> EntityType {
        let lower = surface.to_lowercase();
        let tokens: Vec<&str> = lower.split_whitespace().collect();

        if let Some(last) = tokens.last() {
            if ORG_SUFFIXES.contains(last) {
                return EntityType::Org;
            }
        }
        if tokens.contains(&"v.") || tokens.contains(&"vs.") || tokens.contains(&"vs") {
            return EntityType::Case;
        }
        if tokens.iter().any(|t| LAW_TOKENS.contains(t)) {
            return EntityType::Law;
        }
        if tokens.iter().any(|t| WORK_TOKENS.contains(t)) {
            return EntityType::Work;
        }
        if self.person_shape.is_match(surface) {
            return EntityType::Person;
        }
        if self.title_case_shape.is_match(surface) {
            return EntityType::Topic;
        }
        EntityType::Other
    }
}

/// Expand a capture set into `(surface, clean_start, clean_end, type)` items
/// according to the pattern's extraction rule.
fn extract<'t>(
    extraction: &Extraction,
    caps: &regex::Captures<'t>,
) -> Vec<(&'t str, usize, usize, Option<EntityType>)> {
    match extraction {
        Extraction::Whole(fixed) => {
            let m = caps.get(0).expect("group 0 always present");
            vec![(m.as_str(), m.start(), m.end(), *fixed)]
        }
        Extraction::WorkAndAuthor { work, author } => {
            let mut items = Vec::new();
            if let Some(m) = caps.get(*work) {
                items.push((m.as_str(), m.start(), m.end(), Some(EntityType::Work)));
            }
            if let Some(m) = caps.get(*author) {
                items.push((m.as_str(), m.start(), m.end(), Some(EntityType::Person)));
            }
            items
        }
    }
}

/// Greedy overlap resolution: sort by `(start asc, surface length desc)` and
/// keep a candidate only when its start is at or past the previous kept end.
/// Longer (and therefore earlier-sorted) spans win ties.
fn resolve_overlaps(mut candidates: Vec<EntityCandidate>) -> Vec<EntityCandidate> {
    candidates.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| b.surface.len().cmp(&a.surface.len()))
            .then_with(|| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });

    let mut kept: Vec<EntityCandidate> = Vec::with_capacity(candidates.len());
    let mut last_end = 0usize;
    for candidate in candidates {
        if kept.is_empty() || candidate.start >= last_end {
            last_end = candidate.end;
            kept.push(candidate);
        }
    }
    kept
}
