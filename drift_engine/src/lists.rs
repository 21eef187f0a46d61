//! Markdown list indexing and later-reference resolution.
//!
//! Assistant messages frequently answer with bulleted or numbered lists
//! ("here are five books…"); later user turns refer back to the items by
//! surface ("tell me about Postwar") or by ordinal ("the third one"). This
//! module extracts list items at index time and resolves both reference
//! shapes against them, most recent list first.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use tracing::debug;

/// A single extracted list item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Zero-based position within its list.
    pub item_index: usize,
    /// Item text with bullet marker and inline link syntax stripped.
    pub surface: String,
    /// Stable anchor for host-side scrolling, `{message_id}:li{item_index}`.
    pub anchor_id: String,
}

/// All items extracted from one message, in document order.
#[derive(Debug, Clone)]
pub struct ListRecord {
    pub message_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub items: Vec<ListItem>,
}

/// A resolved reference from free text back into an indexed list item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListReference {
    /// Span in the referring text.
    pub start: usize,
    pub end: usize,
    pub message_id: String,
    pub item: ListItem,
}

/// Session-scoped registry of extracted lists, keyed by message id.
/// Never persisted; a fresh session rebuilds it as messages are indexed.
#[derive(Debug, Default, Clone)]
pub struct ListIndex {
    records: Vec<ListRecord>,
}

fn bullet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[-*+]|\d{1,3}[.)])\s+(.+)$").unwrap())
}

fn ordinal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(
            r"\bthe\s+(first|second|third|fourth|fifth|1st|2nd|3rd|4th|5th|one|two|three|four|five|last)\s+(one|book|title|item|option|recommendation|suggestion)\b",
        )
        .case_insensitive(true)
        .build()
        .unwrap()
    })
}

/// Strip `[label](url)` down to `label` and drop emphasis markers, so item
/// surfaces match the plain text users type back.
fn strip_inline_markup(text: &str) -> String {
    static LINK: OnceLock<Regex> = OnceLock::new();
    let link = LINK.get_or_init(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
    let unlinked = link.replace_all(text, "$1");
    unlinked
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn ordinal_to_index(word: &str, item_count: usize) -> Option<usize> {
    let idx = match word.to_ascii_lowercase().as_str() {
        "first" | "1st" | "one" => 0,
        "second" | "2nd" | "two" => 1,
        "third" | "3rd" | "three" => 2,
        "fourth" | "4th" | "four" => 3,
        "fifth" | "5th" | "five" => 4,
        "last" => item_count.checked_sub(1)?,
        _ => return None,
    };
    (idx < item_count).then_some(idx)
}

impl ListIndex {
    /// Extract list items from a message and record them. Re-indexing the
    /// same message replaces the previous record (deterministic overwrite).
    /// Returns the number of items extracted.
    pub fn index_message(
        &mut self,
        message_id: &str,
        created_at: chrono::DateTime<chrono::Utc>,
        text: &str,
    ) -> usize {
        let mut items = Vec::new();
        for line in text.lines() {
            let Some(caps) = bullet_regex().captures(line) else {
                continue;
            };
            let surface = strip_inline_markup(&caps[1]);
            if surface.is_empty() {
                continue;
            }
            let item_index = items.len();
            items.push(ListItem {
                item_index,
                surface,
                anchor_id: format!("{message_id}:li{item_index}"),
            });
        }

        self.records.retain(|r| r.message_id != message_id);
        let count = items.len();
        if count > 0 {
            debug!(message_id, items = count, "indexed list items");
            self.records.push(ListRecord {
                message_id: message_id.to_string(),
                created_at,
                items,
            });
            self.records.sort_by(|a, b| {
                (a.created_at, &a.message_id).cmp(&(b.created_at, &b.message_id))
            });
        }
        count
    }

    pub fn record_for(&self, message_id: &str) -> Option<&ListRecord> {
        self.records.iter().find(|r| r.message_id == message_id)
    }

    /// Most recent list, if any.
    pub fn latest(&self) -> Option<&ListRecord> {
        self.records.last()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find references to indexed list items in free text.
    ///
    /// Two passes: literal surface matches (case-insensitive, most recent
    /// list first, capped at `max_surface_results`) and ordinal phrases
    /// resolved against the most recent list only. Overlapping hits are
    /// de-duplicated greedily, longer span first, and the total is capped at
    /// `max_results`.
    pub fn match_in_text(
        &self,
        text: &str,
        max_results: usize,
        max_surface_results: usize,
    ) -> Vec<ListReference> {
        if self.records.is_empty() || text.is_empty() {
            return Vec::new();
        }

        let mut hits = Vec::new();

        // Surface pass. Escaped-literal regexes give byte offsets into the
        // original text without a lowercased copy skewing them.
        let mut surface_hits = 0usize;
        'records: for record in self.records.iter().rev() {
            for item in &record.items {
                if item.surface.len() < 3 {
                    continue;
                }
                let Ok(re) = RegexBuilder::new(&regex::escape(&item.surface))
                    .case_insensitive(true)
                    .build()
                else {
                    continue;
                };
                for m in re.find_iter(text) {
                    hits.push(ListReference {
                        start: m.start(),
                        end: m.end(),
                        message_id: record.message_id.clone(),
                        item: item.clone(),
                    });
                    surface_hits += 1;
                    if surface_hits >= max_surface_results {
                        break 'records;
                    }
                }
            }
        }

        // Ordinal pass, against the latest list only.
        if let Some(latest) = self.latest() {
            for caps in ordinal_regex().captures_iter(text) {
                let whole = caps.get(0).unwrap();
                if let Some(idx) = ordinal_to_index(&caps[1], latest.items.len()) {
                    hits.push(ListReference {
                        start: whole.start(),
                        end: whole.end(),
                        message_id: latest.message_id.clone(),
                        item: latest.items[idx].clone(),
                    });
                }
            }
        }

        // Greedy de-overlap, longer span winning at equal starts.
        hits.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then((b.end - b.start).cmp(&(a.end - a.start)))
        });
        let mut kept: Vec<ListReference> = Vec::new();
        let mut last_end = 0usize;
        for hit in hits {
            if hit.start >= last_end {
                last_end = hit.end;
                kept.push(hit);
                if kept.len() >= max_results {
                    break;
                }
            }
        }
        kept
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
