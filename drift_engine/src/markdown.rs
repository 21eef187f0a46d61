//! Markdown-aware text stripping with a bidirectional span map.
//!
//! Entity detection runs over human-readable text, but persisted spans must
//! point into the original markdown so the host UI can highlight the rendered
//! source. `strip_markdown` removes link URLs and emphasis markers while
//! recording, for every byte of the cleaned output, the byte offset of the
//! source character it came from.

/// Markdown source stripped to plain text, with a clean→original byte map.
#[derive(Debug, Clone)]
pub struct StrippedText {
    /// The cleaned text: link labels kept, URLs and emphasis markers gone.
    pub clean: String,
    /// `map[i]` is the source byte offset of the character that produced
    /// clean byte `i`. Copied characters map byte-for-byte, so offsets
    /// inside a multi-byte character stay exact.
    map: Vec<usize>,
}

impl StrippedText {
    /// Translate a clean byte offset back to the original text.
    ///
    /// `None` means the position is unrecoverable and the caller must
    /// discard the candidate.
    pub fn map_to_original(&self, clean_index: usize) -> Option<usize> {
        self.map.get(clean_index).copied()
    }

    /// Translate a clean byte span `[start, end)` to original byte offsets.
    ///
    /// Both bounds must fall inside the map and the span must be non-empty.
    pub fn map_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start >= end {
            return None;
        }
        let orig_start = self.map_to_original(start)?;
        // The last clean byte of a copied character maps to the same source
        // byte as its first byte plus the intra-character distance, so the
        // exclusive end is one past the last byte's source offset.
        let orig_end = self.map_to_original(end - 1)? + 1;
        if orig_start >= orig_end {
            return None;
        }
        Some((orig_start, orig_end))
    }
}

/// Strip markdown decoration from `source`, keeping a span map.
///
/// Processing is a single left-to-right scan:
/// - `[label](url)` emits only the label's characters; the parenthesized URL
///   (nested parens tracked by depth) contributes nothing.
/// - `*`, `_` and `` ` `` markers are consumed silently.
/// - Every other character is copied through with a 1:1 mapping entry.
pub fn strip_markdown(source: &str) -> StrippedText {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut clean = String::with_capacity(source.len());
    let mut map = Vec::with_capacity(source.len());
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            '*' | '_' | '`' => {
                i += 1;
            }
            '[' if has_link_tail(&chars, i) => {
                // Opening bracket of a [label](url) construct: drop it, the
                // label chars flow through the normal path below.
                i += 1;
            }
            ']' if matches!(chars.get(i + 1), Some((_, '('))) => {
                // End of a link label: skip "](", then the URL with a paren
                // depth counter.
                i += 2;
                let mut depth = 1usize;
                while i < chars.len() && depth > 0 {
                    match chars[i].1 {
                        '(' => depth += 1,
                        ')' => depth -= 1,
                        _ => {}
                    }
                    i += 1;
                }
            }
            _ => {
                clean.push(c);
                for b in 0..c.len_utf8() {
                    map.push(offset + b);
                }
                i += 1;
            }
        }
    }

    StrippedText { clean, map }
}

/// Whether the `[` at `chars[open]` is followed by a `](`, i.e. starts a
/// markdown link rather than a literal bracket.
fn has_link_tail(chars: &[(usize, char)], open: usize) -> bool {
    let mut j = open + 1;
    while j < chars.len() {
        match chars[j].1 {
            ']' => return matches!(chars.get(j + 1), Some((_, '('))),
            '[' => return false,
            _ => j += 1,
        }
    }
    false
}
