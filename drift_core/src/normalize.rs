//! Canonical-equality normalization for entity surface forms.
//!
//! Used only for comparison — stored `name`/`surface` values are never
//! mutated. The folding is intentionally aggressive: two surfaces that
//! normalize equal are treated as the same canonical string.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a surface form for equality comparison.
///
/// Performs, in order:
/// - lowercasing
/// - Unicode canonical decomposition (NFD) with combining marks dropped,
///   which strips diacritics (`café` → `cafe`)
/// - possessive `'s` / `’s` suffix removal per token
/// - removal of every character outside letters, digits, whitespace,
///   `'.'` and `'-'`
/// - whitespace-run collapsing and trimming
///
/// Pure function; degenerate input yields `""`.
///
/// # Examples
///
/// ```
/// use drift_core::normalize;
///
/// assert_eq!(normalize("  Evans's  "), "evans");
/// assert_eq!(normalize("Café Müller"), "cafe muller");
/// assert_eq!(normalize("Richard J. Evans"), "richard j. evans");
/// ```
pub fn normalize(s: &str) -> String {
    let folded: String = s
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let stripped = strip_possessives(&folded);

    let filtered: String = stripped
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                ' '
            }
        })
        .collect();

    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove `'s` / `’s` where it terminates a token.
///
/// Operates on already-lowercased text, so only the lowercase `s` is checked.
fn strip_possessives(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if (c == '\'' || c == '\u{2019}')
            && chars.get(i + 1) == Some(&'s')
            && chars.get(i + 2).map_or(true, |n| !n.is_alphanumeric())
        {
            i += 2;
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_trims() {
        assert_eq!(normalize("  The Third Reich  "), "the third reich");
    }

    #[test]
    fn test_strips_diacritics() {
        assert_eq!(normalize("Café"), "cafe");
        assert_eq!(normalize("Müller"), "muller");
        assert_eq!(normalize("Ñoño"), "nono");
    }

    #[test]
    fn test_strips_possessives() {
        assert_eq!(normalize("Evans's"), "evans");
        assert_eq!(normalize("Evans’s book"), "evans book");
        // Non-possessive apostrophes just drop out via the charset filter.
        assert_eq!(normalize("O'Brien"), "o brien");
    }

    #[test]
    fn test_possessive_only_at_token_end() {
        // "'sk" is not a possessive; the apostrophe falls to the charset filter.
        assert_eq!(normalize("d'Artagnan'ski"), "d artagnan ski");
    }

    #[test]
    fn test_keeps_dots_and_hyphens() {
        assert_eq!(normalize("Richard J. Evans"), "richard j. evans");
        assert_eq!(normalize("case 12345-67"), "case 12345-67");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize("a \t b\n\nc"), "a b c");
    }

    #[test]
    fn test_degenerate_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("!?#"), "");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize("Shirer's \"Rise and Fall\"");
        assert_eq!(normalize(&once), once);
    }
}
