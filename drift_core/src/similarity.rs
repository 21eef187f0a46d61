//! Blended fuzzy string similarity for canonical entity merging.
//!
//! Combines Jaro-Winkler (good at short names and transpositions) with a
//! character-trigram cosine (good at longer titles with shared vocabulary).
//! The blend weights favor Jaro-Winkler because most merge decisions happen
//! on short person names.

use std::collections::HashMap;

/// Jaro-Winkler weight in the blended score.
const JARO_WINKLER_WEIGHT: f64 = 0.6;
/// Trigram-cosine weight in the blended score.
const TRIGRAM_WEIGHT: f64 = 0.4;

/// Blended similarity score in `[0, 1]`.
///
/// `0.6 * jaro_winkler + 0.4 * trigram_cosine`. Equal non-empty inputs
/// short-circuit to `1.0`. Deterministic; no failure modes.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    JARO_WINKLER_WEIGHT * strsim::jaro_winkler(a, b) + TRIGRAM_WEIGHT * trigram_cosine(a, b)
}

/// Cosine similarity between the character-trigram frequency vectors of two
/// strings.
///
/// Each string is padded with one leading and one trailing space before the
/// trigrams are extracted, so word boundaries contribute grams. Returns `0.0`
/// when either gram set is empty (inputs shorter than one padded trigram).
pub fn trigram_cosine(a: &str, b: &str) -> f64 {
    let grams_a = trigram_counts(a);
    let grams_b = trigram_counts(b);
    if grams_a.is_empty() || grams_b.is_empty() {
        return 0.0;
    }

    let dot: f64 = grams_a
        .iter()
        .filter_map(|(gram, &count_a)| grams_b.get(gram).map(|&count_b| (count_a * count_b) as f64))
        .sum();

    let mag_a: f64 = grams_a.values().map(|&c| (c * c) as f64).sum::<f64>().sqrt();
    let mag_b: f64 = grams_b.values().map(|&c| (c * c) as f64).sum::<f64>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// Extract padded character trigrams with multiplicity.
fn trigram_counts(s: &str) -> HashMap<[char; 3], u32> {
    let padded: Vec<char> = std::iter::once(' ')
        .chain(s.chars())
        .chain(std::iter::once(' '))
        .collect();

    let mut counts = HashMap::new();
    for window in padded.windows(3) {
        let gram = [window[0], window[1], window[2]];
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}
