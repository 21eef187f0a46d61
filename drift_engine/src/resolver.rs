//! Canonical entity resolution: merge candidates into existing entities or
//! mint new ones.
//!
//! Matching is scoped to entities of the same type, a deliberate precision
//! guard against cross-type merges (a person sharing a book's title must not
//! collapse into it). Resolution is greedy and order-dependent over a small
//! entity population, so the O(candidates × entities × names) scan is fine.

use tracing::debug;

use drift_core::{normalize, similarity, EntityCandidate, EntityId};

use crate::index::ConversationEntityIndex;

/// A candidate together with the entity it resolved to.
#[derive(Debug, Clone)]
pub struct ResolvedCandidate {
    pub candidate: EntityCandidate,
    pub entity_id: EntityId,
    /// Whether resolution minted a new entity (false = merged into existing).
    pub created: bool,
}

/// Resolve candidates against the index, inserting new entities eagerly.
///
/// Per candidate: exact normalized match against same-type names first, then
/// a fuzzy pass accepting the best blended similarity at or above
/// `fuzzy_threshold`, then a fresh entity.
pub fn resolve_candidates(
    index: &mut ConversationEntityIndex,
    candidates: Vec<EntityCandidate>,
    fuzzy_threshold: f64,
) -> Vec<ResolvedCandidate> {
    let mut resolved = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let normalized = normalize(&candidate.surface);
        if normalized.is_empty() {
            continue;
        }

        let entity_id = exact_match(index, &candidate, &normalized)
            .or_else(|| fuzzy_match(index, &candidate, fuzzy_threshold));

        match entity_id {
            Some(id) => resolved.push(ResolvedCandidate {
                candidate,
                entity_id: id,
                created: false,
            }),
            None => {
                let first_alt = strip_trailing_possessive(&candidate.surface).to_string();
                let id = index.mint_entity(&candidate.surface, candidate.entity_type, first_alt);
                debug!(
                    entity_id = id,
                    surface = %candidate.surface,
                    entity_type = ?candidate.entity_type,
                    "minted new entity"
                );
                resolved.push(ResolvedCandidate {
                    candidate,
                    entity_id: id,
                    created: true,
                });
            }
        }
    }

    resolved
}

/// Exact canonical match: normalized surface equals a normalized name or alt
/// name of a same-type entity. Entities are scanned in id order, so the
/// outcome is deterministic.
fn exact_match(
    index: &ConversationEntityIndex,
    candidate: &EntityCandidate,
    normalized: &str,
) -> Option<EntityId> {
    index
        .entities()
        .filter(|e| e.entity_type == candidate.entity_type)
        .find(|e| e.all_names().any(|name| normalize(name) == normalized))
        .map(|e| e.id)
}

/// Fuzzy fallback: best blended similarity across every name of every
/// same-type entity, accepted at or above the threshold.
fn fuzzy_match(
    index: &ConversationEntityIndex,
    candidate: &EntityCandidate,
    threshold: f64,
) -> Option<EntityId> {
    let surface = normalize(&candidate.surface);
    let mut best: Option<(EntityId, f64)> = None;

    for entity in index.entities() {
        if entity.entity_type != candidate.entity_type {
            continue;
        }
        for name in entity.all_names() {
            let score = similarity(&surface, &normalize(name));
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((entity.id, score));
            }
        }
    }

    match best {
        Some((id, score)) if score >= threshold => Some(id),
        _ => None,
    }
}

/// Strip a trailing possessive `'s` / `’s` from a surface form.
pub(crate) fn strip_trailing_possessive(surface: &str) -> &str {
    surface
        .strip_suffix("'s")
        .or_else(|| surface.strip_suffix("’s"))
        .unwrap_or(surface)
}
