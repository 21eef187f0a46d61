//! Core data types for the Drift reference-resolution engine.
//!
//! Defines the entities, mentions, and message shapes shared between the
//! detector, resolver, index, and the host UI. Offsets are always byte
//! offsets into the *original* (undecorated) message text so the host can
//! highlight spans in the rendered source without re-deriving positions.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a canonical entity within one conversation index.
///
/// Sequential per index; never reused after rehydration.
pub type EntityId = u64;

/// Classification of a canonical entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// A person (authors, judges, named individuals).
    Person,
    /// A book identified as such (ISBN, explicit qualifiers).
    Book,
    /// A creative or scholarly work (titles, papers, essays).
    Work,
    /// An organization (companies, institutions, agencies).
    Org,
    /// A statute, code, or other legal text.
    Law,
    /// A legal case or docket reference.
    Case,
    /// A multi-word topic that is none of the above.
    Topic,
    /// Anything unclassified.
    Other,
}

impl EntityType {
    /// Priority order used when building a message's mention list.
    ///
    /// Covers every variant, so it orders rather than filters.
    pub const PRIORITY: [EntityType; 8] = [
        EntityType::Person,
        EntityType::Book,
        EntityType::Work,
        EntityType::Org,
        EntityType::Law,
        EntityType::Case,
        EntityType::Topic,
        EntityType::Other,
    ];
}

/// A canonical real-world referent inferred from conversation text.
///
/// Created once per distinct referent (as best determined). `alt_names`
/// grows over the conversation's lifetime as new surface variants are
/// observed (surnames, possessives, "Title by Author" pairings); entries are
/// never removed except via full index clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEntity {
    /// Unique entity identifier (sequential within one index).
    pub id: EntityId,
    /// Primary display name: the first surface form observed.
    pub name: String,
    /// Alternate surface forms, normalized-matched against candidates.
    /// Ordered set for deterministic serialization.
    pub alt_names: BTreeSet<String>,
    /// Entity classification. Matching is scoped to entities of equal type.
    pub entity_type: EntityType,
}

impl CanonicalEntity {
    /// Iterate the primary name followed by every alternate name.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.alt_names.iter().map(|s| s.as_str()))
    }
}

/// One textual occurrence of an entity in a specific message.
///
/// Immutable once created. `snippet` is a context excerpt captured at
/// indexing time; it does not update if the source message later changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    /// The canonical entity this occurrence resolved to.
    pub entity_id: EntityId,
    /// Identifier of the message containing the occurrence.
    pub message_id: String,
    /// The matched text after markdown stripping; the original slice at
    /// `start..end` may retain emphasis or link decoration around it.
    pub surface: String,
    /// Start byte offset into the original message text.
    pub start: usize,
    /// End byte offset (exclusive) into the original message text.
    pub end: usize,
    /// Indexing timestamp; the canonical ordering for prior-mention lookup.
    pub created_at: DateTime<Utc>,
    /// Fixed-radius context excerpt around the span.
    pub snippet: String,
}

/// An unresolved detected span, pending merge into a canonical entity.
///
/// Ephemeral: consumed immediately by the resolver, never persisted.
#[derive(Debug, Clone)]
pub struct EntityCandidate {
    /// The matched text after markdown stripping; see [`Mention::surface`].
    pub surface: String,
    /// Start byte offset into the original message text.
    pub start: usize,
    /// End byte offset (exclusive) into the original message text.
    pub end: usize,
    /// Type fixed by the matching pattern or inferred from the surface.
    pub entity_type: EntityType,
    /// Identifier of the message the candidate was detected in.
    pub message_id: String,
    /// Pattern confidence score in (0, 1].
    pub confidence: f32,
}

/// Role of a message author in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthorType {
    User,
    Assistant,
    System,
}

/// A chat message as supplied by the host UI for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Stable message identifier.
    pub id: String,
    /// Who produced the message.
    pub author: AuthorType,
    /// Creation time of the message.
    pub created_at: DateTime<Utc>,
    /// Raw markdown text of the message.
    pub text: String,
}
