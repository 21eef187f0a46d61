//! # Drift Core
//!
//! Core types and text primitives for the Drift reference-resolution engine.
//!
//! This crate defines the shared data model (canonical entities, mentions,
//! candidates, chat messages) consumed by the engine crate, plus the two pure
//! text primitives everything else is built on:
//!
//! - **Normalization** — canonical-equality folding of surface forms
//!   ([`normalize::normalize`])
//! - **Fuzzy similarity** — blended Jaro-Winkler + trigram-cosine score used
//!   for near-duplicate surface merging ([`similarity::similarity`])
//!
//! No I/O happens here; everything is deterministic and side-effect free.

pub mod normalize;
pub mod similarity;
pub mod types;

pub use normalize::normalize;
pub use similarity::{similarity, trigram_cosine};
pub use types::{
    AuthorType, CanonicalEntity, ChatMessage, EntityCandidate, EntityId, EntityType, Mention,
};
