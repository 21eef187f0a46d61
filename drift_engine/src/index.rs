//! Conversation-scoped entity index.
//!
//! Holds the canonical entities for one conversation plus every recorded
//! mention, addressable by entity and by message. The whole structure is
//! serializable and acts as the persistence unit for the cache store.
//!
//! All maps are `BTreeMap` so iteration, fuzzy-match scans, and serialized
//! output are deterministic across runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use drift_core::{CanonicalEntity, EntityId, EntityType, Mention};

/// Entity and mention registry for a single conversation.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ConversationEntityIndex {
    entities: BTreeMap<EntityId, CanonicalEntity>,
    mentions_by_entity: BTreeMap<EntityId, Vec<Mention>>,
    mentions_by_message: BTreeMap<String, Vec<Mention>>,
    next_entity_id: EntityId,
}

impl ConversationEntityIndex {
    // --- Entities ---

    /// Mint a new entity and return its id. Ids are sequential and never
    /// reused within a conversation.
    pub fn mint_entity(
        &mut self,
        name: &str,
        entity_type: EntityType,
        first_alt: String,
    ) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;

        let mut entity = CanonicalEntity {
            id,
            name: name.to_string(),
            alt_names: Default::default(),
            entity_type,
        };
        if first_alt != entity.name {
            entity.alt_names.insert(first_alt);
        }
        self.entities.insert(id, entity);
        id
    }

    pub fn entity(&self, id: EntityId) -> Option<&CanonicalEntity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut CanonicalEntity> {
        self.entities.get_mut(&id)
    }

    /// All entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = &CanonicalEntity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Register an alt name on an entity. Returns true if the name was new.
    pub fn add_alt_name(&mut self, id: EntityId, alt: &str) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) if entity.name != alt => entity.alt_names.insert(alt.to_string()),
            _ => false,
        }
    }

    // --- Mentions ---

    /// Record a mention under both the entity and message views. Per-message
    /// mentions stay sorted by span start, per-entity mentions by timestamp.
    pub fn add_mention(&mut self, mention: Mention) {
        let by_entity = self.mentions_by_entity.entry(mention.entity_id).or_default();
        let pos = by_entity
            .partition_point(|m| (m.created_at, m.start) <= (mention.created_at, mention.start));
        by_entity.insert(pos, mention.clone());

        let by_message = self
            .mentions_by_message
            .entry(mention.message_id.clone())
            .or_default();
        let pos = by_message.partition_point(|m| m.start <= mention.start);
        by_message.insert(pos, mention);
    }

    /// Whether a message has already been indexed (used as the idempotence
    /// gate; messages with zero detected entities are recorded with an empty
    /// mention list so reindexing still short-circuits).
    pub fn is_message_indexed(&self, message_id: &str) -> bool {
        self.mentions_by_message.contains_key(message_id)
    }

    /// Mark a message as indexed even when it produced no mentions.
    pub fn mark_message_indexed(&mut self, message_id: &str) {
        self.mentions_by_message
            .entry(message_id.to_string())
            .or_default();
    }

    /// Mentions within one message, sorted by span start.
    pub fn mentions_in_message(&self, message_id: &str) -> &[Mention] {
        self.mentions_by_message
            .get(message_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every mention of one entity, sorted by timestamp.
    pub fn mentions_of(&self, entity_id: EntityId) -> &[Mention] {
        self.mentions_by_entity
            .get(&entity_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn mention_count(&self) -> usize {
        self.mentions_by_entity.values().map(Vec::len).sum()
    }

    /// Earliest mention timestamp within a message, if the message holds any.
    fn message_timestamp(&self, message_id: &str) -> Option<DateTime<Utc>> {
        self.mentions_by_message
            .get(message_id)?
            .iter()
            .map(|m| m.created_at)
            .min()
    }

    /// Latest mention of an entity strictly before the given message.
    ///
    /// Ordering is timestamp-first: the reference point is the earliest
    /// mention timestamp of `current_message_id`, and the winner is the
    /// mention with the greatest timestamp below it. When the current message
    /// carries no mentions (or none with timestamps), the comparison falls
    /// back to lexicographic message-id order.
    pub fn latest_prior_mention(
        &self,
        entity_id: EntityId,
        current_message_id: &str,
    ) -> Option<&Mention> {
        let mentions = self.mentions_by_entity.get(&entity_id)?;

        if let Some(cutoff) = self.message_timestamp(current_message_id) {
            mentions
                .iter()
                .filter(|m| m.message_id != current_message_id && m.created_at < cutoff)
                .max_by_key(|m| (m.created_at, m.message_id.clone(), m.start))
        } else {
            mentions
                .iter()
                .filter(|m| m.message_id.as_str() < current_message_id)
                .max_by_key(|m| (m.created_at, m.message_id.clone(), m.start))
        }
    }

    /// Drop everything, keeping the id counter monotone.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.mentions_by_entity.clear();
        self.mentions_by_message.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn mention(entity_id: EntityId, message_id: &str, start: usize, secs: i64) -> Mention {
        Mention {
            entity_id,
            message_id: message_id.to_string(),
            surface: "Evans".to_string(),
            start,
            end: start + 5,
            created_at: ts(secs),
            snippet: "…Evans…".to_string(),
        }
    }

    #[test]
    fn test_mint_entity_sequential_ids() {
        let mut index = ConversationEntityIndex::default();
        let a = index.mint_entity("Evans", EntityType::Person, "Evans".to_string());
        let b = index.mint_entity("Shirer", EntityType::Person, "Shirer".to_string());
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn test_first_alt_equal_to_name_not_duplicated() {
        let mut index = ConversationEntityIndex::default();
        let id = index.mint_entity("Evans", EntityType::Person, "Evans".to_string());
        assert!(index.entity(id).unwrap().alt_names.is_empty());
    }

    #[test]
    fn test_mentions_sorted_per_view() {
        let mut index = ConversationEntityIndex::default();
        let id = index.mint_entity("Evans", EntityType::Person, "Evans".to_string());
        index.add_mention(mention(id, "m2", 40, 20));
        index.add_mention(mention(id, "m2", 10, 20));
        index.add_mention(mention(id, "m1", 5, 10));

        let in_m2: Vec<usize> = index.mentions_in_message("m2").iter().map(|m| m.start).collect();
        assert_eq!(in_m2, vec![10, 40]);

        let of_entity: Vec<&str> = index
            .mentions_of(id)
            .iter()
            .map(|m| m.message_id.as_str())
            .collect();
        assert_eq!(of_entity, vec!["m1", "m2", "m2"]);
    }

    #[test]
    fn test_latest_prior_mention_by_timestamp() {
        let mut index = ConversationEntityIndex::default();
        let id = index.mint_entity("Evans", EntityType::Person, "Evans".to_string());
        // Ids deliberately out of lexicographic order relative to time.
        index.add_mention(mention(id, "z-early", 0, 10));
        index.add_mention(mention(id, "a-late", 0, 30));
        index.add_mention(mention(id, "m-current", 0, 50));

        let prior = index.latest_prior_mention(id, "m-current").unwrap();
        assert_eq!(prior.message_id, "a-late");
    }

    #[test]
    fn test_latest_prior_mention_unindexed_current_falls_back_to_id_order() {
        let mut index = ConversationEntityIndex::default();
        let id = index.mint_entity("Evans", EntityType::Person, "Evans".to_string());
        index.add_mention(mention(id, "m1", 0, 10));
        index.add_mention(mention(id, "m3", 0, 30));

        let prior = index.latest_prior_mention(id, "m2").unwrap();
        assert_eq!(prior.message_id, "m1");
    }

    #[test]
    fn test_latest_prior_mention_none_when_first() {
        let mut index = ConversationEntityIndex::default();
        let id = index.mint_entity("Evans", EntityType::Person, "Evans".to_string());
        index.add_mention(mention(id, "m1", 0, 10));
        assert!(index.latest_prior_mention(id, "m1").is_none());
    }

    #[test]
    fn test_clear_keeps_id_counter() {
        let mut index = ConversationEntityIndex::default();
        index.mint_entity("Evans", EntityType::Person, "Evans".to_string());
        index.clear();
        let id = index.mint_entity("Shirer", EntityType::Person, "Shirer".to_string());
        assert_eq!(id, 1);
        assert_eq!(index.entity_count(), 1);
    }

    #[test]
    fn test_serde_round_trip_preserves_counter() {
        let mut index = ConversationEntityIndex::default();
        let id = index.mint_entity("Evans", EntityType::Person, "Evans".to_string());
        index.add_mention(mention(id, "m1", 0, 10));

        let json = serde_json::to_string(&index).unwrap();
        let mut restored: ConversationEntityIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.entity_count(), 1);
        assert_eq!(restored.mentions_of(id).len(), 1);
        let next = restored.mint_entity("Shirer", EntityType::Person, "Shirer".to_string());
        assert_eq!(next, 1);
    }
}
