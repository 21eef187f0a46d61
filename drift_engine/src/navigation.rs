//! Per-entity navigation stacks for prior-mention jumps.
//!
//! Each entity the user navigates through carries its own back/forward
//! history of message ids, plus the origin message the chain started from.
//! The engine owns the state; delivery of the actual scroll/focus action is
//! delegated to a [`NavigationObserver`] supplied by the host.

use tracing::debug;

use drift_core::EntityId;

use crate::index::ConversationEntityIndex;

/// Host-side sink for navigation requests. The engine decides where to go;
/// the observer performs the scroll (and optional anchor focus).
pub trait NavigationObserver: Send {
    fn navigation_requested(&self, target_message_id: &str, anchor_id: Option<&str>);
}

/// Back/forward history for one entity's jump chain.
#[derive(Debug, Default, Clone)]
pub struct EntityNavigationState {
    /// Message the first jump departed from; restored when the forward stack
    /// unwinds past its last element.
    pub origin_message_id: Option<String>,
    pub back_stack: Vec<String>,
    pub forward_stack: Vec<String>,
}

impl EntityNavigationState {
    pub fn is_empty(&self) -> bool {
        self.origin_message_id.is_none()
            && self.back_stack.is_empty()
            && self.forward_stack.is_empty()
    }
}

/// Outcome of a navigation operation: where to go, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavTarget {
    Message(String),
    None,
}

/// Jump from `current_message_id` to the latest prior mention of the entity.
///
/// A successful jump pushes the departure point onto the back stack and
/// clears the forward stack, the same truncate-on-branch rule a browser
/// history uses. Returns the target message id, or `NavTarget::None` when no
/// prior mention exists (state is left untouched in that case).
pub fn jump_to_prior(
    state: &mut EntityNavigationState,
    index: &ConversationEntityIndex,
    entity_id: EntityId,
    current_message_id: &str,
) -> NavTarget {
    let Some(prior) = index.latest_prior_mention(entity_id, current_message_id) else {
        debug!(entity_id, current_message_id, "no prior mention to jump to");
        return NavTarget::None;
    };
    let target = prior.message_id.clone();

    if state.origin_message_id.is_none() {
        state.origin_message_id = Some(current_message_id.to_string());
    }
    state.back_stack.push(current_message_id.to_string());
    state.forward_stack.clear();

    debug!(entity_id, from = current_message_id, to = %target, "jump to prior mention");
    NavTarget::Message(target)
}

/// Pop the back stack, pushing the departure point forward.
pub fn jump_back(state: &mut EntityNavigationState, current_message_id: &str) -> NavTarget {
    let Some(target) = state.back_stack.pop() else {
        return NavTarget::None;
    };
    state.forward_stack.push(current_message_id.to_string());
    NavTarget::Message(target)
}

/// Pop the forward stack, pushing the departure point back. When the forward
/// stack is empty but an origin exists, returns to the origin and resets.
pub fn jump_forward(state: &mut EntityNavigationState, current_message_id: &str) -> NavTarget {
    if let Some(target) = state.forward_stack.pop() {
        state.back_stack.push(current_message_id.to_string());
        return NavTarget::Message(target);
    }
    if let Some(origin) = state.origin_message_id.take() {
        if origin != current_message_id {
            *state = EntityNavigationState::default();
            return NavTarget::Message(origin);
        }
        state.origin_message_id = Some(origin);
    }
    NavTarget::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use drift_core::{EntityType, Mention};

    fn index_with_mentions(ids_and_secs: &[(&str, i64)]) -> (ConversationEntityIndex, EntityId) {
        let mut index = ConversationEntityIndex::default();
        let entity = index.mint_entity("Evans", EntityType::Person, "Evans".to_string());
        for (message_id, secs) in ids_and_secs {
            index.add_mention(Mention {
                entity_id: entity,
                message_id: message_id.to_string(),
                surface: "Evans".to_string(),
                start: 0,
                end: 5,
                created_at: Utc.timestamp_opt(*secs, 0).unwrap(),
                snippet: "Evans".to_string(),
            });
        }
        (index, entity)
    }

    #[test]
    fn test_jump_chain_and_back() {
        let (index, entity) = index_with_mentions(&[("m1", 10), ("m2", 20), ("m3", 30)]);
        let mut state = EntityNavigationState::default();

        assert_eq!(
            jump_to_prior(&mut state, &index, entity, "m3"),
            NavTarget::Message("m2".to_string())
        );
        assert_eq!(
            jump_to_prior(&mut state, &index, entity, "m2"),
            NavTarget::Message("m1".to_string())
        );
        assert_eq!(state.back_stack, vec!["m3", "m2"]);

        assert_eq!(jump_back(&mut state, "m1"), NavTarget::Message("m2".to_string()));
        assert_eq!(jump_back(&mut state, "m2"), NavTarget::Message("m3".to_string()));
        assert_eq!(jump_back(&mut state, "m3"), NavTarget::None);
        assert_eq!(state.forward_stack, vec!["m1", "m2"]);
    }

    #[test]
    fn test_forward_replays_then_returns_to_origin() {
        let (index, entity) = index_with_mentions(&[("m1", 10), ("m2", 20)]);
        let mut state = EntityNavigationState::default();

        jump_to_prior(&mut state, &index, entity, "m2");
        jump_back(&mut state, "m1");
        // Forward stack now holds the jump target again.
        assert_eq!(jump_forward(&mut state, "m2"), NavTarget::Message("m1".to_string()));
        // Nothing forward, but an origin remains.
        assert_eq!(jump_forward(&mut state, "m1"), NavTarget::Message("m2".to_string()));
        assert!(state.is_empty());
    }

    #[test]
    fn test_new_jump_truncates_forward_stack() {
        let (index, entity) = index_with_mentions(&[("m1", 10), ("m2", 20), ("m3", 30)]);
        let mut state = EntityNavigationState::default();

        jump_to_prior(&mut state, &index, entity, "m3");
        jump_back(&mut state, "m2");
        assert!(!state.forward_stack.is_empty());

        jump_to_prior(&mut state, &index, entity, "m3");
        assert!(state.forward_stack.is_empty());
    }

    #[test]
    fn test_jump_without_prior_leaves_state_untouched() {
        let (index, entity) = index_with_mentions(&[("m1", 10)]);
        let mut state = EntityNavigationState::default();
        assert_eq!(jump_to_prior(&mut state, &index, entity, "m1"), NavTarget::None);
        assert!(state.is_empty());
    }
}
