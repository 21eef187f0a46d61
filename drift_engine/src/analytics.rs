//! Optional instrumentation for reference activity.
//!
//! The engine emits structured events for hover, open, jump, and list
//! resolution; a host can install an [`AnalyticsHook`] to ship them wherever
//! it likes. The default [`TracingAnalytics`] just mirrors them onto the
//! tracing subscriber at debug level.

use tracing::debug;

use drift_core::EntityId;

/// A reference-activity event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceEvent {
    LinkHovered {
        entity_id: EntityId,
        message_id: String,
    },
    LinkOpened {
        entity_id: EntityId,
        message_id: String,
    },
    JumpPerformed {
        entity_id: EntityId,
        from_message_id: String,
        to_message_id: String,
    },
    ListResolved {
        message_id: String,
        anchor_id: String,
    },
}

/// Sink for reference events.
pub trait AnalyticsHook: Send {
    fn record(&self, event: &ReferenceEvent);
}

/// Hook that logs every event through `tracing` at debug level.
#[derive(Debug, Default)]
pub struct TracingAnalytics;

impl AnalyticsHook for TracingAnalytics {
    fn record(&self, event: &ReferenceEvent) {
        match event {
            ReferenceEvent::LinkHovered { entity_id, message_id } => {
                debug!(entity_id, message_id, "reference link hovered");
            }
            ReferenceEvent::LinkOpened { entity_id, message_id } => {
                debug!(entity_id, message_id, "reference link opened");
            }
            ReferenceEvent::JumpPerformed {
                entity_id,
                from_message_id,
                to_message_id,
            } => {
                debug!(entity_id, from_message_id, to_message_id, "prior-mention jump");
            }
            ReferenceEvent::ListResolved { message_id, anchor_id } => {
                debug!(message_id, anchor_id, "list reference resolved");
            }
        }
    }
}
