//! Text-reference resolution engine for conversation transcripts.
//!
//! The pipeline runs per message:
//! 1. [`detector`] strips markdown and runs the regex cascade to find
//!    entity candidates with spans into the original text.
//! 2. [`resolver`] merges candidates into canonical entities, exact
//!    normalized match first and fuzzy similarity second.
//! 3. [`index`] records mentions by entity and by message, and answers
//!    latest-prior-mention queries.
//! 4. [`lists`] extracts markdown list items and resolves later surface
//!    or ordinal references back to them.
//! 5. [`store`] persists the conversation entity index as JSON; list
//!    records stay session-scoped.
//!
//! [`ReferenceEngine`] ties these together with navigation stacks,
//! analytics hooks, and periodic cache flushing.

pub mod analytics;
pub mod detector;
pub mod engine;
pub mod index;
pub mod lists;
pub mod markdown;
pub mod navigation;
pub mod resolver;
pub mod store;

pub use analytics::{AnalyticsHook, ReferenceEvent, TracingAnalytics};
pub use detector::EntityDetector;
pub use engine::{IndexMetrics, ReferenceEngine};
pub use index::ConversationEntityIndex;
pub use lists::{ListIndex, ListItem, ListRecord, ListReference};
pub use markdown::{strip_markdown, StrippedText};
pub use navigation::{EntityNavigationState, NavTarget, NavigationObserver};
pub use resolver::{resolve_candidates, ResolvedCandidate};
pub use store::{CacheStore, FsCacheStore, MemoryCacheStore};
