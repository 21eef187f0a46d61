//! Cache persistence for conversation entity indexes.
//!
//! The store holds one serialized `ConversationEntityIndex` per conversation.
//! The filesystem implementation writes a JSON file per conversation under a
//! cache directory; the in-memory implementation backs tests and
//! cache-disabled runs. List records are session-scoped and never persisted;
//! the index is the whole blob. Load failures are recoverable by design: a
//! corrupt or missing blob yields `None` and the caller starts from an empty
//! index.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::index::ConversationEntityIndex;

/// Persistence seam for conversation entity indexes.
pub trait CacheStore: Send {
    /// Load an index, `None` when absent. Corrupt data is treated as absent
    /// after a warning, never as an error.
    fn load(&self, conversation_id: &str) -> Option<ConversationEntityIndex>;

    fn save(&mut self, conversation_id: &str, index: &ConversationEntityIndex) -> Result<()>;

    fn clear(&mut self, conversation_id: &str) -> Result<()>;
}

// --- Filesystem store ---

/// One JSON file per conversation under `dir`.
pub struct FsCacheStore {
    dir: PathBuf,
}

impl FsCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Conversation ids come from the host application and may contain path
    /// separators; everything outside a safe set becomes an underscore.
    fn path_for(&self, conversation_id: &str) -> PathBuf {
        let sanitized: String = conversation_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{sanitized}.json"))
    }
}

impl CacheStore for FsCacheStore {
    fn load(&self, conversation_id: &str) -> Option<ConversationEntityIndex> {
        let path = self.path_for(conversation_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cache file");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(index) => {
                debug!(path = %path.display(), "loaded conversation index");
                Some(index)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache file, starting fresh");
                None
            }
        }
    }

    fn save(&mut self, conversation_id: &str, index: &ConversationEntityIndex) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating cache dir {}", self.dir.display()))?;
        let path = self.path_for(conversation_id);
        let json = serde_json::to_string(index).context("serializing conversation index")?;
        // Write to a sibling temp file then rename so readers never observe
        // a half-written blob.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("renaming into {}", path.display()))?;
        debug!(path = %path.display(), "saved conversation index");
        Ok(())
    }

    fn clear(&mut self, conversation_id: &str) -> Result<()> {
        let path = self.path_for(conversation_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}

// --- In-memory store ---

/// Index store backed by a map, for tests and cache-disabled runs.
#[derive(Default)]
pub struct MemoryCacheStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, conversation_id: &str) -> Option<ConversationEntityIndex> {
        let blobs = self.blobs.lock().ok()?;
        let raw = blobs.get(conversation_id)?;
        match serde_json::from_str(raw) {
            Ok(index) => Some(index),
            Err(e) => {
                warn!(conversation_id, error = %e, "corrupt in-memory blob");
                None
            }
        }
    }

    fn save(&mut self, conversation_id: &str, index: &ConversationEntityIndex) -> Result<()> {
        let json = serde_json::to_string(index).context("serializing conversation index")?;
        self.blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("blob lock poisoned"))?
            .insert(conversation_id.to_string(), json);
        Ok(())
    }

    fn clear(&mut self, conversation_id: &str) -> Result<()> {
        self.blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("blob lock poisoned"))?
            .remove(conversation_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::EntityType;

    fn index_with_entity() -> ConversationEntityIndex {
        let mut index = ConversationEntityIndex::default();
        index.mint_entity("Evans", EntityType::Person, "Evans".to_string());
        index
    }

    #[test]
    fn test_fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsCacheStore::new(dir.path());
        store.save("conv-1", &index_with_entity()).unwrap();

        let loaded = store.load("conv-1").unwrap();
        assert_eq!(loaded.entity_count(), 1);
    }

    #[test]
    fn test_fs_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::new(dir.path());
        assert!(store.load("nope").is_none());
    }

    #[test]
    fn test_fs_corrupt_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsCacheStore::new(dir.path());
        store.save("conv-1", &index_with_entity()).unwrap();
        std::fs::write(dir.path().join("conv-1.json"), "{not json").unwrap();
        assert!(store.load("conv-1").is_none());
    }

    #[test]
    fn test_fs_clear_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsCacheStore::new(dir.path());
        store.save("conv-1", &index_with_entity()).unwrap();
        store.clear("conv-1").unwrap();
        store.clear("conv-1").unwrap();
        assert!(store.load("conv-1").is_none());
    }

    #[test]
    fn test_fs_sanitizes_conversation_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsCacheStore::new(dir.path());
        store.save("a/b:c", &index_with_entity()).unwrap();
        assert!(dir.path().join("a_b_c.json").exists());
        assert!(store.load("a/b:c").is_some());
    }

    #[test]
    fn test_memory_round_trip_and_clear() {
        let mut store = MemoryCacheStore::new();
        store.save("conv-1", &index_with_entity()).unwrap();
        assert_eq!(store.load("conv-1").unwrap().entity_count(), 1);
        store.clear("conv-1").unwrap();
        assert!(store.load("conv-1").is_none());
    }
}
