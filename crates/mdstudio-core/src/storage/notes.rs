//! Mode-namespaced note persistence
//!
//! Local notes and the cloud-mode cache live under different keys so that
//! one can never be read as the other. Saves are synchronous: when `save`
//! returns, a restart will see the edit.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::StorageResult;
use super::persistence::KeyValueStore;
use crate::models::{Mode, NoteCollection, NoteRef};

/// Notes of local mode
pub const LOCAL_NOTES_KEY: &str = "md_studio_notes";
/// Cached copy of the cloud notes
pub const CLOUD_CACHE_KEY: &str = "md_studio_github_cache";
/// GitHub personal access token
pub const CREDENTIAL_KEY: &str = "md_github_token";
/// Selected mode
pub const MODE_KEY: &str = "md_studio_mode";
/// Share token map
pub const SHARE_TOKENS_KEY: &str = "md_studio_share_tokens";

/// Storage key holding the note collection of a mode
pub fn notes_key(mode: Mode) -> &'static str {
    match mode {
        Mode::Local => LOCAL_NOTES_KEY,
        Mode::Cloud => CLOUD_CACHE_KEY,
    }
}

/// A persisted collection plus the notes still waiting for a cloud push
#[derive(Debug, Clone, Deserialize)]
pub struct StoredNotes {
    #[serde(flatten)]
    pub collection: NoteCollection,
    #[serde(default)]
    pub pending: Vec<NoteRef>,
}

#[derive(Serialize)]
struct StoredNotesView<'a> {
    #[serde(flatten)]
    collection: &'a NoteCollection,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pending: &'a [NoteRef],
}

/// Note, mode and credential persistence on top of the key/value store
#[derive(Debug, Clone)]
pub struct LocalNoteStore {
    kv: KeyValueStore,
}

impl LocalNoteStore {
    pub fn new(kv: KeyValueStore) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &KeyValueStore {
        &self.kv
    }

    /// Persist the collection of `mode`
    pub fn save(
        &self,
        mode: Mode,
        collection: &NoteCollection,
        pending: &[NoteRef],
    ) -> StorageResult<()> {
        let view = StoredNotesView {
            collection,
            pending,
        };
        self.kv.set_json(notes_key(mode), &view)
    }

    /// Load the collection of `mode`
    ///
    /// `Ok(None)` when nothing was stored yet. A stored collection with a
    /// dangling active pointer or no notes is repaired on load.
    pub fn load(&self, mode: Mode) -> StorageResult<Option<StoredNotes>> {
        let stored: Option<StoredNotes> = self.kv.get_json(notes_key(mode))?;
        Ok(stored.map(|s| StoredNotes {
            collection: s.collection.repaired(),
            pending: s.pending,
        }))
    }

    pub fn has_notes(&self, mode: Mode) -> bool {
        self.kv.contains(notes_key(mode))
    }

    /// Stored mode; unknown values read as local
    pub fn load_mode(&self) -> StorageResult<Mode> {
        let Some(raw) = self.kv.get(MODE_KEY)? else {
            return Ok(Mode::Local);
        };
        Ok(raw.parse().unwrap_or_else(|e| {
            warn!("Ignoring stored mode: {}", e);
            Mode::Local
        }))
    }

    pub fn save_mode(&self, mode: Mode) -> StorageResult<()> {
        self.kv.set(MODE_KEY, mode.as_str())
    }

    pub fn credential(&self) -> StorageResult<Option<String>> {
        Ok(self
            .kv
            .get(CREDENTIAL_KEY)?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }

    pub fn save_credential(&self, credential: &str) -> StorageResult<()> {
        self.kv.set(CREDENTIAL_KEY, credential.trim())
    }

    pub fn clear_credential(&self) -> StorageResult<()> {
        self.kv.remove(CREDENTIAL_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Note;
    use crate::storage::StorageError;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> LocalNoteStore {
        LocalNoteStore::new(KeyValueStore::open(temp_dir.path()).unwrap())
    }

    #[test]
    fn test_keys_are_namespaced_by_mode() {
        assert_ne!(notes_key(Mode::Local), notes_key(Mode::Cloud));
        assert_eq!(notes_key(Mode::Local), LOCAL_NOTES_KEY);
        assert_eq!(notes_key(Mode::Cloud), CLOUD_CACHE_KEY);
    }

    #[test]
    fn test_save_and_load_per_mode() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let local = NoteCollection::single(Note::new("# Local only"));
        store.save(Mode::Local, &local, &[]).unwrap();

        assert!(store.load(Mode::Cloud).unwrap().is_none());
        let loaded = store.load(Mode::Local).unwrap().unwrap();
        assert_eq!(loaded.collection, local);
        assert!(loaded.pending.is_empty());

        let cloud = NoteCollection::single(Note::new("# Cloud copy"));
        let pending = vec![NoteRef::Id(cloud.active_id().to_string())];
        store.save(Mode::Cloud, &cloud, &pending).unwrap();

        let loaded = store.load(Mode::Cloud).unwrap().unwrap();
        assert_eq!(loaded.collection.active().title, "Cloud copy");
        assert_eq!(loaded.pending, pending);
        // Local entry untouched
        assert_eq!(
            store.load(Mode::Local).unwrap().unwrap().collection.active().title,
            "Local only"
        );
    }

    #[test]
    fn test_load_accepts_legacy_shape_without_pending() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let raw = r##"{"notes":[{"id":"1700000000000","title":"Hi","content":"# Hi"}],"activeNoteId":"1700000000000"}"##;
        store.kv().set(LOCAL_NOTES_KEY, raw).unwrap();

        let loaded = store.load(Mode::Local).unwrap().unwrap();
        assert_eq!(loaded.collection.active_id(), "1700000000000");
        assert!(loaded.pending.is_empty());
    }

    #[test]
    fn test_load_corrupt_entry_errors() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        store.kv().set(CLOUD_CACHE_KEY, "][").unwrap();
        let err = store.load(Mode::Cloud).unwrap_err();
        assert!(matches!(err, StorageError::InvalidFormat { .. }));
    }

    #[test]
    fn test_mode_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        assert_eq!(store.load_mode().unwrap(), Mode::Local);
        store.save_mode(Mode::Cloud).unwrap();
        assert_eq!(store.load_mode().unwrap(), Mode::Cloud);

        store.kv().set(MODE_KEY, "carrier-pigeon").unwrap();
        assert_eq!(store.load_mode().unwrap(), Mode::Local);
    }

    #[test]
    fn test_credential_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        assert!(store.credential().unwrap().is_none());
        store.save_credential("  ghp_secret \n").unwrap();
        assert_eq!(store.credential().unwrap().as_deref(), Some("ghp_secret"));
        store.clear_credential().unwrap();
        assert!(store.credential().unwrap().is_none());
    }
}
