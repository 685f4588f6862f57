//! Key/value persistence
//!
//! A small durable key/value store: one file per key inside a directory.
//! Uses atomic writes (write to temp file, then rename) so a key is never
//! left half-written; a reader sees either the old or the new value.
//!
//! Storage location: `~/.local/share/mdstudio/store/` (configurable via `Config`)

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{StorageError, StorageResult};

/// File-backed key/value store
///
/// Cheap to clone; clones share the same directory.
#[derive(Debug, Clone)]
pub struct KeyValueStore {
    dir: PathBuf,
}

impl KeyValueStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDirectory {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the raw value of a key
    pub fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.key_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::ReadError { path, source }),
        }
    }

    /// Write the raw value of a key; returns once the value is on disk
    pub fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.key_path(key)?;
        atomic_write(&path, value.as_bytes())
    }

    /// Remove a key; missing keys are not an error
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from_io(e, path)),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.key_path(key).map(|p| p.exists()).unwrap_or(false)
    }

    /// Read and deserialize a JSON value
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(raw) = self.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::InvalidFormat {
                key: key.to_string(),
                details: e.to_string(),
            })
    }

    /// Serialize and write a JSON value
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.set(key, &raw)
    }

    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    // Sync to disk before rename
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_set_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyValueStore::open(temp_dir.path()).unwrap();

        assert!(store.get("greeting").unwrap().is_none());
        assert!(!store.contains("greeting"));

        store.set("greeting", "hello 🖤").unwrap();
        assert_eq!(store.get("greeting").unwrap().as_deref(), Some("hello 🖤"));
        assert!(store.contains("greeting"));

        store.set("greeting", "bye").unwrap();
        assert_eq!(store.get("greeting").unwrap().as_deref(), Some("bye"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyValueStore::open(temp_dir.path()).unwrap();

        store.set("k", "v").unwrap();
        store.remove("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
        store.remove("k").unwrap();
    }

    #[test]
    fn test_json_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyValueStore::open(temp_dir.path()).unwrap();

        let value = Sample {
            name: "notes".to_string(),
            count: 3,
        };
        store.set_json("sample", &value).unwrap();
        let loaded: Sample = store.get_json("sample").unwrap().unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn test_corrupt_json_is_invalid_format() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyValueStore::open(temp_dir.path()).unwrap();

        store.set("sample", "{not json").unwrap();
        let err = store.get_json::<Sample>("sample").unwrap_err();
        assert!(matches!(err, StorageError::InvalidFormat { ref key, .. } if key == "sample"));
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyValueStore::open(temp_dir.path()).unwrap();

        assert!(matches!(
            store.set("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(store.get(""), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_open_creates_nested_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");

        let store = KeyValueStore::open(&nested).unwrap();
        store.set("k", "v").unwrap();
        assert!(nested.join("k.json").exists());
        // No temp file left behind
        assert!(!nested.join("k.tmp").exists());
    }

    #[test]
    fn test_clones_share_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyValueStore::open(temp_dir.path()).unwrap();
        let other = store.clone();

        store.set("shared", "1").unwrap();
        assert_eq!(other.get("shared").unwrap().as_deref(), Some("1"));
    }
}
