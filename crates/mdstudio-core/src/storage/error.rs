//! Storage errors

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the key/value store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied on '{path}'")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No space left while writing '{path}'")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Stored value is not valid JSON for the expected shape
    #[error("Invalid data stored under '{key}': {details}")]
    InvalidFormat { key: String, details: String },

    /// Key would escape the store directory or is empty
    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("Failed to serialize value for '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The temp file was written but could not replace the target
    #[error("Could not move '{from}' into place at '{to}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Classify a failed write on `path`
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        if error.kind() == io::ErrorKind::PermissionDenied {
            return StorageError::PermissionDenied {
                path,
                source: error,
            };
        }
        if out_of_space(&error) {
            return StorageError::DiskFull {
                path,
                source: error,
            };
        }
        StorageError::WriteError {
            path,
            source: error,
        }
    }

    /// What the user can do about it, when there is something to do
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => Some("Free up disk space and try again."),
            StorageError::PermissionDenied { .. } | StorageError::CreateDirectory { .. } => {
                Some("Check that the data directory is writable, or point data_dir elsewhere.")
            }
            StorageError::InvalidFormat { .. } => {
                Some("The unreadable entry is replaced the next time notes are saved.")
            }
            _ => None,
        }
    }
}

fn out_of_space(error: &io::Error) -> bool {
    // ENOSPC
    if matches!(error.raw_os_error(), Some(28) if cfg!(unix)) {
        return true;
    }
    let msg = error.to_string().to_lowercase();
    ["no space left", "disk full", "not enough space", "quota exceeded"]
        .iter()
        .any(|needle| msg.contains(needle))
}

pub type StorageResult<T> = Result<T, StorageError>;
