//! Dual-mode sync engine
//!
//! Keeps the local note store and the GitHub repository in step.
//!
//! ## Model
//!
//! The engine is a single-owner state machine. Every edit is saved locally
//! before anything else happens. In cloud mode the edited note is marked
//! pending and a debounce timer is (re)armed; when it fires, one note is
//! pushed. A push runs in two phases so that edits arriving while the
//! request is in flight are never lost:
//!
//! 1. [`SyncEngine::begin_push`] snapshots the note and enters `CloudSyncing`
//! 2. [`SyncEngine::complete_push`] applies the result, comparing the note
//!    against the snapshot
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = SyncEngine::open(connector, store, EngineOptions::from_config(&config))?;
//! engine.switch_to_cloud().await?;
//! engine.update_active_content("# Trip Plan\n\nPack bags")?;
//! engine.settle().await?;
//! ```

mod engine;
mod merge;
mod scheduler;
mod state;

use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;

pub use engine::{EngineOptions, PushJob, SyncEngine};
pub use merge::{merge_remote, MergeReport};
pub use scheduler::PushScheduler;
pub use state::{SyncEvent, SyncState};

/// Errors raised by the sync engine
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("A GitHub token is required for cloud mode. Log in first.")]
    CredentialRequired,

    #[error("Not connected to GitHub")]
    NotConnected,

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// Whether a new credential is needed to continue
    pub fn is_auth(&self) -> bool {
        match self {
            SyncError::CredentialRequired => true,
            SyncError::Remote(e) => e.is_auth(),
            _ => false,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
