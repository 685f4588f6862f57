//! Remote note store
//!
//! The cloud backend is a private GitHub repository used as a blob store
//! keyed by file path. Each note is one Markdown file; the blob SHA is the
//! note's version token.
//!
//! ## Sessions
//!
//! A [`RemoteConnector`] validates a credential and provisions the
//! repository, returning a configured [`RemoteStore`] session. There is no
//! way to obtain an unconfigured session, so listing or writing before
//! initialization cannot be expressed.
//!
//! ```ignore
//! let connector = GitHubConnector::from_config(&config);
//! let session = connector.connect(&token).await?;
//! let notes = session.list_notes().await?;
//! ```

pub mod codec;
mod error;
mod github;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Note;

pub use error::{RemoteError, RemoteResult};
pub use github::{GitHubConnector, GitHubSession};

/// Identity of a note after a successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedNote {
    /// New version token
    pub version: String,
    /// Stable location of the blob
    pub path: String,
}

/// Identifier of a private paste created for direct sharing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasteId(pub String);

impl std::fmt::Display for PasteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operations of a configured remote session
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All notes in the store, newest path first
    async fn list_notes(&self) -> RemoteResult<Vec<Note>>;

    /// Create (no `version`) or update a note
    ///
    /// A missing `path` is derived from the title. Version conflicts are
    /// recovered internally with one refetch-and-retry.
    async fn save_note(
        &self,
        version: Option<&str>,
        path: Option<&str>,
        title: &str,
        content: &str,
    ) -> RemoteResult<SavedNote>;

    /// Delete the blob at `path`, which must currently be at `version`
    async fn delete_note(&self, path: &str, version: &str) -> RemoteResult<()>;

    /// Upload already-encrypted content as a private paste
    async fn create_shared_paste(&self, content: &str) -> RemoteResult<PasteId>;
}

/// Turns a credential into a configured session
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    type Session: RemoteStore;

    async fn connect(&self, credential: &str) -> RemoteResult<Self::Session>;
}
