//! Remote store errors
//!
//! Every failure of a remote call is converted to a [`RemoteError`] at the
//! adapter boundary. Callers branch on the category helpers rather than on
//! individual variants.

use thiserror::Error;

/// Errors raised by the remote note store
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Credential rejected by the identity endpoint
    #[error("GitHub rejected the token. Check that it is valid and not expired.")]
    Unauthorized,

    /// Credential lacks a required permission
    #[error("GitHub token is missing permissions: {0}. Ensure the 'repo' scope is granted.")]
    Forbidden(String),

    /// Version precondition failed on write
    ///
    /// Only ever seen inside the adapter's write path; `save_note` recovers
    /// from it or reports `WriteFailed`.
    #[error("Version conflict writing '{path}'")]
    Conflict { path: String },

    /// A write still failed after conflict recovery
    #[error("Failed to save '{path}': {reason}")]
    WriteFailed { path: String, reason: String },

    /// Requested blob does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Notes repository could not be created or accessed
    #[error("Repository setup failed: {0}")]
    Provisioning(String),

    /// Unexpected HTTP status
    #[error("GitHub request '{context}' failed with status {status}")]
    Status { status: u16, context: String },

    /// Transport-level failure
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Credential problems: prompt for a new token, never retry
    pub fn is_auth(&self) -> bool {
        matches!(self, RemoteError::Unauthorized | RemoteError::Forbidden(_))
    }

    /// Failures worth retrying later
    pub fn is_transient(&self) -> bool {
        !self.is_auth()
    }
}

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;
