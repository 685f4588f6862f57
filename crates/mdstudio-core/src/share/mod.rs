//! Note sharing
//!
//! Three ways to hand a note to someone else:
//!
//! - **tokens**: expiring random tokens that point at a cloud note
//!   (`{share_base_url}?shared={token}`). Cloud mode only.
//! - **link**: the whole note embedded in the URL fragment. Only produced
//!   when explicitly asked for; never a fallback for token sharing.
//! - **direct**: the note encrypted client-side and uploaded as a private
//!   paste; the key travels in the link fragment.

pub mod direct;
pub mod link;
pub mod tokens;

use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;

pub use direct::{open, seal, DirectShare, SealedNote};
pub use link::{decode_fragment, encode_fragment, fragment_link};
pub use tokens::{find_shared, share_url, ShareRef, ShareToken, ShareTokenService, SHARE_TTL_HOURS};

/// Errors raised while sharing or opening shared notes
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("This feature is available only in GitHub Mode. Please login to enable sharing.")]
    LocalMode,

    #[error("This note has not been saved to GitHub yet. Sync it before sharing.")]
    MissingPath,

    #[error("Not connected to GitHub")]
    NotConnected,

    #[error("Invalid share link: {0}")]
    BrokenLink(String),

    #[error("This share link is invalid or has expired.")]
    NotFound,

    #[error("Encryption failed: {0}")]
    Crypto(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub type ShareResult<T> = Result<T, ShareError>;
