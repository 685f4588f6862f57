//! Markdown Studio Core Library
//!
//! Note storage and GitHub sync for Markdown Studio, a Markdown note editor
//! that keeps notes either on this machine or in a private GitHub repository.
//!
//! # Architecture
//!
//! - **Local first**: every edit is written to the local store before any
//!   network traffic. In cloud mode the local store holds a cached copy of
//!   the remote notes.
//! - **GitHub as a blob store**: one Markdown file per note; the blob SHA is
//!   the note's version and drives optimistic conflict retries.
//! - **Debounced pushes**: edits are coalesced and pushed one note at a time.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let store = LocalNoteStore::new(KeyValueStore::open(config.store_dir())?);
//! let connector = GitHubConnector::from_config(&config);
//! let mut engine = SyncEngine::open(connector, store, EngineOptions::from_config(&config))?;
//!
//! engine.create_note("Trip Plan")?;
//! engine.update_active_content("# Trip Plan\n\n- pack bags")?;
//! ```
//!
//! # Modules
//!
//! - `sync`: the engine tying modes, persistence and pushes together
//! - `remote`: remote store traits and the GitHub implementation
//! - `storage`: file-backed key/value persistence
//! - `share`: share tokens, embedded links and encrypted shares
//! - `models`: notes, collections and title rules
//! - `config`: application configuration

pub mod config;
pub mod models;
pub mod remote;
pub mod share;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use models::{Mode, Note, NoteCollection, NoteRef};
pub use remote::{GitHubConnector, GitHubSession, RemoteConnector, RemoteError, RemoteStore};
pub use share::{ShareError, ShareTokenService};
pub use storage::{KeyValueStore, LocalNoteStore, StorageError};
pub use sync::{EngineOptions, SyncEngine, SyncError, SyncEvent, SyncState};
