//! Storage layer
//!
//! Durable local state: the note collections of both modes, the selected
//! mode, the GitHub credential and the share token map.
//!
//! ## Layout
//!
//! - **persistence**: file-per-key store with atomic writes
//! - **notes**: mode-namespaced note collections on top of it

pub mod error;
pub mod notes;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use notes::{notes_key, LocalNoteStore, StoredNotes};
pub use persistence::KeyValueStore;
