//! Sync status and events

use std::fmt;

use serde::Serialize;

/// Current sync state
///
/// `Local` is the only state outside cloud mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Notes live only on this machine
    Local,
    /// Every cloud note is pushed
    CloudIdle,
    /// Edits are waiting for the debounce to fire
    CloudPendingSync,
    /// A push is in flight
    CloudSyncing,
}

impl SyncState {
    /// Human-readable status label
    pub fn label(&self) -> &'static str {
        match self {
            SyncState::Local => "Local Storage",
            SyncState::CloudIdle => "Cloud Synced",
            SyncState::CloudPendingSync => "Pending Sync",
            SyncState::CloudSyncing => "Syncing…",
        }
    }

    pub fn is_cloud(&self) -> bool {
        !matches!(self, SyncState::Local)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Events emitted by the sync engine
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Sync state changed
    StatusChanged(SyncState),
    /// Connected and merged the remote listing
    Connected { notes: usize, added: usize },
    /// Cloud connection failed; the engine fell back to local mode
    FellBack(String),
    /// Remote unreachable; cloud mode continues from the cached copy
    Offline(String),
    /// A note was written to the remote store
    Pushed { path: String },
    /// A push failed and will be retried
    PushFailed(String),
    /// The credential was rejected; pushes stop until a new login
    AuthRequired(String),
    /// Remote delete failed; the note was removed locally anyway
    DeleteFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(SyncState::Local.to_string(), "Local Storage");
        assert_eq!(SyncState::CloudIdle.label(), "Cloud Synced");
        assert_eq!(SyncState::CloudPendingSync.label(), "Pending Sync");
        assert_eq!(SyncState::CloudSyncing.label(), "Syncing…");
    }

    #[test]
    fn test_is_cloud() {
        assert!(!SyncState::Local.is_cloud());
        assert!(SyncState::CloudSyncing.is_cloud());
    }
}
