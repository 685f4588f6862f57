//! Expiring share tokens
//!
//! Tokens are 128 random bits, hex encoded, mapped to the shared note's id
//! and path. Expired entries are pruned on every access.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ShareError, ShareResult};
use crate::models::Note;
use crate::remote::RemoteResult;
use crate::storage::notes::SHARE_TOKENS_KEY;
use crate::storage::{KeyValueStore, StorageError};

/// Lifetime of a share token
pub const SHARE_TTL_HOURS: i64 = 24;

/// A stored share token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareToken {
    pub token: String,
    pub note_id: String,
    #[serde(default)]
    pub path: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl ShareToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn share_ref(&self) -> ShareRef {
        ShareRef {
            note_id: self.note_id.clone(),
            path: self.path.clone(),
        }
    }
}

/// What a valid token points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRef {
    pub note_id: String,
    pub path: Option<String>,
}

/// Share URL for a token
pub fn share_url(base_url: &str, token: &str) -> String {
    format!("{}?shared={}", base_url, token)
}

/// Locate a shared note in a listing
///
/// The id may have been rewritten by later pushes, so the path is tried
/// first and the id second.
pub fn find_shared<'a>(notes: &'a [Note], share: &ShareRef) -> Option<&'a Note> {
    share
        .path
        .as_deref()
        .and_then(|p| notes.iter().find(|n| n.path.as_deref() == Some(p)))
        .or_else(|| notes.iter().find(|n| n.id == share.note_id))
}

type TokenMap = HashMap<String, ShareToken>;

#[derive(Debug, Clone)]
pub struct ShareTokenService {
    kv: KeyValueStore,
    ttl: Duration,
}

impl ShareTokenService {
    pub fn new(kv: KeyValueStore) -> Self {
        Self {
            kv,
            ttl: Duration::hours(SHARE_TTL_HOURS),
        }
    }

    /// Token for a cloud note, reusing an unexpired one
    pub fn create_token(&self, note: &Note) -> ShareResult<ShareToken> {
        self.create_token_at(note, Utc::now())
    }

    pub fn create_token_at(&self, note: &Note, now: DateTime<Utc>) -> ShareResult<ShareToken> {
        let path = note.path.as_deref().ok_or(ShareError::MissingPath)?;
        let mut tokens = self.load_pruned(now)?;

        let existing = tokens
            .values()
            .find(|t| t.path.as_deref() == Some(path))
            .or_else(|| tokens.values().find(|t| t.note_id == note.id));
        if let Some(token) = existing {
            debug!("Reusing share token for {}", path);
            return Ok(token.clone());
        }

        let token = ShareToken {
            token: random_token(),
            note_id: note.id.clone(),
            path: Some(path.to_string()),
            expires_at: now + self.ttl,
        };
        tokens.insert(token.token.clone(), token.clone());
        self.save(&tokens)?;
        info!("Created share token for {}", path);
        Ok(token)
    }

    /// Resolve a token; `None` when unknown or expired
    pub fn validate_token(&self, token: &str) -> ShareResult<Option<ShareRef>> {
        self.validate_token_at(token, Utc::now())
    }

    pub fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> ShareResult<Option<ShareRef>> {
        let tokens = self.load_pruned(now)?;
        Ok(tokens.get(token.trim()).map(ShareToken::share_ref))
    }

    /// Validate a token and fetch the note it points at
    ///
    /// `fetch` supplies the current remote listing; it is only called for a
    /// valid token.
    pub async fn resolve_shared_note<F, Fut>(&self, token: &str, fetch: F) -> ShareResult<Note>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RemoteResult<Vec<Note>>>,
    {
        let share = self.validate_token(token)?.ok_or(ShareError::NotFound)?;
        let notes = fetch().await?;
        find_shared(&notes, &share).cloned().ok_or(ShareError::NotFound)
    }

    /// Unexpired tokens, oldest expiry first
    pub fn active_tokens(&self) -> ShareResult<Vec<ShareToken>> {
        let mut tokens: Vec<_> = self.load_pruned(Utc::now())?.into_values().collect();
        tokens.sort_by_key(|t| t.expires_at);
        Ok(tokens)
    }

    fn load_pruned(&self, now: DateTime<Utc>) -> ShareResult<TokenMap> {
        let mut tokens = match self.kv.get_json::<TokenMap>(SHARE_TOKENS_KEY) {
            Ok(tokens) => tokens.unwrap_or_default(),
            Err(StorageError::InvalidFormat { details, .. }) => {
                warn!("Discarding unreadable share tokens: {}", details);
                TokenMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        let before = tokens.len();
        tokens.retain(|_, t| t.is_valid_at(now));
        if tokens.len() != before {
            debug!("Pruned {} expired share tokens", before - tokens.len());
            self.save(&tokens)?;
        }
        Ok(tokens)
    }

    fn save(&self, tokens: &TokenMap) -> ShareResult<()> {
        Ok(self.kv.set_json(SHARE_TOKENS_KEY, tokens)?)
    }
}

fn random_token() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn service(temp_dir: &TempDir) -> ShareTokenService {
        ShareTokenService::new(KeyValueStore::open(temp_dir.path()).unwrap())
    }

    fn cloud_note(id: &str, path: &str) -> Note {
        Note {
            id: id.into(),
            path: Some(path.into()),
            title: "Shared".into(),
            content: "# Shared\nbody".into(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_token_format() {
        let temp_dir = TempDir::new().unwrap();
        let token = service(&temp_dir)
            .create_token_at(&cloud_note("s1", "1_a.md"), t0())
            .unwrap();

        assert_eq!(token.token.len(), 32);
        assert!(token.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token.expires_at, t0() + Duration::hours(24));
    }

    #[test]
    fn test_expiry_window() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);
        let token = service
            .create_token_at(&cloud_note("s1", "1_a.md"), t0())
            .unwrap();

        let almost = t0() + Duration::hours(23) + Duration::minutes(59);
        let share = service.validate_token_at(&token.token, almost).unwrap();
        assert_eq!(
            share,
            Some(ShareRef {
                note_id: "s1".into(),
                path: Some("1_a.md".into())
            })
        );

        let late = t0() + Duration::hours(24) + Duration::minutes(1);
        assert_eq!(service.validate_token_at(&token.token, late).unwrap(), None);
        // Pruned: gone even when asking with an earlier clock
        assert_eq!(service.validate_token_at(&token.token, t0()).unwrap(), None);
    }

    #[test]
    fn test_unexpired_token_is_reused() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        let first = service
            .create_token_at(&cloud_note("s1", "1_a.md"), t0())
            .unwrap();
        // Same path after a push rewrote the id
        let second = service
            .create_token_at(&cloud_note("s2", "1_a.md"), t0() + Duration::hours(3))
            .unwrap();
        assert_eq!(first, second);

        let other = service
            .create_token_at(&cloud_note("s9", "9_b.md"), t0())
            .unwrap();
        assert_ne!(other.token, first.token);

        let after_expiry = service
            .create_token_at(&cloud_note("s2", "1_a.md"), t0() + Duration::hours(25))
            .unwrap();
        assert_ne!(after_expiry.token, first.token);
    }

    #[test]
    fn test_requires_path() {
        let temp_dir = TempDir::new().unwrap();
        let err = service(&temp_dir)
            .create_token_at(&Note::new("# Local only"), t0())
            .unwrap_err();
        assert!(matches!(err, ShareError::MissingPath));
    }

    #[test]
    fn test_unknown_token() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(service(&temp_dir).validate_token("deadbeef").unwrap(), None);
    }

    #[test]
    fn test_corrupt_map_is_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let kv = KeyValueStore::open(temp_dir.path()).unwrap();
        kv.set(SHARE_TOKENS_KEY, "{not json").unwrap();

        let service = ShareTokenService::new(kv);
        assert_eq!(service.validate_token("x").unwrap(), None);
        assert!(service.create_token(&cloud_note("s1", "1_a.md")).is_ok());
    }

    #[test]
    fn test_find_shared_prefers_path() {
        let notes = vec![cloud_note("new-sha", "1_a.md"), cloud_note("s2", "2_b.md")];

        let by_path = ShareRef {
            note_id: "old-sha".into(),
            path: Some("1_a.md".into()),
        };
        assert_eq!(find_shared(&notes, &by_path).unwrap().id, "new-sha");

        let by_id = ShareRef {
            note_id: "s2".into(),
            path: None,
        };
        assert_eq!(find_shared(&notes, &by_id).unwrap().id, "s2");

        let missing = ShareRef {
            note_id: "nope".into(),
            path: Some("nope.md".into()),
        };
        assert!(find_shared(&notes, &missing).is_none());
    }

    #[tokio::test]
    async fn test_resolve_shared_note() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);
        let token = service.create_token(&cloud_note("s1", "1_a.md")).unwrap();

        let note = service
            .resolve_shared_note(&token.token, || async {
                Ok(vec![cloud_note("s5", "1_a.md")])
            })
            .await
            .unwrap();
        assert_eq!(note.id, "s5");

        let err = service
            .resolve_shared_note("unknown", || async { Ok(Vec::new()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::NotFound));

        let err = service
            .resolve_shared_note(&token.token, || async { Err(RemoteError::Unauthorized) })
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::Remote(RemoteError::Unauthorized)));
    }

    #[test]
    fn test_share_url() {
        assert_eq!(
            share_url("https://example.com/share.html", "abc"),
            "https://example.com/share.html?shared=abc"
        );
    }
}
