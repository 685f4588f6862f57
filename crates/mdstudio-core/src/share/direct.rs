//! Client-side encrypted shares
//!
//! The note is sealed with AES-256-GCM under a fresh random key. The sealed
//! blob is `base64(nonce || ciphertext)` and is what gets uploaded; the key
//! only ever appears in the link fragment, which browsers do not send to
//! servers.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::Rng;

use super::{ShareError, ShareResult};
use crate::remote::PasteId;

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

/// Sealed content plus the key needed to open it
#[derive(Debug, Clone)]
pub struct SealedNote {
    pub ciphertext: String,
    pub key: String,
}

/// An uploaded encrypted share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectShare {
    pub paste_id: PasteId,
    pub key: String,
}

impl DirectShare {
    pub fn url(&self, base_url: &str) -> String {
        format!("{}?paste={}#{}", base_url, self.paste_id, self.key)
    }
}

/// Encrypt `content` under a new random key
pub fn seal(content: &str) -> ShareResult<SealedNote> {
    let mut rng = rand::thread_rng();
    let mut key = [0u8; KEY_SIZE];
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rng.fill(&mut key);
    rng.fill(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| ShareError::Crypto(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), content.as_bytes())
        .map_err(|e| ShareError::Crypto(e.to_string()))?;

    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(SealedNote {
        ciphertext: STANDARD.encode(&combined),
        key: URL_SAFE_NO_PAD.encode(key),
    })
}

/// Decrypt a sealed blob with its key
pub fn open(ciphertext: &str, key: &str) -> ShareResult<String> {
    let key = URL_SAFE_NO_PAD
        .decode(key.trim().trim_start_matches('#'))
        .map_err(|_| ShareError::BrokenLink("malformed key".into()))?;
    let combined = STANDARD
        .decode(ciphertext.trim())
        .map_err(|_| ShareError::BrokenLink("malformed ciphertext".into()))?;
    if key.len() != KEY_SIZE || combined.len() <= NONCE_SIZE {
        return Err(ShareError::BrokenLink("truncated share".into()));
    }

    let (nonce_bytes, sealed) = combined.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| ShareError::Crypto(e.to_string()))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), sealed)
        .map_err(|_| ShareError::Crypto("decryption failed, wrong key?".into()))?;

    String::from_utf8(plaintext).map_err(|e| ShareError::Crypto(e.to_string()))
}
