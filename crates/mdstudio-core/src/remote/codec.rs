//! Base64 transcoding for blob contents
//!
//! The contents API carries file bodies as base64. Text is encoded from its
//! UTF-8 bytes, so every Unicode scalar (emoji included) round-trips. GitHub
//! wraps encoded bodies with newlines, which decoding tolerates.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::error::{RemoteError, RemoteResult};

pub fn encode_text(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

pub fn decode_text(encoded: &str) -> RemoteResult<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| RemoteError::Decode(format!("invalid base64 content: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| RemoteError::Decode(format!("content is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multibyte_round_trip() {
        let text = "# Grüße 🖤\n\n日本語のメモ — ✨";
        assert_eq!(decode_text(&encode_text(text)).unwrap(), text);
    }

    #[test]
    fn test_decode_wrapped_body() {
        let encoded = encode_text("a fairly long line of markdown that wraps in the API response");
        let wrapped = format!("{}\n{}\n", &encoded[..20], &encoded[20..]);
        assert_eq!(
            decode_text(&wrapped).unwrap(),
            "a fairly long line of markdown that wraps in the API response"
        );
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(encode_text("hi"), "aGk=");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_text("***"), Err(RemoteError::Decode(_))));
        // Valid base64 of invalid UTF-8 (0xff 0xfe)
        assert!(matches!(decode_text("//4="), Err(RemoteError::Decode(_))));
    }
}
