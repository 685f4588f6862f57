//! Notes embedded in a URL fragment
//!
//! The fragment is `base64(percent_encode(text))`, readable by the web editor
//! that produced the format. Anyone holding the link can read the note.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{ShareError, ShareResult};

pub fn encode_fragment(text: &str) -> String {
    STANDARD.encode(urlencoding::encode(text).as_bytes())
}

/// Decode a fragment, with or without the leading `#`
pub fn decode_fragment(fragment: &str) -> ShareResult<String> {
    let fragment = fragment.trim();
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    if fragment.is_empty() {
        return Err(ShareError::BrokenLink("empty fragment".into()));
    }

    let bytes = STANDARD
        .decode(fragment.as_bytes())
        .map_err(|e| ShareError::BrokenLink(e.to_string()))?;
    let encoded = String::from_utf8(bytes).map_err(|e| ShareError::BrokenLink(e.to_string()))?;
    urlencoding::decode(&encoded)
        .map(|text| text.into_owned())
        .map_err(|e| ShareError::BrokenLink(e.to_string()))
}

/// Full link for an embedded note
pub fn fragment_link(editor_url: &str, text: &str) -> String {
    format!("{}#{}", editor_url, encode_fragment(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_unicode() {
        let text = "# Reise 🚆\n\nZürich → Genève, 100% sure & \"quoted\"";
        let fragment = encode_fragment(text);
        assert_eq!(decode_fragment(&fragment).unwrap(), text);
        assert_eq!(decode_fragment(&format!("#{}", fragment)).unwrap(), text);
    }

    #[test]
    fn test_reads_browser_encoding() {
        // btoa(encodeURIComponent("# Hi there"))
        assert_eq!(decode_fragment("JTIzJTIwSGklMjB0aGVyZQ==").unwrap(), "# Hi there");
    }

    #[test]
    fn test_broken_links() {
        assert!(matches!(decode_fragment(""), Err(ShareError::BrokenLink(_))));
        assert!(matches!(decode_fragment("#"), Err(ShareError::BrokenLink(_))));
        assert!(matches!(decode_fragment("!!not base64!!"), Err(ShareError::BrokenLink(_))));
        // "%E0%A4%A" is a truncated escape
        let truncated = STANDARD.encode("%E0%A4%A");
        assert!(matches!(decode_fragment(&truncated), Err(ShareError::BrokenLink(_))));
    }

    #[test]
    fn test_fragment_link() {
        let link = fragment_link("https://example.com/", "hi");
        assert_eq!(link, format!("https://example.com/#{}", encode_fragment("hi")));
    }
}
