//! Remote media reference checks.
//!
//! Two independent checks: a cheap syntactic one used by the coordinator
//! before any work starts, and an authoritative one used by extractors that
//! must locate an actual media id.

use crate::error::ExtractError;
use regex::Regex;
use std::sync::LazyLock;

// SAFETY: hardcoded patterns below are always valid
#[allow(clippy::expect_used)]
static PROVIDER_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.|m\.|music\.)?(youtube\.com|youtu\.be)/.+$")
        .expect("hardcoded provider pattern")
});

#[allow(clippy::expect_used)]
static MEDIA_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^(?:https?://)?(?:www\.|m\.|music\.)?youtu\.be/([A-Za-z0-9_-]+)(?:[?&#/].*)?$",
        r"^(?:https?://)?(?:www\.|m\.|music\.)?youtube\.com/watch\?(?:[^#]*&)?v=([A-Za-z0-9_-]+)(?:[&#].*)?$",
        r"^(?:https?://)?(?:www\.|m\.|music\.)?youtube\.com/(?:shorts|embed|live)/([A-Za-z0-9_-]+)(?:[?&#/].*)?$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("hardcoded media id pattern"))
    .collect()
});

/// Syntactic check against known providers. No network access.
pub fn is_remote_reference(reference: &str) -> bool {
    PROVIDER_URL.is_match(reference.trim())
}

/// Media id named by `reference`, if one can be located.
pub fn media_id(reference: &str) -> Option<String> {
    let reference = reference.trim();
    MEDIA_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(reference))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Authoritative check for extractors.
///
/// # Errors
/// `ExtractError::ReferenceRejected` when the reference names no media id.
pub fn require_media_id(reference: &str) -> Result<String, ExtractError> {
    if !is_remote_reference(reference) {
        return Err(ExtractError::ReferenceRejected {
            reference: reference.to_string(),
            message: "not a supported provider URL".to_string(),
        });
    }
    media_id(reference).ok_or_else(|| ExtractError::ReferenceRejected {
        reference: reference.to_string(),
        message: "no media id in URL".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntactic_check_accepts_known_providers() {
        assert!(is_remote_reference("https://youtu.be/abc123"));
        assert!(is_remote_reference("http://www.youtube.com/watch?v=abc"));
        assert!(is_remote_reference("youtube.com/shorts/xyz"));
        assert!(is_remote_reference("https://m.youtube.com/watch?v=abc"));
        assert!(is_remote_reference("https://music.youtube.com/watch?v=abc"));
        assert!(is_remote_reference("  https://youtu.be/abc123  "));
    }

    #[test]
    fn test_syntactic_check_rejects_others() {
        assert!(!is_remote_reference(""));
        assert!(!is_remote_reference("https://vimeo.com/12345"));
        assert!(!is_remote_reference("https://youtube.com/"));
        assert!(!is_remote_reference("https://notyoutube.com/watch?v=abc"));
        assert!(!is_remote_reference("ftp://youtube.com/watch?v=abc"));
    }

    #[test]
    fn test_media_id_from_supported_shapes() {
        assert_eq!(media_id("https://youtu.be/abc123").as_deref(), Some("abc123"));
        assert_eq!(
            media_id("https://youtu.be/abc123?t=42").as_deref(),
            Some("abc123")
        );
        assert_eq!(
            media_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            media_id("https://www.youtube.com/watch?feature=share&v=a_b-c").as_deref(),
            Some("a_b-c")
        );
        assert_eq!(
            media_id("youtube.com/shorts/short1").as_deref(),
            Some("short1")
        );
        assert_eq!(
            media_id("https://www.youtube.com/embed/emb3d").as_deref(),
            Some("emb3d")
        );
        assert_eq!(
            media_id("https://youtube.com/live/l1ve?si=x").as_deref(),
            Some("l1ve")
        );
    }

    #[test]
    fn test_syntactically_valid_but_no_media_id() {
        let reference = "https://www.youtube.com/channel/UC123";
        assert!(is_remote_reference(reference));
        assert_eq!(media_id(reference), None);
        assert!(matches!(
            require_media_id(reference),
            Err(ExtractError::ReferenceRejected { .. })
        ));
    }

    #[test]
    fn test_require_media_id_rejects_unknown_provider() {
        match require_media_id("https://example.com/watch?v=abc") {
            Err(ExtractError::ReferenceRejected { reference, message }) => {
                assert_eq!(reference, "https://example.com/watch?v=abc");
                assert!(message.contains("provider"));
            }
            other => panic!("Expected ReferenceRejected, got {other:?}"),
        }
    }
}
