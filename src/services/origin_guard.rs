//! Origin Guard: shared-secret and origin check for calls from the Express server.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

/// Header carrying the pre-shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reasons the guard rejects a request. The display text is the response detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid API key")]
    MissingOrInvalidKey,

    #[error("Invalid origin")]
    InvalidOrigin,
}

/// Check the API key and, when both sides carry one, the origin.
///
/// A request without an `Origin` header skips the origin check.
pub fn authorize(
    headers: &HeaderMap,
    configured_api_key: &str,
    configured_origin: Option<&str>,
) -> Result<(), AuthError> {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingOrInvalidKey)?;

    if !secrets_match(api_key, configured_api_key) {
        return Err(AuthError::MissingOrInvalidKey);
    }

    // Only an absent header skips the check; undecodable values still compare.
    match (headers.get(axum::http::header::ORIGIN), configured_origin) {
        (Some(origin), Some(expected)) if origin.as_bytes() != expected.as_bytes() => {
            Err(AuthError::InvalidOrigin)
        }
        _ => Ok(()),
    }
}

/// Compare two secrets without short-circuiting on the first differing byte.
///
/// Both sides are reduced to SHA-256 digests so the loop length is fixed.
fn secrets_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    const KEY: &str = "express-shared-secret";
    const ORIGIN: &str = "http://express.internal:3000";

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn missing_key_rejected() {
        let h = headers(&[("origin", ORIGIN), ("x-forwarded-for", "1.2.3.4")]);
        assert_eq!(
            authorize(&h, KEY, Some(ORIGIN)),
            Err(AuthError::MissingOrInvalidKey)
        );
    }

    #[test]
    fn wrong_key_rejected() {
        let h = headers(&[("x-api-key", "express-shared-secreT")]);
        assert_eq!(authorize(&h, KEY, None), Err(AuthError::MissingOrInvalidKey));

        let h = headers(&[("x-api-key", "")]);
        assert_eq!(authorize(&h, KEY, None), Err(AuthError::MissingOrInvalidKey));
    }

    #[test]
    fn key_header_name_is_case_insensitive() {
        let h = headers(&[("X-API-Key", KEY)]);
        assert_eq!(authorize(&h, KEY, None), Ok(()));
    }

    #[test]
    fn correct_key_without_origin_passes() {
        let h = headers(&[("x-api-key", KEY)]);
        assert_eq!(authorize(&h, KEY, Some(ORIGIN)), Ok(()));
    }

    #[test]
    fn matching_origin_passes() {
        let h = headers(&[("x-api-key", KEY), ("origin", ORIGIN)]);
        assert_eq!(authorize(&h, KEY, Some(ORIGIN)), Ok(()));
    }

    #[test]
    fn mismatched_origin_rejected() {
        let h = headers(&[("x-api-key", KEY), ("origin", "http://evil.test")]);
        assert_eq!(authorize(&h, KEY, Some(ORIGIN)), Err(AuthError::InvalidOrigin));
    }

    #[test]
    fn non_ascii_origin_rejected() {
        let mut h = headers(&[("x-api-key", KEY)]);
        h.insert(
            axum::http::header::ORIGIN,
            HeaderValue::from_bytes(b"http://evil\xe9.test").unwrap(),
        );
        assert_eq!(authorize(&h, KEY, Some(ORIGIN)), Err(AuthError::InvalidOrigin));
    }

    #[test]
    fn non_ascii_key_rejected() {
        let mut h = headers(&[("origin", ORIGIN)]);
        h.insert(
            API_KEY_HEADER,
            HeaderValue::from_bytes(b"express-shared-secret\xe9").unwrap(),
        );
        assert_eq!(
            authorize(&h, KEY, Some(ORIGIN)),
            Err(AuthError::MissingOrInvalidKey)
        );
    }

    #[test]
    fn origin_comparison_is_case_sensitive() {
        let h = headers(&[("x-api-key", KEY), ("origin", "HTTP://express.internal:3000")]);
        assert_eq!(authorize(&h, KEY, Some(ORIGIN)), Err(AuthError::InvalidOrigin));
    }

    #[test]
    fn origin_ignored_when_not_configured() {
        let h = headers(&[("x-api-key", KEY), ("origin", "http://anything.test")]);
        assert_eq!(authorize(&h, KEY, None), Ok(()));
    }

    #[test]
    fn key_checked_before_origin() {
        let h = headers(&[("x-api-key", "nope"), ("origin", "http://evil.test")]);
        assert_eq!(
            authorize(&h, KEY, Some(ORIGIN)),
            Err(AuthError::MissingOrInvalidKey)
        );
    }

    #[test]
    fn secrets_match_behaviour() {
        assert!(secrets_match("abc", "abc"));
        assert!(!secrets_match("abc", "abd"));
        assert!(!secrets_match("abc", "abcd"));
        assert!(!secrets_match("", "abc"));
    }
}
