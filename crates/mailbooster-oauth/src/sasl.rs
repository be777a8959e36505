//! SASL initial responses.
//!
//! Implements:
//! - PLAIN (RFC 4616) - Basic username/password authentication
//! - XOAUTH2 (Google/Microsoft proprietary) - `OAuth2` bearer token
//! - OAUTHBEARER (RFC 7628) - Standard `OAuth2` authentication

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Generates PLAIN initial response (RFC 4616).
///
/// Format: `\0<username>\0<password>` (base64 encoded)
///
/// The first NUL separates the empty authorization identity.
///
/// # Example
///
/// ```
/// use mailbooster_oauth::sasl::plain_response;
///
/// let response = plain_response("user@example.com", "password123");
/// // Send: AUTH PLAIN {response}
/// ```
#[must_use]
pub fn plain_response(username: &str, password: &str) -> String {
    let auth_string = format!("\0{username}\0{password}");
    STANDARD.encode(auth_string.as_bytes())
}

/// Generates XOAUTH2 initial response.
///
/// Format: `user=<user>\x01auth=Bearer <token>\x01\x01`
///
/// # Example
///
/// ```
/// use mailbooster_oauth::sasl::xoauth2_response;
///
/// let response = xoauth2_response("user@example.com", "ya29.a0...");
/// // Send: AUTH XOAUTH2 {response}
/// ```
#[must_use]
pub fn xoauth2_response(user: &str, token: &str) -> String {
    let auth_string = format!("user={user}\x01auth=Bearer {token}\x01\x01");
    STANDARD.encode(auth_string.as_bytes())
}

/// Generates OAUTHBEARER initial response (RFC 7628).
///
/// Format: `n,a=<user>,\x01auth=Bearer <token>\x01\x01`
#[must_use]
pub fn oauthbearer_response(user: &str, token: &str) -> String {
    let auth_string = format!("n,a={user},\x01auth=Bearer {token}\x01\x01");
    STANDARD.encode(auth_string.as_bytes())
}

/// Decodes the base64 JSON error a server sends in a 334 challenge after a
/// rejected XOAUTH2 token.
///
/// `{"status":"401", "schemes":"bearer", "scope":"..."}`
///
/// Returns `None` if the challenge is not such an error.
#[must_use]
pub fn parse_oauth_challenge(challenge: &str) -> Option<OAuthError> {
    let decoded = STANDARD.decode(challenge.trim()).ok()?;
    serde_json::from_slice(&decoded).ok()
}

/// `OAuth2` error reported by the server during XOAUTH2.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuthError {
    /// HTTP-like status code.
    pub status: String,
    /// Authentication schemes supported.
    #[serde(default)]
    pub schemes: String,
    /// `OAuth2` scope required.
    #[serde(default)]
    pub scope: Option<String>,
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn decode(response: &str) -> String {
        String::from_utf8(STANDARD.decode(response).unwrap()).unwrap()
    }

    #[test]
    fn test_xoauth2_format() {
        let response = xoauth2_response("test@test.com", "abc");
        assert_eq!(decode(&response), "user=test@test.com\x01auth=Bearer abc\x01\x01");
    }

    #[test]
    fn test_oauthbearer_format() {
        let response = oauthbearer_response("test@test.com", "abc");
        assert_eq!(decode(&response), "n,a=test@test.com,\x01auth=Bearer abc\x01\x01");
    }

    #[test]
    fn test_plain_response_format() {
        assert_eq!(decode(&plain_response("test", "pass")), "\0test\0pass");
        assert_eq!(decode(&plain_response("user", "pass@word!")), "\0user\0pass@word!");
    }

    #[test]
    fn test_responses_are_base64() {
        let response = xoauth2_response("user@example.com", "token");
        assert!(!response.contains("user@example.com"));
        assert!(STANDARD.decode(&response).is_ok());
    }

    #[test]
    fn test_parse_oauth_challenge() {
        let json = r#"{"status":"401","schemes":"bearer","scope":"https://mail.google.com/"}"#;
        let error = parse_oauth_challenge(&STANDARD.encode(json)).unwrap();

        assert_eq!(error.status, "401");
        assert_eq!(error.schemes, "bearer");
        assert_eq!(error.scope.as_deref(), Some("https://mail.google.com/"));

        assert!(parse_oauth_challenge("VXNlcm5hbWU6").is_none());
    }
}
