//! `OAuth2` access tokens.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds before expiry at which a token is treated as expired.
pub const REFRESH_WINDOW_SECS: i64 = 60;

/// `OAuth2` access token with metadata.
#[derive(Clone, Serialize, Deserialize)]
pub struct Token {
    /// Access token string.
    pub access_token: String,
    /// Token type (usually "Bearer").
    pub token_type: String,
    /// Expiration time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Refresh token for obtaining new access tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Scope granted by authorization server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Token {
    /// Creates a new bearer token without expiry.
    #[must_use]
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            expires_at: None,
            refresh_token: None,
            scope: None,
        }
    }

    /// Creates a token from a token endpoint response.
    ///
    /// # Errors
    ///
    /// Returns an error if the response carries an empty access token.
    pub fn from_response(response: TokenResponse) -> Result<Self> {
        if response.access_token.trim().is_empty() {
            return Err(Error::InvalidResponse("empty access_token".to_string()));
        }
        let expires_at = response
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(i64::from(secs)));

        Ok(Self {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_at,
            refresh_token: response.refresh_token,
            scope: response.scope,
        })
    }

    /// Checks if the token is expired or about to expire.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|exp| Utc::now() + Duration::seconds(REFRESH_WINDOW_SECS) >= exp)
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the expiration time.
    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Token response from `OAuth2` server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expires in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u32>,
    /// Refresh token (rotated by some providers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Error response from `OAuth2` server.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,
    /// Error description.
    #[serde(default)]
    pub error_description: String,
}

impl ErrorResponse {
    /// Converts to an Error.
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::oauth_error(self.error, self.error_description)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        let token = Token::bearer("access123");
        assert_eq!(token.access_token, "access123");
        assert_eq!(token.token_type, "Bearer");
        assert!(!token.is_expired());
    }

    #[test]
    fn test_token_expiration_window() {
        let expired = Token::bearer("a").with_expires_at(Utc::now() - Duration::seconds(120));
        assert!(expired.is_expired());

        // Inside the refresh window counts as expired
        let expiring = Token::bearer("a").with_expires_at(Utc::now() + Duration::seconds(30));
        assert!(expiring.is_expired());

        let valid = Token::bearer("a").with_expires_at(Utc::now() + Duration::seconds(3600));
        assert!(!valid.is_expired());
    }

    #[test]
    fn test_token_from_response() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"ya29.x","expires_in":3599,"scope":"https://mail.google.com/"}"#)
                .unwrap();
        let token = Token::from_response(response).unwrap();
        assert_eq!(token.access_token, "ya29.x");
        assert_eq!(token.token_type, "Bearer");
        assert!(token.expires_at.is_some());
        assert!(!token.is_expired());
    }

    #[test]
    fn test_empty_access_token_rejected() {
        let response: TokenResponse = serde_json::from_str(r#"{"access_token":""}"#).unwrap();
        assert!(matches!(
            Token::from_response(response),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let token = Token::bearer("secret-access").with_refresh_token("secret-refresh");
        let debug = format!("{token:?}");
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_error_response() {
        let response: ErrorResponse =
            serde_json::from_str(r#"{"error":"invalid_grant","error_description":"Token has been revoked."}"#)
                .unwrap();
        let error = response.into_error();
        assert_eq!(error.to_string(), "OAuth2 error: invalid_grant - Token has been revoked.");
    }
}
