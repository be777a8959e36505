//! `OAuth2` token endpoint presets.

use crate::error::{Error, Result};
use url::Url;

/// Identity provider whose token endpoint issues access tokens for SMTP.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Provider name (e.g., "Google").
    pub name: String,
    /// Token endpoint URL.
    pub token_url: Url,
    /// Scopes needed for SMTP submission.
    pub default_scopes: Vec<String>,
}

impl Provider {
    /// Creates a provider for an arbitrary token endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or not HTTP(S).
    pub fn new(name: impl Into<String>, token_url: impl AsRef<str>) -> Result<Self> {
        let token_url = Url::parse(token_url.as_ref())?;
        if !matches!(token_url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "token endpoint must be http(s): {token_url}"
            )));
        }
        Ok(Self {
            name: name.into(),
            token_url,
            default_scopes: Vec::new(),
        })
    }

    /// Sets the default scopes.
    #[must_use]
    pub fn with_default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }

    /// Google `OAuth2` provider configuration.
    ///
    /// Scope `https://mail.google.com/` covers SMTP.
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn google() -> Result<Self> {
        Ok(Self::new("Google", "https://oauth2.googleapis.com/token")?
            .with_default_scopes(vec!["https://mail.google.com/".to_string()]))
    }

    /// Microsoft/Outlook `OAuth2` provider configuration.
    ///
    /// Scopes:
    /// - `https://outlook.office.com/SMTP.Send` - SMTP access
    /// - `offline_access` - Refresh token
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn microsoft() -> Result<Self> {
        Ok(Self::new(
            "Microsoft",
            "https://login.microsoftonline.com/common/oauth2/v2.0/token",
        )?
        .with_default_scopes(vec![
            "https://outlook.office.com/SMTP.Send".to_string(),
            "offline_access".to_string(),
        ]))
    }

    /// Looks up a preset by case-insensitive name (`google`, `microsoft`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for unknown names.
    pub fn by_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "google" | "gmail" => Self::google(),
            "microsoft" | "outlook" | "office365" => Self::microsoft(),
            other => Err(Error::InvalidConfig(format!("unknown OAuth provider {other:?}"))),
        }
    }
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

    #[test]
    fn test_google_provider() {
        let provider = Provider::google().unwrap();
        assert_eq!(provider.name, "Google");
        assert_eq!(provider.token_url.as_str(), "https://oauth2.googleapis.com/token");
        assert_eq!(provider.default_scopes, vec!["https://mail.google.com/"]);
    }

    #[test]
    fn test_microsoft_provider() {
        let provider = Provider::microsoft().unwrap();
        assert_eq!(provider.name, "Microsoft");
        assert_eq!(provider.default_scopes.len(), 2);
    }

    #[test]
    fn test_by_name() {
        assert_eq!(Provider::by_name("Gmail").unwrap().name, "Google");
        assert_eq!(Provider::by_name("outlook").unwrap().name, "Microsoft");
        assert!(Provider::by_name("yahoo").is_err());
    }

    #[test]
    fn test_custom_provider() {
        let provider = Provider::new("Custom", "https://auth.example.com/token")
            .unwrap()
            .with_default_scopes(vec!["email".to_string()]);
        assert_eq!(provider.name, "Custom");
        assert_eq!(provider.default_scopes.len(), 1);

        assert!(Provider::new("Bad", "ftp://auth.example.com/token").is_err());
        assert!(Provider::new("Bad", "not a url").is_err());
    }
}
