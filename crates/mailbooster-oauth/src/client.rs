//! Token endpoint client.

use crate::error::Result;
use crate::provider::Provider;
use crate::token::{ErrorResponse, Token, TokenResponse};
use reqwest::Client;
use std::collections::HashMap;

/// Registered `OAuth2` client used to exchange refresh tokens.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Client ID from provider.
    pub client_id: String,
    /// Client secret (optional for public clients).
    pub client_secret: Option<String>,
    /// Provider configuration.
    pub provider: Provider,
    /// HTTP client.
    http_client: Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            provider,
            http_client: Client::new(),
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Exchanges a refresh token for a fresh access token.
    ///
    /// The returned token keeps `refresh_token` when the server does not
    /// rotate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server answers with an
    /// `OAuth2` error document.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Token> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &self.client_id);

        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }

        tracing::debug!(provider = %self.provider.name, "Refreshing access token");
        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ErrorResponse = response.json().await?;
            return Err(error.into_error());
        }

        let token_response: TokenResponse = response.json().await?;
        let mut token = Token::from_response(token_response)?;

        // Preserve refresh token if not returned
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        Ok(token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_client_with_secret() {
        let provider = Provider::google().unwrap();
        let client = OAuthClient::new("test_client_id", provider).with_client_secret("secret");

        assert_eq!(client.client_id, "test_client_id");
        assert_eq!(client.client_secret.as_deref(), Some("secret"));
    }
}
