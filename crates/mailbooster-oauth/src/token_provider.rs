//! Bearer token sources for XOAUTH2.

use crate::client::OAuthClient;
use crate::error::{Error, Result};
use crate::token::Token;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Supplies an `OAuth2` bearer token for a mailbox user.
///
/// The SMTP session calls this once per XOAUTH2 authentication.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a currently valid access token for `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if no token can be obtained.
    async fn bearer_token(&self, user: &str) -> Result<String>;
}

/// Always returns the same token.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Wraps an already obtained access token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self, _user: &str) -> Result<String> {
        if self.token.is_empty() {
            return Err(Error::InvalidConfig("empty access token".to_string()));
        }
        Ok(self.token.clone())
    }
}

/// Exchanges a long-lived refresh token for access tokens, caching each
/// one until it enters the refresh window.
#[derive(Debug)]
pub struct RefreshTokenProvider {
    client: OAuthClient,
    state: Mutex<RefreshState>,
}

#[derive(Debug)]
struct RefreshState {
    refresh_token: String,
    cached: Option<Token>,
}

impl RefreshTokenProvider {
    /// Creates a provider for the given client and refresh token.
    #[must_use]
    pub fn new(client: OAuthClient, refresh_token: impl Into<String>) -> Self {
        Self {
            client,
            state: Mutex::new(RefreshState {
                refresh_token: refresh_token.into(),
                cached: None,
            }),
        }
    }

    /// Seeds the cache with a token obtained elsewhere.
    #[must_use]
    pub fn with_cached_token(self, token: Token) -> Self {
        let mut state = self.state.into_inner();
        state.cached = Some(token);
        Self {
            client: self.client,
            state: Mutex::new(state),
        }
    }
}

#[async_trait]
impl TokenProvider for RefreshTokenProvider {
    async fn bearer_token(&self, user: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        if let Some(token) = state.cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.access_token.clone());
        }
        if state.refresh_token.is_empty() {
            return Err(Error::NoRefreshToken);
        }

        let token = self.client.refresh_token(&state.refresh_token).await?;
        tracing::info!(
            provider = %self.client.provider.name,
            user,
            expires_at = ?token.expires_at,
            "Obtained access token"
        );
        if let Some(rotated) = &token.refresh_token {
            state.refresh_token.clone_from(rotated);
        }
        let access = token.access_token.clone();
        state.cached = Some(token);
        Ok(access)
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
    use crate::provider::Provider;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `body` with `status` to every request and counts requests.
    async fn token_endpoint(status: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                // Read until the form body has arrived
                loop {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                    let text = String::from_utf8_lossy(&request);
                    if text.contains("\r\n\r\n") && text.contains("grant_type=refresh_token") {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (format!("http://{addr}/token"), hits)
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("abc");
        assert_eq!(provider.bearer_token("user@x.com").await.unwrap(), "abc");

        let empty = StaticTokenProvider::new("");
        assert!(empty.bearer_token("user@x.com").await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_provider_caches() {
        let (url, hits) = token_endpoint(
            "200 OK",
            r#"{"access_token":"fresh","token_type":"Bearer","expires_in":3600}"#,
        )
        .await;
        let client = OAuthClient::new("id", Provider::new("Test", url).unwrap());
        let provider = RefreshTokenProvider::new(client, "refresh");

        assert_eq!(provider.bearer_token("user@x.com").await.unwrap(), "fresh");
        assert_eq!(provider.bearer_token("user@x.com").await.unwrap(), "fresh");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_provider_uses_valid_seed() {
        let client = OAuthClient::new("id", Provider::new("Test", "http://127.0.0.1:9/token").unwrap());
        let seeded = Token::bearer("seeded").with_expires_at(Utc::now() + Duration::seconds(3600));
        let provider = RefreshTokenProvider::new(client, "refresh").with_cached_token(seeded);
        assert_eq!(provider.bearer_token("user@x.com").await.unwrap(), "seeded");
    }

    #[tokio::test]
    async fn test_refresh_provider_reports_oauth_error() {
        let (url, _) = token_endpoint(
            "400 Bad Request",
            r#"{"error":"invalid_grant","error_description":"revoked"}"#,
        )
        .await;
        let client = OAuthClient::new("id", Provider::new("Test", url).unwrap());
        let provider = RefreshTokenProvider::new(client, "refresh");

        let err = provider.bearer_token("user@x.com").await.unwrap_err();
        assert!(matches!(err, Error::OAuth { ref error, .. } if error == "invalid_grant"));
    }

    #[tokio::test]
    async fn test_refresh_provider_without_refresh_token() {
        let client = OAuthClient::new("id", Provider::new("Test", "http://127.0.0.1:9/token").unwrap());
        let provider = RefreshTokenProvider::new(client, "");
        assert!(matches!(
            provider.bearer_token("user@x.com").await,
            Err(Error::NoRefreshToken)
        ));
    }
}
