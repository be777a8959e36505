//! Transport configuration.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mailbooster_oauth::{OAuthClient, Provider, RefreshTokenProvider, StaticTokenProvider, TokenProvider};
use mailbooster_smtp::{AuthMechanism, Credentials, Timeouts};
use serde::{Deserialize, Serialize};

use crate::error::{MailError, Result};
use crate::host::{HostEntry, parse_hosts};

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// Plaintext, upgraded opportunistically when auto-TLS is on.
    #[default]
    None,
    /// TLS from the first byte (usually port 465).
    Ssl,
    /// Plaintext connect, then STARTTLS is required.
    Tls,
}

impl Security {
    /// Returns the conventional port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::Ssl => 465,
            Self::Tls => 587,
        }
    }
}

/// Authentication mechanism as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mechanism {
    /// `PLAIN`
    Plain,
    /// `LOGIN`
    Login,
    /// `CRAM-MD5`
    CramMd5,
    /// `NTLM`
    Ntlm,
    /// `XOAUTH2`
    Xoauth2,
}

impl From<Mechanism> for AuthMechanism {
    fn from(mechanism: Mechanism) -> Self {
        match mechanism {
            Mechanism::Plain => Self::Plain,
            Mechanism::Login => Self::Login,
            Mechanism::CramMd5 => Self::CramMd5,
            Mechanism::Ntlm => Self::Ntlm,
            Mechanism::Xoauth2 => Self::XOAuth2,
        }
    }
}

/// Source of XOAUTH2 bearer tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OAuthConfig {
    /// A fixed access token.
    AccessToken {
        /// The bearer token.
        token: String,
    },
    /// A refresh token exchanged at the provider's token endpoint.
    RefreshToken {
        /// Provider name (`google` or `microsoft`).
        provider: String,
        /// OAuth client ID.
        client_id: String,
        /// OAuth client secret, if the client has one.
        #[serde(default)]
        client_secret: Option<String>,
        /// Long-lived refresh token.
        refresh_token: String,
    },
}

impl OAuthConfig {
    /// Builds the token provider this configuration describes.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider name is unknown.
    pub fn token_provider(&self) -> Result<Arc<dyn TokenProvider>> {
        match self {
            Self::AccessToken { token } => Ok(Arc::new(StaticTokenProvider::new(token.clone()))),
            Self::RefreshToken {
                provider,
                client_id,
                client_secret,
                refresh_token,
            } => {
                let mut client = OAuthClient::new(client_id.clone(), Provider::by_name(provider)?);
                if let Some(secret) = client_secret {
                    client = client.with_client_secret(secret.clone());
                }
                Ok(Arc::new(RefreshTokenProvider::new(client, refresh_token.clone())))
            }
        }
    }
}

/// SMTP AUTH settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Mechanism to use; picked from the server's list when absent.
    pub mechanism: Option<Mechanism>,
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
    /// NTLM domain.
    pub realm: String,
    /// NTLM workstation.
    pub workstation: String,
    /// XOAUTH2 token source.
    pub oauth: Option<OAuthConfig>,
}

impl AuthConfig {
    /// Creates username/password settings with automatic mechanism choice.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Builds the credentials presented to the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the OAuth settings are unusable.
    pub fn credentials(&self) -> Result<Credentials> {
        let mut credentials = Credentials::new(self.username.clone(), self.password.clone())
            .with_realm(self.realm.clone())
            .with_workstation(self.workstation.clone());
        if let Some(oauth) = &self.oauth {
            credentials = credentials.with_token_provider(oauth.token_provider()?);
        }
        Ok(credentials)
    }
}

/// How and where to deliver mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// `;` separated host list, e.g. `"a.example.com;ssl://b.example.com:465"`.
    pub hosts: String,
    /// Port for entries without their own.
    pub port: u16,
    /// Security for entries without a scheme.
    pub security: Security,
    /// Upgrade with STARTTLS whenever the server offers it.
    pub auto_tls: bool,
    /// AUTH settings; no authentication when absent.
    pub auth: Option<AuthConfig>,
    /// Name sent in EHLO/HELO; the local hostname when absent.
    pub helo: Option<String>,
    /// TCP connect and TLS handshake timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Per read/write timeout in seconds.
    pub command_timeout_secs: u64,
    /// Time budget for one reply in seconds.
    pub time_limit_secs: u64,
    /// Keep the connection open between sends.
    pub keep_alive: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            hosts: "localhost".to_string(),
            port: 25,
            security: Security::None,
            auto_tls: true,
            auth: None,
            helo: None,
            connect_timeout_secs: 300,
            command_timeout_secs: 300,
            time_limit_secs: 300,
            keep_alive: false,
        }
    }
}

impl TransportConfig {
    /// Creates a configuration for the given host list with defaults.
    #[must_use]
    pub fn new(hosts: impl Into<String>) -> Self {
        Self {
            hosts: hosts.into(),
            ..Self::default()
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(hosts: impl Into<String>) -> TransportConfigBuilder {
        TransportConfigBuilder::new(hosts)
    }

    /// Parses a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the result is invalid.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Checks values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.hosts.trim().is_empty() {
            return Err(MailError::Config("host list is empty".into()));
        }
        if self.port == 0 {
            return Err(MailError::Config("port must be 1-65535".into()));
        }
        if self.connect_timeout_secs == 0
            || self.command_timeout_secs == 0
            || self.time_limit_secs == 0
        {
            return Err(MailError::Config("timeouts must be positive".into()));
        }
        let xoauth2_without_token = self
            .auth
            .as_ref()
            .is_some_and(|a| a.mechanism == Some(Mechanism::Xoauth2) && a.oauth.is_none());
        if xoauth2_without_token {
            return Err(MailError::Config("XOAUTH2 requires an oauth token source".into()));
        }
        Ok(())
    }

    /// Hosts to try, in order. Invalid entries are skipped with a warning.
    #[must_use]
    pub fn host_entries(&self) -> Vec<HostEntry> {
        parse_hosts(&self.hosts, self.port, self.security)
    }

    /// Session time budgets.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            command: Duration::from_secs(self.command_timeout_secs),
            time_limit: Duration::from_secs(self.time_limit_secs),
        }
    }
}

/// Builder for [`TransportConfig`].
#[derive(Debug, Clone)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
    port: Option<u16>,
}

impl TransportConfigBuilder {
    /// Creates a builder for the given host list.
    #[must_use]
    pub fn new(hosts: impl Into<String>) -> Self {
        Self {
            config: TransportConfig::new(hosts),
            port: None,
        }
    }

    /// Sets the default port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the default security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.config.security = security;
        self
    }

    /// Enables or disables opportunistic STARTTLS.
    #[must_use]
    pub const fn auto_tls(mut self, enabled: bool) -> Self {
        self.config.auto_tls = enabled;
        self
    }

    /// Sets the AUTH settings.
    #[must_use]
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.config.auth = Some(auth);
        self
    }

    /// Sets the EHLO/HELO name.
    #[must_use]
    pub fn helo(mut self, name: impl Into<String>) -> Self {
        self.config.helo = Some(name.into());
        self
    }

    /// Uses the same timeout for connect, commands and replies.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout.as_secs();
        self.config.connect_timeout_secs = secs;
        self.config.command_timeout_secs = secs;
        self.config.time_limit_secs = secs;
        self
    }

    /// Keeps the connection open between sends.
    #[must_use]
    pub const fn keep_alive(mut self, enabled: bool) -> Self {
        self.config.keep_alive = enabled;
        self
    }

    /// Builds the configuration. Without an explicit port, the security
    /// mode's conventional port is used.
    #[must_use]
    pub fn build(mut self) -> TransportConfig {
        self.config.port = self
            .port
            .unwrap_or_else(|| self.config.security.default_port());
        self.config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.port, 25);
        assert_eq!(config.security, Security::None);
        assert!(config.auto_tls);
        assert!(!config.keep_alive);
        assert_eq!(config.timeouts(), Timeouts::uniform(Duration::from_secs(300)));
    }

    #[test]
    fn test_from_json() {
        let config = TransportConfig::from_json_str(
            r#"{
                "hosts": "smtp.example.com;ssl://backup.example.com:465",
                "port": 587,
                "security": "tls",
                "auth": {"mechanism": "cram-md5", "username": "u", "password": "p"},
                "command_timeout_secs": 30
            }"#,
        )
        .unwrap();
        assert_eq!(config.port, 587);
        assert_eq!(config.security, Security::Tls);
        assert!(config.auto_tls);
        assert_eq!(config.command_timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 300);
        let auth = config.auth.as_ref().unwrap();
        assert_eq!(auth.mechanism, Some(Mechanism::CramMd5));
        assert_eq!(AuthMechanism::from(Mechanism::CramMd5), AuthMechanism::CramMd5);

        let hosts = config.host_entries();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].security, Security::Tls);
        assert_eq!(hosts[1].security, Security::Ssl);
        assert_eq!(hosts[1].port, 465);
    }

    #[test]
    fn test_oauth_config_json() {
        let config = TransportConfig::from_json_str(
            r#"{
                "hosts": "smtp.gmail.com",
                "auth": {
                    "mechanism": "xoauth2",
                    "username": "me@gmail.com",
                    "oauth": {"type": "access-token", "token": "ya29.x"}
                }
            }"#,
        )
        .unwrap();
        let credentials = config.auth.unwrap().credentials().unwrap();
        assert!(credentials.token_provider.is_some());
    }

    #[test]
    fn test_validation() {
        assert!(TransportConfig::from_json_str(r#"{"hosts": " "}"#).is_err());
        assert!(TransportConfig::from_json_str(r#"{"port": 0}"#).is_err());
        assert!(TransportConfig::from_json_str(r#"{"time_limit_secs": 0}"#).is_err());
        assert!(TransportConfig::from_json_str(r#"{"security": "starttls"}"#).is_err());
        let err = TransportConfig::from_json_str(
            r#"{"auth": {"mechanism": "xoauth2", "username": "u"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("XOAUTH2"));
    }

    #[test]
    fn test_builder() {
        let config = TransportConfig::builder("mx.test")
            .security(Security::Ssl)
            .auth(AuthConfig::new("user", "pass"))
            .helo("client.test")
            .timeout(Duration::from_secs(10))
            .keep_alive(true)
            .build();
        assert_eq!(config.port, 465);
        assert_eq!(config.helo.as_deref(), Some("client.test"));
        assert_eq!(config.timeouts().command, Duration::from_secs(10));
        assert!(config.keep_alive);

        let config = TransportConfig::builder("mx.test").port(2525).build();
        assert_eq!(config.port, 2525);
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transport.json");
        std::fs::write(&path, r#"{"hosts": "mx.test", "keep_alive": true}"#).unwrap();
        let config = TransportConfig::from_path(&path).unwrap();
        assert!(config.keep_alive);
        assert!(TransportConfig::from_path(dir.path().join("missing.json")).is_err());
    }
}
