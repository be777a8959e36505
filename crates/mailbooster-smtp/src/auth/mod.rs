//! SASL mechanism selection and challenge responses.
//!
//! The session drives the exchanges; this module only computes what is sent.

pub mod ntlm;

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use mailbooster_oauth::TokenProvider;
use md5::Md5;

use crate::error::{Error, Result};
use crate::types::AuthMechanism;

/// Credentials presented during AUTH.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Username (for XOAUTH2, the mailbox the token belongs to).
    pub username: String,
    /// Password; unused by XOAUTH2.
    pub password: String,
    /// NTLM domain.
    pub realm: String,
    /// NTLM workstation name.
    pub workstation: String,
    /// Bearer token source for XOAUTH2.
    pub token_provider: Option<Arc<dyn TokenProvider>>,
}

impl Credentials {
    /// Creates username/password credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Sets the NTLM domain.
    #[must_use]
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Sets the NTLM workstation.
    #[must_use]
    pub fn with_workstation(mut self, workstation: impl Into<String>) -> Self {
        self.workstation = workstation.into();
        self
    }

    /// Sets the XOAUTH2 token source.
    #[must_use]
    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("realm", &self.realm)
            .field("workstation", &self.workstation)
            .field("token_provider", &self.token_provider.is_some())
            .finish()
    }
}

/// Picks the mechanism to authenticate with.
///
/// A requested mechanism must be advertised. Otherwise the first entry of
/// [`AuthMechanism::PREFERENCE`] the server advertises wins; XOAUTH2 is
/// only considered when a token provider is available.
///
/// # Errors
///
/// Returns [`Error::Auth`] if the requested mechanism is not advertised or
/// no usable mechanism is found.
pub fn select_mechanism(
    advertised: &[AuthMechanism],
    requested: Option<AuthMechanism>,
    has_token_provider: bool,
) -> Result<AuthMechanism> {
    if let Some(mechanism) = requested {
        if !advertised.contains(&mechanism) {
            return Err(Error::Auth(format!(
                "The requested authentication method \"{mechanism}\" is not supported by the server"
            )));
        }
        return Ok(mechanism);
    }

    AuthMechanism::PREFERENCE
        .into_iter()
        .filter(|m| *m != AuthMechanism::XOAuth2 || has_token_provider)
        .find(|m| advertised.contains(m))
        .ok_or_else(|| Error::Auth("No supported authentication methods found".into()))
}

/// Base64 of a single LOGIN field.
#[must_use]
pub fn login_field(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Builds the CRAM-MD5 answer to a base64 challenge:
/// `base64(username SP hex(hmac_md5(password, challenge)))`.
///
/// # Errors
///
/// Returns an error if the challenge is not valid base64.
pub fn cram_md5_response(username: &str, password: &str, challenge: &str) -> Result<String> {
    let challenge = STANDARD
        .decode(challenge.trim())
        .map_err(|e| Error::Auth(format!("Invalid CRAM-MD5 challenge: {e}")))?;
    let digest = hmac_md5(password.as_bytes(), &challenge)?;
    Ok(STANDARD.encode(format!("{username} {}", hex::encode(digest))))
}

pub(crate) fn hmac_md5(key: &[u8], data: &[u8]) -> Result<[u8; 16]> {
    let mut mac = <Hmac<Md5> as Mac>::new_from_slice(key)
        .map_err(|e| Error::Auth(format!("HMAC key rejected: {e}")))?;
    mac.update(data);
    let mut out = [0u8; 16];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}
