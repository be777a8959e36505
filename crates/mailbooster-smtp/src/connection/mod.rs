//! SMTP connection management.

mod session;
mod stream;

pub use session::{Delivery, LastError, MailOptions, Session, SessionState, Timeouts};
pub use stream::{SmtpStream, connect, connect_tls};

use crate::types::{AuthMechanism, Extension};
use std::collections::HashSet;

/// Server capabilities from the greeting and EHLO response.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// True if the server accepted EHLO (false after a HELO fallback).
    pub esmtp: bool,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if 8BITMIME is supported.
    #[must_use]
    pub fn supports_8bitmime(&self) -> bool {
        self.supports(&Extension::EightBitMime)
    }

    /// Checks if the SIZE extension was advertised, with or without a limit.
    #[must_use]
    pub fn supports_size(&self) -> bool {
        self.extensions
            .iter()
            .any(|ext| matches!(ext, Extension::Size(_)))
    }

    /// Returns the maximum message size, if advertised and non-zero.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(Some(size)) if *size > 0 => Some(*size),
            _ => None,
        })
    }

    /// Returns true if the server advertised AUTH at all.
    #[must_use]
    pub fn advertises_auth(&self) -> bool {
        self.extensions
            .iter()
            .any(|ext| matches!(ext, Extension::Auth(_)))
    }

    /// Returns supported authentication mechanisms, in preference order.
    ///
    /// Every AUTH line counts, so `AUTH LOGIN PLAIN` and a legacy
    /// `AUTH=CRAM-MD5` advertise all three.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        let advertised: HashSet<AuthMechanism> = self
            .extensions
            .iter()
            .filter_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect();
        AuthMechanism::PREFERENCE
            .into_iter()
            .filter(|m| advertised.contains(m))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn info(lines: &[&str]) -> ServerInfo {
        ServerInfo {
            hostname: "mx.example.com".to_string(),
            esmtp: true,
            extensions: lines.iter().map(|l| Extension::parse(l)).collect(),
        }
    }

    #[test]
    fn test_capability_queries() {
        let info = info(&["STARTTLS", "8BITMIME", "SIZE 1000", "AUTH LOGIN XOAUTH2"]);
        assert!(info.supports_starttls());
        assert!(info.supports_8bitmime());
        assert!(info.supports_size());
        assert_eq!(info.max_message_size(), Some(1000));
        assert!(info.advertises_auth());
        assert_eq!(
            info.auth_mechanisms(),
            vec![AuthMechanism::Login, AuthMechanism::XOAuth2]
        );
    }

    #[test]
    fn test_auth_lines_are_merged() {
        let info = info(&["AUTH LOGIN PLAIN", "AUTH=CRAM-MD5 LOGIN"]);
        assert_eq!(
            info.auth_mechanisms(),
            vec![AuthMechanism::CramMd5, AuthMechanism::Login, AuthMechanism::Plain]
        );
    }

    #[test]
    fn test_zero_size_means_unlimited() {
        let info = info(&["SIZE 0"]);
        assert!(info.supports_size());
        assert_eq!(info.max_message_size(), None);
    }

    #[test]
    fn test_no_auth() {
        let info = info(&["PIPELINING"]);
        assert!(!info.advertises_auth());
        assert!(info.auth_mechanisms().is_empty());
        assert!(!info.supports_size());
    }
}
