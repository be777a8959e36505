//! Error types for sending mail.

use std::fmt;

use thiserror::Error;

use crate::report::{HostFailure, SendReport};

/// Broad category of a send failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The message could not be built; nothing was sent.
    Composition,
    /// The transport configuration is unusable.
    Configuration,
    /// No host could be reached or negotiated with.
    Connection,
    /// The server rejected a command.
    Protocol,
    /// Authentication could not be completed.
    Authentication,
    /// One or more recipients were rejected.
    Recipients,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Composition => "composition",
            Self::Configuration => "configuration",
            Self::Connection => "connection",
            Self::Protocol => "protocol",
            Self::Authentication => "authentication",
            Self::Recipients => "recipients",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while sending a message.
#[derive(Debug, Error)]
pub enum MailError {
    /// The composer refused the descriptor.
    #[error("Composition error: {0}")]
    Compose(#[from] mailbooster_mime::Error),

    /// Invalid transport configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Obtaining an `OAuth2` token source failed.
    #[error("OAuth error: {0}")]
    OAuth(#[from] mailbooster_oauth::Error),

    /// Envelope address the SMTP layer cannot use.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Every configured host failed.
    #[error("SMTP connect failed{}", format_failures(.0))]
    Connect(Vec<HostFailure>),

    /// Authentication failed on the selected host.
    #[error("SMTP authentication failed: {0}")]
    Authentication(#[source] mailbooster_smtp::Error),

    /// A command was rejected or the connection broke mid-transaction.
    #[error("SMTP error: {0}")]
    Smtp(#[from] mailbooster_smtp::Error),

    /// At least one recipient was rejected. The report tells whether the
    /// message was still delivered to the accepted ones.
    #[error("SMTP error: the following recipients failed: {}", format_rejected(.0))]
    Recipients(Box<SendReport>),
}

impl MailError {
    /// Returns the failure category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Compose(_) | Self::InvalidAddress(_) => ErrorKind::Composition,
            Self::Config(_) | Self::Io(_) | Self::Serde(_) | Self::OAuth(_) => {
                ErrorKind::Configuration
            }
            Self::Connect(_) => ErrorKind::Connection,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Smtp(_) => ErrorKind::Protocol,
            Self::Recipients(_) => ErrorKind::Recipients,
        }
    }

    /// Returns the SMTP reply code behind this error, if any.
    #[must_use]
    pub fn smtp_code(&self) -> Option<u16> {
        match self {
            Self::Authentication(e) | Self::Smtp(e) => e.code(),
            Self::Connect(failures) => failures.last().and_then(|f| f.code),
            _ => None,
        }
    }

    /// Returns the partial send report carried by a recipient failure.
    #[must_use]
    pub fn report(&self) -> Option<&SendReport> {
        match self {
            Self::Recipients(report) => Some(report),
            _ => None,
        }
    }
}

fn format_failures(failures: &[HostFailure]) -> String {
    if failures.is_empty() {
        return ": no usable hosts configured".to_string();
    }
    let parts: Vec<String> = failures
        .iter()
        .map(|f| format!("{}:{} ({})", f.host, f.port, f.error))
        .collect();
    format!(": {}", parts.join("; "))
}

fn format_rejected(report: &SendReport) -> String {
    let parts: Vec<String> = report
        .rejected()
        .map(|r| format!("{}: {}", r.address, r.detail))
        .collect();
    parts.join(", ")
}

/// Result type alias using [`MailError`].
pub type Result<T> = std::result::Result<T, MailError>;
