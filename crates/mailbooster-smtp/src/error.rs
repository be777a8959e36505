//! Error types for SMTP operations.

use std::io;

use crate::types::Reply;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// A connect, read or write did not finish in time.
    #[error("Timed out during {0}")]
    Timeout(&'static str),

    /// The server closed the connection.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// Server answered with an unexpected reply code.
    #[error("{command} command failed: {code} {message}")]
    SmtpError {
        /// Command that was rejected (e.g. `RCPT TO`).
        command: &'static str,
        /// Reply code (e.g., 550).
        code: u16,
        /// Enhanced status code (e.g. `5.1.1`), if the server sent one.
        enhanced_code: Option<String>,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (malformed reply).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid envelope address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Authentication could not be attempted or was refused locally.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Failed to obtain an `OAuth2` bearer token.
    #[error("Token provider error: {0}")]
    Token(#[from] mailbooster_oauth::Error),

    /// Message larger than the server's advertised SIZE.
    #[error("Message of {size} bytes exceeds server limit of {limit} bytes")]
    MessageTooLarge {
        /// Message size in bytes.
        size: usize,
        /// Advertised limit.
        limit: usize,
    },

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),
}

impl Error {
    /// Creates an SMTP error from a rejected command's reply.
    #[must_use]
    pub fn from_reply(command: &'static str, reply: &Reply) -> Self {
        Self::SmtpError {
            command,
            code: reply.code.as_u16(),
            enhanced_code: reply.enhanced_code.as_ref().map(ToString::to_string),
            message: reply.detail(),
        }
    }

    /// Returns the SMTP reply code, if the server produced this error.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::SmtpError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 400 && *code < 500)
    }

    /// Returns true if the connection can no longer be used after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Tls(_) | Self::Timeout(_) | Self::ConnectionClosed
        )
    }
}
