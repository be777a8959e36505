//! Error types for message composition.

use std::path::PathBuf;
use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Composition error types.
///
/// Every variant is raised before any network activity takes place; a failed
/// composition leaves no partial state behind.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Address failed syntax validation.
    #[error("Invalid address ({kind}): {address}")]
    InvalidAddress {
        /// Which field the address was destined for (`to`, `from`, ...).
        kind: &'static str,
        /// The offending address.
        address: String,
    },

    /// No recipient in to, cc or bcc.
    #[error("You must provide at least one recipient email address")]
    NoRecipients,

    /// Message body is empty and empty bodies were not allowed.
    #[error("Message body empty")]
    EmptyBody,

    /// A filesystem attachment could not be read.
    #[error("Could not access file: {}", .0.display())]
    AttachmentNotFound(PathBuf),

    /// Attachment MIME type could not be determined or parsed.
    #[error("Could not resolve MIME type: {0}")]
    UnknownMimeType(String),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid header name or value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),

    /// DKIM key loading or signing failed.
    #[error("DKIM signing failed: {0}")]
    Dkim(String),

    /// Body signer (S/MIME) failed.
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl Error {
    /// Creates an invalid-address error for the given field.
    #[must_use]
    pub fn invalid_address(kind: &'static str, address: impl Into<String>) -> Self {
        Self::InvalidAddress {
            kind,
            address: address.into(),
        }
    }
}
