//! Pluggable S/MIME body signing.

use crate::error::Result;

/// Output of a [`BodySigner`]: the signed entity split into its header
/// block and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEntity {
    /// Header lines of the signed entity (e.g. `MIME-Version` and a
    /// `multipart/signed` Content-Type), CRLF-terminated.
    pub headers: String,
    /// Body of the signed entity.
    pub body: String,
}

/// Signs a MIME entity (its Content-Type lines, a blank line, then the
/// body) and returns the replacement entity.
///
/// The composer emits the returned headers in place of its own
/// `MIME-Version`/`Content-Type` lines.
pub trait BodySigner: Send + Sync {
    /// Signs `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Signing`] if signing fails.
    fn sign(&self, entity: &str) -> Result<SignedEntity>;
}
