//! Envelope address type.

use crate::error::{Error, Result};

/// Address used in `MAIL FROM` / `RCPT TO`.
///
/// Only the checks needed to keep the command line well formed are applied
/// here; full syntax validation happens when the message is composed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is empty, has no `@` separating a
    /// local part from a domain, or contains characters that would break
    /// the command line.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// The null reverse-path (`MAIL FROM:<>`), used for bounces.
    #[must_use]
    pub const fn null() -> Self {
        Self(String::new())
    }

    /// Returns true for the null reverse-path.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if let Some(c) = addr
            .chars()
            .find(|c| c.is_control() || c.is_whitespace() || matches!(c, '<' | '>'))
        {
            return Err(Error::InvalidAddress(format!(
                "{addr:?} contains forbidden character {c:?}"
            )));
        }

        match addr.rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            Some(_) => Err(Error::InvalidAddress(format!(
                "{addr}: local and domain parts cannot be empty"
            ))),
            None => Err(Error::InvalidAddress(format!("{addr}: missing @"))),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
