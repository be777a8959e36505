//! Mailbox addresses and their header rendering.

use crate::encoding::{HeaderPosition, LINE_LENGTH, encode_header, secure_header};
use crate::error::{Error, Result};
use std::fmt;

/// An email address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mailbox {
    /// The addr-spec, e.g. `user@example.com`.
    pub address: String,
    /// Optional display name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
}

impl Mailbox {
    /// Creates a mailbox without a display name.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into().trim().to_string(),
            name: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.trim().is_empty() {
            None
        } else {
            Some(name)
        };
        self
    }

    /// Returns the lower-cased address used for duplicate detection.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.address.to_lowercase()
    }

    /// Checks the address syntax.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] tagged with `kind` if the address is
    /// not a valid addr-spec.
    pub fn validate(&self, kind: &'static str) -> Result<()> {
        if is_valid_address(&self.address) {
            Ok(())
        } else {
            Err(Error::invalid_address(kind, self.address.clone()))
        }
    }

    /// Renders the mailbox for a header, encoding the display name if needed.
    #[must_use]
    pub fn format(&self, charset: &str) -> String {
        let address = secure_header(&self.address);
        match self.name.as_deref() {
            Some(name) => format!(
                "{} <{address}>",
                encode_header(&secure_header(name), charset, HeaderPosition::Phrase)
            ),
            None => address,
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format("utf-8"))
    }
}

impl From<&str> for Mailbox {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// Renders an address list header value, folding between mailboxes so
/// lines stay near 76 columns.
///
/// `name` is only used to account for the `Name: ` prefix on the first line.
#[must_use]
pub fn format_address_list(name: &str, mailboxes: &[Mailbox], charset: &str) -> String {
    let mut value = String::new();
    let mut line_length = name.len() + 2;

    for (index, mailbox) in mailboxes.iter().enumerate() {
        let formatted = mailbox.format(charset);
        let first_line = formatted.split("\r\n").next().unwrap_or_default();
        if index > 0 {
            value.push(',');
            line_length += 1;
            // Room for the separating space and a following comma
            if line_length + first_line.len() + 2 > LINE_LENGTH {
                value.push_str("\r\n ");
                line_length = 1;
            } else {
                value.push(' ');
                line_length += 1;
            }
        }
        value.push_str(&formatted);
        line_length = match formatted.rfind("\r\n") {
            Some(pos) => formatted.len() - pos - 2,
            None => line_length + formatted.len(),
        };
    }

    value
}

/// Checks whether `address` is a syntactically valid addr-spec.
///
/// Accepts dot-atom local parts and domains made of letter/digit/hyphen
/// labels (internationalized labels included) or a bracketed address
/// literal.
#[must_use]
pub fn is_valid_address(address: &str) -> bool {
    let Some((local, domain)) = address.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || domain.is_empty() || domain.len() > 253 {
        return false;
    }
    is_valid_local_part(local) && is_valid_domain(domain)
}

fn is_valid_local_part(local: &str) -> bool {
    let is_atext = |c: char| {
        c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~".contains(c) || !c.is_ascii()
    };
    local
        .split('.')
        .all(|atom| !atom.is_empty() && atom.chars().all(is_atext))
}

fn is_valid_domain(domain: &str) -> bool {
    if let Some(literal) = domain.strip_prefix('[').and_then(|d| d.strip_suffix(']')) {
        let literal = literal.strip_prefix("IPv6:").unwrap_or(literal);
        return literal.parse::<std::net::IpAddr>().is_ok();
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-')
    })
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

    #[test]
    fn test_valid_addresses() {
        assert!(is_valid_address("user@example.com"));
        assert!(is_valid_address("first.last+tag@sub.example.co.uk"));
        assert!(is_valid_address("root@localhost"));
        assert!(is_valid_address("user@[192.168.0.1]"));
        assert!(is_valid_address("user@[IPv6:::1]"));
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(!is_valid_address("plainaddress"));
        assert!(!is_valid_address("@example.com"));
        assert!(!is_valid_address("user@"));
        assert!(!is_valid_address("user..dots@example.com"));
        assert!(!is_valid_address("user@-example.com"));
        assert!(!is_valid_address("user name@example.com"));
        assert!(!is_valid_address("user@exa mple.com"));
    }

    #[test]
    fn test_validate_reports_kind() {
        let err = Mailbox::new("broken").validate("to").unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { kind: "to", .. }));
    }

    #[test]
    fn test_format_plain() {
        assert_eq!(Mailbox::new("a@x.com").format("utf-8"), "a@x.com");
    }

    #[test]
    fn test_format_with_name() {
        let mailbox = Mailbox::new("john@example.com").with_name("John Doe");
        assert_eq!(mailbox.format("utf-8"), "John Doe <john@example.com>");

        let mailbox = Mailbox::new("john@example.com").with_name("Doe, John");
        assert_eq!(mailbox.format("utf-8"), "\"Doe, John\" <john@example.com>");
    }

    #[test]
    fn test_format_encodes_non_ascii_name() {
        let mailbox = Mailbox::new("jose@example.com").with_name("José");
        let formatted = mailbox.format("utf-8");
        assert!(formatted.starts_with("=?utf-8?"));
        assert!(formatted.ends_with(" <jose@example.com>"));
    }

    #[test]
    fn test_blank_name_is_dropped() {
        let mailbox = Mailbox::new("a@x.com").with_name("  ");
        assert_eq!(mailbox.name, None);
    }

    #[test]
    fn test_address_list_folds() {
        let mailboxes: Vec<Mailbox> = (0..10)
            .map(|i| Mailbox::new(format!("recipient{i}@example.com")))
            .collect();
        let value = format_address_list("To", &mailboxes, "utf-8");
        let header = format!("To: {value}");
        for line in header.split("\r\n") {
            assert!(line.len() <= LINE_LENGTH, "{line}");
        }
        assert_eq!(value.matches('@').count(), 10);
    }
}
