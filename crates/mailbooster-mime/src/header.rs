//! Ordered header block.

use crate::encoding::{CRLF, LINE_LENGTH};
use crate::error::{Error, Result};
use std::fmt;

/// Header names the composer manages itself; callers may not add them as
/// custom headers.
pub const RESERVED_HEADERS: &[&str] = &[
    "date",
    "from",
    "to",
    "cc",
    "bcc",
    "reply-to",
    "subject",
    "message-id",
    "mime-version",
    "content-type",
    "content-transfer-encoding",
    "dkim-signature",
];

/// Collection of email headers, kept in insertion order.
///
/// Names keep the case they were added with; lookups are case-insensitive.
/// Values are stored as they will be emitted, including any folding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a header.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Sets a header value, replacing any existing values.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Returns an iterator over all headers in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of header lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses headers from raw text, unfolding continuation lines.
    ///
    /// Parsing stops at the first empty line.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-continuation line has no colon.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = current.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::InvalidHeader(line.to_string()))?;
            current = Some((name.trim().to_string(), value.trim().to_string()));
        }

        if let Some((name, value)) = current {
            headers.add(name, value);
        }

        Ok(headers)
    }
}

/// Validates a custom header name (printable ASCII, no colon or space).
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] for malformed or composer-managed names.
pub fn validate_custom_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| (0x21..=0x7e).contains(&b) && b != b':');
    if !valid {
        return Err(Error::InvalidHeader(format!("malformed header name {name:?}")));
    }
    if RESERVED_HEADERS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
    {
        return Err(Error::InvalidHeader(format!(
            "{name} is set by the composer and cannot be overridden"
        )));
    }
    Ok(())
}

/// Folds an unstructured header value at spaces so lines stay near 76
/// columns. Values that already contain line breaks are returned unchanged.
#[must_use]
pub fn fold_unstructured(name: &str, value: &str) -> String {
    if value.contains(CRLF) || name.len() + 2 + value.len() <= LINE_LENGTH {
        return value.to_string();
    }

    let mut folded = String::with_capacity(value.len() + 16);
    let mut line_length = name.len() + 2;
    for (index, word) in value.split(' ').enumerate() {
        if index > 0 {
            if line_length + 1 + word.len() > LINE_LENGTH && line_length > 1 {
                folded.push_str(CRLF);
                line_length = 0;
            }
            folded.push(' ');
            line_length += 1;
        }
        folded.push_str(word);
        line_length += word.len();
    }
    folded
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}{CRLF}")?;
        }
        Ok(())
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

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_headers_set_replaces() {
        let mut headers = Headers::new();
        headers.add("X-Tag", "one");
        headers.add("X-Tag", "two");
        assert_eq!(headers.get_all("x-tag").len(), 2);

        headers.set("X-Tag", "three");
        assert_eq!(headers.get_all("X-Tag"), vec!["three"]);
    }

    #[test]
    fn test_headers_keep_order() {
        let mut headers = Headers::new();
        headers.add("Date", "now");
        headers.add("To", "b@y.com");
        headers.add("From", "a@x.com");
        assert_eq!(headers.to_string(), "Date: now\r\nTo: b@y.com\r\nFrom: a@x.com\r\n");
    }

    #[test]
    fn test_headers_parse_unfolds() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: multipart/mixed;\r\n",
            "\tboundary=\"b1_abc\"\r\n",
            "\r\n",
            "body"
        );

        let headers = Headers::parse(text).unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("content-type"),
            Some("multipart/mixed; boundary=\"b1_abc\"")
        );
    }

    #[test]
    fn test_headers_parse_rejects_garbage() {
        assert!(Headers::parse("not a header\r\n").is_err());
    }

    #[test]
    fn test_fold_unstructured() {
        let value = "word ".repeat(40);
        let value = value.trim_end();
        let folded = fold_unstructured("Subject", value);
        let line = format!("Subject: {folded}");
        for physical in line.split("\r\n") {
            assert!(physical.len() <= LINE_LENGTH, "{physical}");
        }
        // Unfolding restores the original value
        assert_eq!(folded.replace("\r\n", ""), value);
        assert_eq!(fold_unstructured("Subject", "short"), "short");
    }

    #[test]
    fn test_custom_header_names() {
        assert!(validate_custom_name("X-Campaign").is_ok());
        assert!(validate_custom_name("Bad Name").is_err());
        assert!(validate_custom_name("X:Y").is_err());
        assert!(validate_custom_name("subject").is_err());
    }
}
