//! MIME content type handling.

use crate::encoding::parameter_value;
use crate::error::{Error, Result};
use std::fmt;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters in emission order (e.g., charset, boundary, name).
    pub parameters: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: Vec::new(),
        }
    }

    /// Creates a text/plain content type with the given charset.
    #[must_use]
    pub fn text_plain(charset: &str) -> Self {
        Self::new("text", "plain").with_parameter("charset", charset)
    }

    /// Creates a text/html content type with the given charset.
    #[must_use]
    pub fn text_html(charset: &str) -> Self {
        Self::new("text", "html").with_parameter("charset", charset)
    }

    /// Creates a `multipart/<subtype>` content type with boundary.
    #[must_use]
    pub fn multipart(sub_type: &str, boundary: impl Into<String>) -> Self {
        Self::new("multipart", sub_type).with_parameter("boundary", boundary)
    }

    /// Creates the default attachment type, `application/octet-stream`.
    #[must_use]
    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    /// Adds or replaces a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.parameters.retain(|(k, _)| !k.eq_ignore_ascii_case(&key));
        self.parameters.push((key, value.into()));
        self
    }

    /// Returns a parameter value by name.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// Returns the `type/subtype` essence without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2=value2`
    ///
    /// # Errors
    ///
    /// Returns an error if the type or subtype is missing or malformed.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split(';');

        let type_str = parts.next().unwrap_or_default().trim();
        let (main_type, sub_type) = type_str
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype in {s:?}")))?;
        let is_token = |t: &str| {
            !t.is_empty()
                && t.bytes()
                    .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b))
        };
        let (main_type, sub_type) = (main_type.trim(), sub_type.trim());
        if !is_token(main_type) || !is_token(sub_type) {
            return Err(Error::InvalidContentType(s.to_string()));
        }

        let mut content_type = Self::new(main_type.to_lowercase(), sub_type.to_lowercase());
        for param in parts {
            if let Some((key, value)) = param.trim().split_once('=') {
                content_type = content_type
                    .with_parameter(key.trim().to_lowercase(), value.trim().trim_matches('"'));
            }
        }

        Ok(content_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let main = &self.main_type;
        let sub = &self.sub_type;
        write!(f, "{main}/{sub}")?;

        for (key, value) in &self.parameters {
            // Boundaries are always quoted
            if key == "boundary" {
                write!(f, "; {key}=\"{value}\"")?;
            } else {
                write!(f, "; {key}={}", parameter_value(value))?;
            }
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
    fn test_text_plain() {
        let ct = ContentType::text_plain("utf-8");
        assert_eq!(ct.essence(), "text/plain");
        assert_eq!(ct.charset(), Some("utf-8"));
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_multipart() {
        let ct = ContentType::multipart("mixed", "b1_123");
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("b1_123"));
        assert_eq!(ct.to_string(), "multipart/mixed; boundary=\"b1_123\"");
    }

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("Text/Plain; charset=utf-8").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.charset(), Some("utf-8"));
    }

    #[test]
    fn test_content_type_parse_quoted() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part_123\"").unwrap();
        assert_eq!(ct.boundary(), Some("----=_Part_123"));
    }

    #[test]
    fn test_content_type_parse_invalid() {
        assert!(ContentType::parse("pdf").is_err());
        assert!(ContentType::parse("application/").is_err());
        assert!(ContentType::parse("a b/c").is_err());
    }

    #[test]
    fn test_name_parameter_quoting() {
        let ct = ContentType::new("application", "pdf").with_parameter("name", "my report.pdf");
        assert_eq!(ct.to_string(), "application/pdf; name=\"my report.pdf\"");
    }
}
