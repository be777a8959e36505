//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 header encoding and the
//! transfer-encoding selection rules applied to message bodies.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::fmt::Write as _;

/// Line terminator used for everything the composer emits.
pub const CRLF: &str = "\r\n";

/// Recommended maximum line length (RFC 2045 section 6.7/6.8).
pub const LINE_LENGTH: usize = 76;

/// Hard limit for a physical line, excluding CRLF (RFC 5322 section 2.1.1).
pub const MAX_LINE_LENGTH: usize = 998;

/// Content transfer encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[cfg_attr(feature = "serde", serde(rename = "7bit"))]
    SevenBit,
    /// 8-bit text.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "8bit"))]
    EightBit,
    /// Base64 encoding.
    #[cfg_attr(feature = "serde", serde(rename = "base64"))]
    Base64,
    /// Quoted-Printable encoding.
    #[cfg_attr(feature = "serde", serde(rename = "quoted-printable"))]
    QuotedPrintable,
    /// Binary (no encoding).
    #[cfg_attr(feature = "serde", serde(rename = "binary"))]
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }

    /// Returns the header token for this encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if the text contains any byte outside 7-bit ASCII.
#[must_use]
pub fn has_8bit(text: &str) -> bool {
    text.bytes().any(|b| b >= 0x80)
}

/// Returns true if any physical line of `text` is longer than `max` bytes.
///
/// Both CRLF and bare LF are treated as line breaks.
#[must_use]
pub fn has_line_longer_than(text: &str, max: usize) -> bool {
    text.split('\n')
        .any(|line| line.strip_suffix('\r').unwrap_or(line).len() > max)
}

/// Picks the transfer encoding for a text body.
///
/// An 8-bit request is downgraded to 7-bit when the body is pure ASCII, and
/// any request other than Base64 becomes Quoted-Printable when a line would
/// break the 998 character limit.
#[must_use]
pub fn select_body_encoding(body: &str, requested: TransferEncoding) -> TransferEncoding {
    let mut encoding = requested;
    if encoding == TransferEncoding::EightBit && !has_8bit(body) {
        encoding = TransferEncoding::SevenBit;
    }
    if requested != TransferEncoding::Base64 && has_line_longer_than(body, MAX_LINE_LENGTH) {
        encoding = TransferEncoding::QuotedPrintable;
    }
    encoding
}

/// Converts CRLF, CR and LF line breaks to CRLF.
#[must_use]
pub fn normalize_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 32);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str(CRLF);
            }
            '\n' => out.push_str(CRLF),
            _ => out.push(c),
        }
    }
    out
}

/// Encodes a payload with the given transfer encoding.
///
/// 7bit/8bit text is line-normalized and terminated with CRLF; Base64 is
/// wrapped at 76 columns.
///
/// # Errors
///
/// Returns an error if a binary or 7/8bit payload is not valid UTF-8.
pub fn encode_payload(data: &[u8], encoding: TransferEncoding) -> Result<String> {
    match encoding {
        TransferEncoding::Base64 => Ok(encode_base64_wrapped(data)),
        TransferEncoding::QuotedPrintable => Ok(encode_quoted_printable(data)),
        TransferEncoding::SevenBit | TransferEncoding::EightBit => {
            let text = std::str::from_utf8(data).map_err(|e| {
                Error::InvalidEncoding(format!("{encoding} payload is not text: {e}"))
            })?;
            let mut encoded = normalize_breaks(text);
            if !encoded.ends_with(CRLF) {
                encoded.push_str(CRLF);
            }
            Ok(encoded)
        }
        TransferEncoding::Binary => String::from_utf8(data.to_vec()).map_err(|e| {
            Error::InvalidEncoding(format!("binary payload cannot be carried as text: {e}"))
        }),
    }
}

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 split into CRLF-terminated 76 character lines.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_LENGTH * 2 + 2);
    for chunk in encoded.as_bytes().chunks(LINE_LENGTH) {
        // Base64 output is pure ASCII.
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str(CRLF);
    }
    out
}

/// Decodes Base64 data, ignoring embedded line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Encodes bytes using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input become hard CRLF breaks; long lines get soft
/// breaks so no encoded line exceeds 76 characters, and an escape sequence is
/// never split across a soft break.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 3 / 2);
    let normalized = normalize_bytes(data);
    let lines: Vec<&[u8]> = normalized.split(|&b| b == b'\n').collect();

    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            result.push_str(CRLF);
        }

        let mut line_length = 0;
        for (pos, byte) in line.iter().enumerate() {
            let last = pos + 1 == line.len();
            let mut token = String::with_capacity(3);
            match byte {
                // Whitespace at the end of a line would be stripped in transit
                b' ' | b'\t' if last => {
                    let _ = write!(token, "={byte:02X}");
                }
                b' ' | b'\t' | b'!'..=b'<' | b'>'..=b'~' => token.push(char::from(*byte)),
                _ => {
                    let _ = write!(token, "={byte:02X}");
                }
            }

            // Leave room for the trailing '=' of a soft break
            if line_length + token.len() > LINE_LENGTH - 1 {
                result.push('=');
                result.push_str(CRLF);
                line_length = 0;
            }
            result.push_str(&token);
            line_length += token.len();
        }
    }

    result
}

fn normalize_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == b'\r' {
            if iter.peek() == Some(&&b'\n') {
                iter.next();
            }
            out.push(b'\n');
        } else {
            out.push(b);
        }
    }
    out
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences or does
/// not decode to UTF-8.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let mut result = Vec::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break
        if bytes.get(i + 1..i + 3) == Some(b"\r\n".as_slice()) {
            i += 3;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }

        let hex = bytes
            .get(i + 1..i + 3)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let hex = std::str::from_utf8(hex)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        let byte = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(byte);
        i += 3;
    }

    String::from_utf8(result).map_err(Into::into)
}

/// Where in a header an encoded value will be placed.
///
/// Phrases (display names) have a stricter set of characters that may appear
/// unquoted than unstructured text such as a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPosition {
    /// Unstructured text (Subject, custom headers).
    Text,
    /// A phrase (display name, filename parameter).
    Phrase,
}

/// Maximum length of a single RFC 2047 encoded word.
const ENCODED_WORD_MAX: usize = 75;

/// Removes CR and LF from a header value and trims it.
#[must_use]
pub fn secure_header(value: &str) -> String {
    value.replace(['\r', '\n'], "").trim().to_string()
}

/// Encodes a header value per RFC 2047 when necessary.
///
/// Pure ASCII values are returned as-is (phrases are quoted when they contain
/// specials). Anything else is converted into encoded words using whichever of
/// Q or B encoding produces the shorter result; multiple words are folded
/// onto continuation lines.
#[must_use]
pub fn encode_header(value: &str, charset: &str, position: HeaderPosition) -> String {
    if !has_8bit(value) && !value.bytes().any(|b| (b < 0x20 && b != b'\t') || b == 0x7f) {
        return match position {
            HeaderPosition::Phrase => quote_phrase(value),
            HeaderPosition::Text => {
                if value
                    .split_whitespace()
                    .any(|word| word.len() > MAX_LINE_LENGTH - 100)
                {
                    encode_words_b(value, charset).join("\r\n ")
                } else {
                    value.to_string()
                }
            }
        };
    }

    let q = encode_words_q(value, charset).join("\r\n ");
    let b = encode_words_b(value, charset).join("\r\n ");
    if b.len() < q.len() { b } else { q }
}

/// Quotes a phrase if it contains characters outside RFC 5322 atext.
fn quote_phrase(value: &str) -> String {
    let is_atext = |c: char| {
        c.is_ascii_alphanumeric() || " !#$%&'*+-/=?^_`{|}~".contains(c)
    };
    if value.chars().all(is_atext) {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Q-encodes text into encoded words of at most 75 characters.
///
/// Characters are never split across words.
#[must_use]
pub fn encode_words_q(text: &str, charset: &str) -> Vec<String> {
    let budget = ENCODED_WORD_MAX.saturating_sub(7 + charset.len());
    let mut words = Vec::new();
    let mut current = String::new();
    let mut buf = [0u8; 4];

    for c in text.chars() {
        let mut token = String::new();
        if c == ' ' {
            token.push('_');
        } else if c.is_ascii_alphanumeric() || "!*+-/".contains(c) {
            token.push(c);
        } else {
            for byte in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(token, "={byte:02X}");
            }
        }
        if !current.is_empty() && current.len() + token.len() > budget {
            words.push(format!("=?{charset}?Q?{current}?="));
            current.clear();
        }
        current.push_str(&token);
    }
    if !current.is_empty() || words.is_empty() {
        words.push(format!("=?{charset}?Q?{current}?="));
    }
    words
}

/// B-encodes text into encoded words of at most 75 characters.
///
/// Characters are never split across words.
#[must_use]
pub fn encode_words_b(text: &str, charset: &str) -> Vec<String> {
    let budget = ENCODED_WORD_MAX.saturating_sub(7 + charset.len());
    let max_bytes = budget / 4 * 3;
    let mut words = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4];

    for c in text.chars() {
        let bytes = c.encode_utf8(&mut buf).as_bytes();
        if !current.is_empty() && current.len() + bytes.len() > max_bytes {
            words.push(format!("=?{charset}?B?{}?=", STANDARD.encode(&current)));
            current.clear();
        }
        current.extend_from_slice(bytes);
    }
    if !current.is_empty() || words.is_empty() {
        words.push(format!("=?{charset}?B?{}?=", STANDARD.encode(&current)));
    }
    words
}

/// Decodes an RFC 2047 encoded header value (one or more encoded words).
///
/// # Errors
///
/// Returns an error if an encoded word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut out = String::new();
    for word in text.split_whitespace() {
        if !word.starts_with("=?") || !word.ends_with("?=") {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
            continue;
        }

        let inner = &word[2..word.len() - 2];
        let parts: Vec<&str> = inner.split('?').collect();
        if parts.len() != 3 {
            return Err(Error::InvalidEncoding("Invalid RFC 2047 format".to_string()));
        }

        match parts[1].to_uppercase().as_str() {
            "B" => out.push_str(&String::from_utf8(decode_base64(parts[2])?)?),
            "Q" => out.push_str(&decode_quoted_printable(&parts[2].replace('_', " "))?),
            other => {
                return Err(Error::InvalidEncoding(format!("Unknown encoding: {other}")));
            }
        }
    }
    Ok(out)
}

/// Formats a parameter value, quoting it when it contains RFC 2183 specials.
#[must_use]
pub fn parameter_value(value: &str) -> String {
    if value.contains(|c: char| " ()<>@,;:\\\"/[]?=".contains(c)) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_wrapped_lines() {
        let data = vec![0xABu8; 200];
        let encoded = encode_base64_wrapped(&data);
        for line in encoded.split(CRLF).filter(|l| !l.is_empty()) {
            assert!(line.len() <= LINE_LENGTH);
        }
        assert!(encoded.ends_with(CRLF));
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_quoted_printable_encode() {
        let encoded = encode_quoted_printable(b"Hello, World!");
        assert_eq!(encoded, "Hello, World!");

        let encoded = encode_quoted_printable("Héllo, Wørld!".as_bytes());
        assert!(encoded.contains("=C3=A9"));
    }

    #[test]
    fn test_quoted_printable_keeps_hard_breaks() {
        let encoded = encode_quoted_printable(b"one\r\ntwo\nthree");
        assert_eq!(encoded, "one\r\ntwo\r\nthree");
    }

    #[test]
    fn test_quoted_printable_trailing_space() {
        let encoded = encode_quoted_printable(b"trailing \r\nnext");
        assert_eq!(encoded, "trailing=20\r\nnext");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let long = "é".repeat(100);
        let encoded = encode_quoted_printable(long.as_bytes());
        for line in encoded.split(CRLF) {
            assert!(line.len() <= LINE_LENGTH, "line too long: {line}");
            // An escape is never cut in half
            let body = line.strip_suffix('=').unwrap_or(line);
            assert_eq!(body.len() % 3, 0);
        }
        assert_eq!(decode_quoted_printable(&encoded).unwrap(), long);
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable("Hello, World!").unwrap(), "Hello, World!");
        assert_eq!(decode_quoted_printable("H=C3=A9llo").unwrap(), "Héllo");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        let decoded = decode_quoted_printable("Hello=\r\nWorld").unwrap();
        assert_eq!(decoded, "HelloWorld");
    }

    #[test]
    fn test_select_encoding_downgrades_ascii() {
        assert_eq!(
            select_body_encoding("plain ascii", TransferEncoding::EightBit),
            TransferEncoding::SevenBit
        );
        assert_eq!(
            select_body_encoding("naïve", TransferEncoding::EightBit),
            TransferEncoding::EightBit
        );
    }

    #[test]
    fn test_select_encoding_long_lines() {
        let body = format!("short\n{}", "é".repeat(600));
        assert_eq!(
            select_body_encoding(&body, TransferEncoding::EightBit),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(
            select_body_encoding(&body, TransferEncoding::Base64),
            TransferEncoding::Base64
        );
    }

    #[test]
    fn test_encode_payload_terminates_text() {
        let encoded = encode_payload(b"line one\nline two", TransferEncoding::SevenBit).unwrap();
        assert_eq!(encoded, "line one\r\nline two\r\n");
    }

    #[test]
    fn test_encode_header_ascii_untouched() {
        assert_eq!(encode_header("Hello", "utf-8", HeaderPosition::Text), "Hello");
    }

    #[test]
    fn test_encode_header_phrase_quoting() {
        assert_eq!(encode_header("John Doe", "utf-8", HeaderPosition::Phrase), "John Doe");
        assert_eq!(
            encode_header("Doe, John", "utf-8", HeaderPosition::Phrase),
            "\"Doe, John\""
        );
        assert_eq!(
            encode_header("Say \"hi\"", "utf-8", HeaderPosition::Phrase),
            "\"Say \\\"hi\\\"\""
        );
    }

    #[test]
    fn test_encode_header_picks_shorter() {
        // Mostly ASCII favours Q
        let mostly_ascii = encode_header("Héllo there, how are you", "utf-8", HeaderPosition::Text);
        assert!(mostly_ascii.starts_with("=?utf-8?Q?"));

        // Mostly non-ASCII favours B
        let cyrillic = encode_header("Привет мир", "utf-8", HeaderPosition::Text);
        assert!(cyrillic.starts_with("=?utf-8?B?"));

        assert_eq!(decode_rfc2047(&mostly_ascii).unwrap(), "Héllo there, how are you");
        assert_eq!(decode_rfc2047(&cyrillic).unwrap(), "Привет мир");
    }

    #[test]
    fn test_encoded_words_length() {
        let long = "日本語のテキスト".repeat(10);
        for word in encode_words_b(&long, "utf-8")
            .into_iter()
            .chain(encode_words_q(&long, "utf-8"))
        {
            assert!(word.len() <= 75, "{word}");
        }
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap(), "Héllo");
    }

    #[test]
    fn test_secure_header() {
        assert_eq!(secure_header(" Subject\r\nBcc: evil@example.com "), "SubjectBcc: evil@example.com");
    }

    #[test]
    fn test_parameter_value() {
        assert_eq!(parameter_value("report.pdf"), "report.pdf");
        assert_eq!(parameter_value("annual report.pdf"), "\"annual report.pdf\"");
        assert_eq!(parameter_value("a=b.txt"), "\"a=b.txt\"");
    }

    proptest! {
        #[test]
        fn prop_ascii_bodies_never_base64(body in "[ -~\n]{0,400}") {
            let encoding = select_body_encoding(&body, TransferEncoding::EightBit);
            prop_assert_ne!(encoding, TransferEncoding::Base64);
            prop_assert_eq!(encoding, TransferEncoding::SevenBit);
        }

        #[test]
        fn prop_eight_bit_unless_long_line(body in "[a-zé \n]{1,300}", long in proptest::bool::ANY) {
            let body = if long { format!("{body}{}", "é".repeat(500)) } else { body };
            let first = select_body_encoding(&body, TransferEncoding::EightBit);
            let expected = if has_line_longer_than(&body, MAX_LINE_LENGTH) {
                TransferEncoding::QuotedPrintable
            } else if has_8bit(&body) {
                TransferEncoding::EightBit
            } else {
                TransferEncoding::SevenBit
            };
            prop_assert_eq!(first, expected);
            prop_assert_eq!(select_body_encoding(&body, TransferEncoding::EightBit), first);
        }

        #[test]
        fn prop_quoted_printable_roundtrip(text in "\\PC{0,200}") {
            let encoded = encode_quoted_printable(text.as_bytes());
            let decoded = decode_quoted_printable(&encoded).unwrap();
            prop_assert_eq!(decoded, text);
        }
    }
}
