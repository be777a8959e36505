//! Preparing a message for transmission after `DATA`.
//!
//! Line endings are normalized to CRLF, physical lines longer than 998
//! octets are split (at the last space that fits, or hard at 997), header
//! continuation pieces are folded with a leading tab, and lines beginning
//! with `.` are dot-stuffed (RFC 5321 section 4.5.2).

/// Longest line, excluding CRLF, an SMTP server has to accept.
pub const MAX_LINE_LENGTH: usize = 998;

/// Transmission-ready lines of `message`, without line terminators.
///
/// A single trailing line break does not produce an extra empty line.
#[must_use]
pub fn prepare_lines(message: &str) -> Vec<String> {
    let normalized = message.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<&str> = normalized.split('\n').collect();
    if lines.len() > 1 && lines.last() == Some(&"") {
        lines.pop();
    }

    // Only fold as headers if the first line looks like `Name: value`
    let mut in_headers = lines
        .first()
        .and_then(|line| line.split_once(':'))
        .is_some_and(|(field, _)| !field.is_empty() && !field.contains(' '));

    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        if in_headers && line.is_empty() {
            in_headers = false;
        }
        for piece in split_long_line(line, in_headers) {
            out.push(dot_stuff(&piece));
        }
    }
    out
}

/// Full DATA payload: prepared lines joined with CRLF plus the `.`
/// terminator line.
#[must_use]
pub fn encode(message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(message.len() + 16);
    for line in prepare_lines(message) {
        buf.extend_from_slice(line.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b".\r\n");
    buf
}

/// Doubles a leading dot.
#[must_use]
pub fn dot_stuff(line: &str) -> String {
    if line.starts_with('.') {
        format!(".{line}")
    } else {
        line.to_string()
    }
}

fn split_long_line(line: &str, in_headers: bool) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = line.to_string();
    while rest.len() > MAX_LINE_LENGTH {
        let window = floor_char_boundary(&rest, MAX_LINE_LENGTH);
        let (head, tail) = match rest[..window].rfind(' ') {
            Some(pos) if pos > 0 => (rest[..pos].to_string(), rest[pos + 1..].to_string()),
            _ => {
                let cut = floor_char_boundary(&rest, MAX_LINE_LENGTH - 1);
                (rest[..cut].to_string(), rest[cut..].to_string())
            }
        };
        pieces.push(head);
        rest = if in_headers { format!("\t{tail}") } else { tail };
    }
    pieces.push(rest);
    pieces
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn unstuff(line: &str) -> &str {
        line.strip_prefix('.').filter(|rest| rest.starts_with('.')).unwrap_or(line)
    }

    #[test]
    fn test_normalizes_line_endings() {
        let lines = prepare_lines("Subject: x\r\n\r\na\rb\nc\r\n");
        assert_eq!(lines, vec!["Subject: x", "", "a", "b", "c"]);
    }

    #[test]
    fn test_dot_stuffing() {
        let lines = prepare_lines("Subject: x\r\n\r\n.\r\n..two\r\nplain.\r\n");
        assert_eq!(lines, vec!["Subject: x", "", "..", "...two", "plain."]);
    }

    #[test]
    fn test_encode_terminates() {
        assert_eq!(encode("Subject: x\r\n\r\nhi\r\n"), b"Subject: x\r\n\r\nhi\r\n.\r\n");
        assert_eq!(encode(""), b"\r\n.\r\n");
    }

    #[test]
    fn test_long_body_line_split_at_space() {
        let line = format!("{} {}", "a".repeat(990), "b".repeat(20));
        let lines = prepare_lines(&format!("Subject: x\r\n\r\n{line}"));
        assert_eq!(lines[2], "a".repeat(990));
        assert_eq!(lines[3], "b".repeat(20));
    }

    #[test]
    fn test_long_line_without_space_split_hard() {
        let line = "z".repeat(2000);
        let lines = prepare_lines(&line);
        assert_eq!(lines[0].len(), MAX_LINE_LENGTH - 1);
        assert_eq!(lines[1].len(), MAX_LINE_LENGTH - 1);
        assert_eq!(lines[2].len(), 2000 - 2 * (MAX_LINE_LENGTH - 1));
    }

    #[test]
    fn test_long_header_continuation_is_folded() {
        let value = format!("{} {}", "a".repeat(995), "tail");
        let lines = prepare_lines(&format!("X-Long: {value}\r\n\r\nbody"));
        assert!(lines[0].len() <= MAX_LINE_LENGTH);
        assert!(lines[1].starts_with('\t'));
        assert_eq!(lines.last().unwrap(), "body");
    }

    #[test]
    fn test_split_respects_utf8() {
        let line = "é".repeat(600);
        for piece in prepare_lines(&line) {
            assert!(piece.len() <= MAX_LINE_LENGTH);
        }
    }

    proptest! {
        #[test]
        fn prop_lines_fit_and_unstuff(body in "[a-z .\n]{0,3000}") {
            let message = format!("Subject: t\r\n\r\n{body}");
            for line in prepare_lines(&message) {
                prop_assert!(line.len() <= MAX_LINE_LENGTH + 1);
                prop_assert!(!line.starts_with('.') || line.starts_with(".."));
            }
        }

        #[test]
        fn prop_dot_stuffing_round_trips(line in "\\.{0,3}[a-z ]{0,40}") {
            let stuffed = dot_stuff(&line);
            prop_assert_eq!(unstuff(&stuffed), line.as_str());
        }
    }
}
