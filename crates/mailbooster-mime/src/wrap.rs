//! Word wrapping for plain-text bodies.

use crate::encoding::CRLF;

/// Wraps `text` so no line exceeds `width` characters.
///
/// Lines are broken at spaces; words longer than `width` are split on
/// character boundaries so multi-byte characters stay whole. In
/// `quoted_printable` mode an `=XX` escape is never split and hard splits end
/// with a soft line break (`=`). A width of 0 disables wrapping.
///
/// Output lines are joined with CRLF. Wrapping already-wrapped text at the
/// same width returns it unchanged.
#[must_use]
pub fn wrap_text(text: &str, width: usize, quoted_printable: bool) -> String {
    if width == 0 {
        return text.to_string();
    }

    let mut lines = Vec::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        wrap_line(line, width, quoted_printable, &mut lines);
    }
    lines.join(CRLF)
}

fn wrap_line(line: &str, width: usize, quoted_printable: bool, out: &mut Vec<String>) {
    if line.chars().count() <= width {
        out.push(line.to_string());
        return;
    }

    let mut current = String::new();
    let mut current_length = 0;
    let mut started = false;

    for word in line.split(' ') {
        let word_length = word.chars().count();
        if started {
            if current_length + 1 + word_length <= width {
                current.push(' ');
                current.push_str(word);
                current_length += 1 + word_length;
                continue;
            }
            out.push(std::mem::take(&mut current));
        }
        started = true;

        if word_length <= width {
            current = word.to_string();
            current_length = word_length;
            continue;
        }

        let mut pieces = split_word(word, width, quoted_printable);
        let last = pieces.pop().unwrap_or_default();
        out.extend(pieces);
        current_length = last.chars().count();
        current = last;
    }

    out.push(current);
}

/// Splits an over-long word into pieces of at most `width` characters.
fn split_word(word: &str, width: usize, quoted_printable: bool) -> Vec<String> {
    // Keep `=XX` escapes together in quoted-printable mode
    let mut units: Vec<&str> = Vec::new();
    let mut rest = word;
    while let Some(c) = rest.chars().next() {
        let escape = quoted_printable
            && c == '='
            && rest.len() >= 3
            && rest.as_bytes()[1..3].iter().all(u8::is_ascii_hexdigit);
        let take = if escape { 3 } else { c.len_utf8() };
        units.push(&rest[..take]);
        rest = &rest[take..];
    }

    // Hard splits in QP mode need room for the soft break marker
    let limit = if quoted_printable {
        width.saturating_sub(1).max(3)
    } else {
        width
    };

    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_length = 0;
    for unit in units {
        let unit_length = unit.chars().count();
        if piece_length + unit_length > limit && !piece.is_empty() {
            if quoted_printable {
                piece.push('=');
            }
            pieces.push(std::mem::take(&mut piece));
            piece_length = 0;
        }
        piece.push_str(unit);
        piece_length += unit_length;
    }
    pieces.push(piece);
    pieces
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
    use proptest::prelude::*;

    #[test]
    fn test_zero_width_is_noop() {
        let text = "a very long line that would otherwise be wrapped\nsecond";
        assert_eq!(wrap_text(text, 0, false), text);
    }

    #[test]
    fn test_wraps_at_spaces() {
        let wrapped = wrap_text("the quick brown fox jumps", 10, false);
        assert_eq!(wrapped, "the quick\r\nbrown fox\r\njumps");
    }

    #[test]
    fn test_short_lines_untouched() {
        assert_eq!(wrap_text("short\nlines", 20, false), "short\r\nlines");
    }

    #[test]
    fn test_long_word_split_on_chars() {
        let wrapped = wrap_text("ééééééé", 3, false);
        assert_eq!(wrapped, "ééé\r\nééé\r\né");
    }

    #[test]
    fn test_quoted_printable_escape_kept_whole() {
        let wrapped = wrap_text("abc=C3=A9def", 5, true);
        for line in wrapped.split(CRLF) {
            let body = line.strip_suffix('=').unwrap_or(line);
            // No dangling partial escape at a line end
            assert!(!body.ends_with("=C") && !body.ends_with("=A"), "{line}");
        }
        assert_eq!(wrapped.replace("=\r\n", ""), "abc=C3=A9def");
    }

    proptest! {
        #[test]
        fn prop_wrap_idempotent(text in "[a-zé ]{0,200}(\n[a-zé ]{0,80}){0,3}", width in 1usize..60) {
            let once = wrap_text(&text, width, false);
            let twice = wrap_text(&once, width, false);
            prop_assert_eq!(&once, &twice);
            for line in once.split(CRLF) {
                prop_assert!(line.chars().count() <= width);
            }
        }
    }
}
