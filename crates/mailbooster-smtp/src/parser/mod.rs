//! SMTP response parser.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses an SMTP reply from response lines.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK\r\n`
/// - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
///
/// # Errors
///
/// Returns an error if the reply is malformed.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("Empty reply".into()));
    };

    let code = parse_code(first)?;

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        if parse_code(line)? != code {
            return Err(Error::Protocol(format!(
                "Reply code changed mid-reply: {line}"
            )));
        }
        match line.get(4..) {
            Some(text) => message.push(text.to_string()),
            None if line.len() == 3 => message.push(String::new()),
            None => return Err(Error::Protocol(format!("Malformed reply line: {line}"))),
        }
    }

    Ok(Reply::new(ReplyCode::new(code), message))
}

fn parse_code(line: &str) -> Result<u16> {
    let code_str = line
        .get(0..3)
        .ok_or_else(|| Error::Protocol(format!("Reply too short: {line}")))?;
    if !code_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Protocol(format!("Invalid reply code: {code_str}")));
    }
    code_str
        .parse::<u16>()
        .map_err(|_| Error::Protocol(format!("Invalid reply code: {code_str}")))
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Multi-line replies use `-` separator for continuation and ` ` for the last line.
/// A bare three-digit code also ends the reply.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    match line.as_bytes().get(3) {
        Some(b) => *b == b' ',
        None => line.len() == 3,
    }
}

#[allow(clippy::expect_used)] // patterns are literals
static TRANSACTION_ID_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        // exim
        Regex::new(r"[0-9]{3} OK id=(.*)").expect("exim pattern"),
        // sendmail
        Regex::new(r"[0-9]{3} 2\.0\.0 (.*) Message").expect("sendmail pattern"),
        // postfix
        Regex::new(r"[0-9]{3} 2\.0\.0 Ok: queued as (.*)").expect("postfix pattern"),
    ]
});

/// Extracts the MTA's queue/transaction identifier from the reply to the
/// end of DATA.
///
/// Recognizes exim, sendmail and postfix reply formats. Returns `None` when
/// the server uses some other wording.
#[must_use]
pub fn transaction_id(reply: &Reply) -> Option<String> {
    reply.raw_lines().find_map(|line| {
        TRANSACTION_ID_PATTERNS.iter().find_map(|pattern| {
            pattern
                .captures(&line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|id| !id.is_empty())
        })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn reply(lines: &[&str]) -> Reply {
        let lines: Vec<String> = lines.iter().map(ToString::to_string).collect();
        parse_reply(&lines).unwrap()
    }

    #[test]
    fn test_parse_single_line_reply() {
        let reply = reply(&["250 OK"]);
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(reply.message, vec!["OK"]);
        assert!(reply.is_success());
    }

    #[test]
    fn test_parse_multi_line_reply() {
        let reply = reply(&["250-smtp.example.com", "250-", "250 8BITMIME"]);
        assert_eq!(reply.message, vec!["smtp.example.com", "", "8BITMIME"]);
    }

    #[test]
    fn test_parse_bare_code() {
        let reply = reply(&["354"]);
        assert_eq!(reply.code, ReplyCode::START_DATA);
        assert_eq!(reply.message, vec![""]);
    }

    #[test]
    fn test_parse_enhanced_code() {
        let reply = reply(&["550 5.1.1 <b@y.com>: Recipient address rejected"]);
        assert_eq!(reply.enhanced_code.unwrap().to_string(), "5.1.1");
        assert_eq!(reply.detail(), "<b@y.com>: Recipient address rejected");
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(is_last_reply_line("250"));
        assert!(!is_last_reply_line("250-Continuing"));
        assert!(!is_last_reply_line("25"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_reply(&[]).is_err());
        assert!(parse_reply(&["25".to_string()]).is_err());
        assert!(parse_reply(&["ABC OK".to_string()]).is_err());
        assert!(parse_reply(&["+25 OK".to_string()]).is_err());
        assert!(parse_reply(&["250-a".to_string(), "251 b".to_string()]).is_err());
    }

    #[test]
    fn test_transaction_id_postfix() {
        let reply = reply(&["250 2.0.0 Ok: queued as 4Bn1Xy2Zq9z3"]);
        assert_eq!(transaction_id(&reply).as_deref(), Some("4Bn1Xy2Zq9z3"));
    }

    #[test]
    fn test_transaction_id_exim() {
        let reply = reply(&["250 OK id=1pQ7aB-0004cD-Ef"]);
        assert_eq!(transaction_id(&reply).as_deref(), Some("1pQ7aB-0004cD-Ef"));
    }

    #[test]
    fn test_transaction_id_sendmail() {
        let reply = reply(&["250 2.0.0 x3VGq4Aa012345 Message accepted for delivery"]);
        assert_eq!(transaction_id(&reply).as_deref(), Some("x3VGq4Aa012345"));
    }

    #[test]
    fn test_transaction_id_absent() {
        assert_eq!(transaction_id(&reply(&["250 Accepted"])), None);
    }
}
