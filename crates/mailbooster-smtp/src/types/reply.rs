//! SMTP reply types.

use std::fmt;

/// SMTP reply from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply message lines, without the code and separator.
    pub message: Vec<String>,
    /// RFC 3463 enhanced status code from the first line, if present.
    pub enhanced_code: Option<EnhancedCode>,
}

impl Reply {
    /// Creates a new reply, picking up an enhanced status code from the
    /// first message line.
    #[must_use]
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        let enhanced_code = message
            .first()
            .and_then(|line| EnhancedCode::parse_prefix(line))
            .filter(|enhanced| enhanced.class == code.class());
        Self {
            code,
            message,
            enhanced_code,
        }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code.is_transient()
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Returns the message text with the enhanced status code stripped.
    #[must_use]
    pub fn detail(&self) -> String {
        let text = self.message_text();
        match &self.enhanced_code {
            Some(enhanced) => text
                .strip_prefix(&enhanced.to_string())
                .map_or_else(|| text.clone(), |rest| rest.trim_start().to_string()),
            None => text,
        }
    }

    /// Returns the reply as the server sent it, one `NNN text` line each.
    pub fn raw_lines(&self) -> impl Iterator<Item = String> + '_ {
        let code = self.code;
        self.message.iter().map(move |line| format!("{code} {line}"))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message_text())
    }
}

/// Enhanced mail system status code (`class.subject.detail`, RFC 3463).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnhancedCode {
    /// Class digit (2, 4 or 5).
    pub class: u8,
    /// Subject digit.
    pub subject: u16,
    /// Detail digit.
    pub detail: u16,
}

impl EnhancedCode {
    /// Parses an enhanced status code at the start of a reply line,
    /// followed by a space or the end of the line.
    #[must_use]
    pub fn parse_prefix(line: &str) -> Option<Self> {
        let token = line.split(' ').next()?;
        let mut parts = token.split('.');
        let class = parts.next()?;
        let subject = parts.next()?;
        let detail = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        let digits = |s: &str, max: usize| {
            !s.is_empty() && s.len() <= max && s.bytes().all(|b| b.is_ascii_digit())
        };
        if !(digits(class, 1) && digits(subject, 3) && digits(detail, 3)) {
            return None;
        }

        let class: u8 = class.parse().ok()?;
        if !matches!(class, 2 | 4 | 5) {
            return None;
        }
        Some(Self {
            class,
            subject: subject.parse().ok()?,
            detail: detail.parse().ok()?,
        })
    }
}

impl fmt::Display for EnhancedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.class, self.subject, self.detail)
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the first digit of the code.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn class(self) -> u8 {
        (self.0 / 100) as u8
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Common reply codes
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 251 User not local; will forward
    pub const FORWARD: Self = Self(251);
    /// 252 Cannot verify user, but will accept message
    pub const CANNOT_VERIFY: Self = Self(252);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450 Mailbox unavailable (busy)
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 451 Local error in processing
    pub const LOCAL_ERROR: Self = Self(451);
    /// 452 Insufficient system storage
    pub const INSUFFICIENT_STORAGE: Self = Self(452);
    /// 500 Syntax error, command unrecognized
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 501 Syntax error in parameters or arguments
    pub const PARAMETER_ERROR: Self = Self(501);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 503 Bad sequence of commands
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 504 Command parameter not implemented
    pub const PARAMETER_NOT_IMPLEMENTED: Self = Self(504);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable (not found, access denied)
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 551 User not local
    pub const USER_NOT_LOCAL: Self = Self(551);
    /// 552 Exceeded storage allocation
    pub const EXCEEDED_STORAGE: Self = Self(552);
    /// 553 Mailbox name not allowed
    pub const MAILBOX_NAME_INVALID: Self = Self(553);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    mod reply_code_tests {
        use super::*;

        #[test]
        fn success_codes() {
            assert!(ReplyCode::OK.is_success());
            assert!(ReplyCode::SERVICE_READY.is_success());
            assert!(ReplyCode::AUTH_SUCCESS.is_success());
            assert!(ReplyCode::CANNOT_VERIFY.is_success());
        }

        #[test]
        fn intermediate_codes() {
            assert!(ReplyCode::AUTH_CONTINUE.is_intermediate());
            assert!(ReplyCode::START_DATA.is_intermediate());
            assert!(!ReplyCode::START_DATA.is_success());
        }

        #[test]
        fn error_classes() {
            assert!(ReplyCode::MAILBOX_BUSY.is_transient());
            assert!(ReplyCode::SERVICE_UNAVAILABLE.is_transient());
            assert!(ReplyCode::MAILBOX_UNAVAILABLE.is_permanent());
            assert!(ReplyCode::AUTH_FAILED.is_permanent());
            assert!(!ReplyCode::AUTH_FAILED.is_transient());
        }

        #[test]
        fn class_and_display() {
            assert_eq!(ReplyCode::OK.class(), 2);
            assert_eq!(ReplyCode::START_DATA.class(), 3);
            assert_eq!(ReplyCode::new(554).class(), 5);
            assert_eq!(format!("{}", ReplyCode::SYNTAX_ERROR), "500");
        }
    }

    mod enhanced_code_tests {
        use super::*;

        #[test]
        fn parses_prefix() {
            let code = EnhancedCode::parse_prefix("2.0.0 Ok: queued as 4F1").unwrap();
            assert_eq!((code.class, code.subject, code.detail), (2, 0, 0));
            assert_eq!(code.to_string(), "2.0.0");

            let code = EnhancedCode::parse_prefix("5.7.139 Authentication unsuccessful").unwrap();
            assert_eq!(code.detail, 139);
        }

        #[test]
        fn rejects_non_codes() {
            assert!(EnhancedCode::parse_prefix("OK").is_none());
            assert!(EnhancedCode::parse_prefix("1.2.3 wrong class").is_none());
            assert!(EnhancedCode::parse_prefix("2.0 short").is_none());
            assert!(EnhancedCode::parse_prefix("2.0.0.1 long").is_none());
            assert!(EnhancedCode::parse_prefix("smtp.example.com ESMTP").is_none());
        }
    }

    mod reply_tests {
        use super::*;

        #[test]
        fn enhanced_code_is_extracted() {
            let reply = Reply::new(
                ReplyCode::OK,
                vec!["2.1.5 Ok".to_string()],
            );
            assert_eq!(reply.enhanced_code.unwrap().to_string(), "2.1.5");
            assert_eq!(reply.detail(), "Ok");
            assert_eq!(reply.message_text(), "2.1.5 Ok");
        }

        #[test]
        fn enhanced_code_must_match_class() {
            let reply = Reply::new(ReplyCode::OK, vec!["5.1.1 odd".to_string()]);
            assert!(reply.enhanced_code.is_none());
            assert_eq!(reply.detail(), "5.1.1 odd");
        }

        #[test]
        fn status_predicates() {
            let reply = Reply::new(ReplyCode::MAILBOX_BUSY, vec!["Busy".to_string()]);
            assert!(!reply.is_success());
            assert!(reply.is_transient_error());
            assert!(!reply.is_permanent_error());
        }

        #[test]
        fn message_text_multiple_lines() {
            let reply = Reply::new(
                ReplyCode::SERVICE_READY,
                vec![
                    "smtp.example.com ESMTP".to_string(),
                    "Ready to serve".to_string(),
                ],
            );
            assert_eq!(
                reply.message_text(),
                "smtp.example.com ESMTP\nReady to serve"
            );
            assert_eq!(reply.to_string(), "220 smtp.example.com ESMTP\nReady to serve");
        }

        #[test]
        fn raw_lines_restore_code() {
            let reply = Reply::new(
                ReplyCode::OK,
                vec!["first".to_string(), "second".to_string()],
            );
            let raw: Vec<String> = reply.raw_lines().collect();
            assert_eq!(raw, vec!["250 first", "250 second"]);
        }

        #[test]
        fn message_text_empty() {
            let reply = Reply::new(ReplyCode::OK, vec![]);
            assert_eq!(reply.message_text(), "");
            assert!(reply.enhanced_code.is_none());
        }
    }
}
