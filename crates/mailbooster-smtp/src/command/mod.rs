//! SMTP command builder.

use crate::types::{Address, AuthMechanism};

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH - Begin authentication
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
        /// Initial response (optional, for SASL-IR)
        initial_response: Option<String>,
    },
    /// Bare line answering a 334 challenge
    AuthResponse(String),
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: Address,
        /// BODY parameter (7BIT, 8BITMIME)
        body: Option<String>,
        /// SIZE parameter
        size: Option<usize>,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// VRFY - Verify address
    Vrfy {
        /// Address to verify
        address: String,
    },
    /// NOOP - No operation
    Noop,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = self.line().into_bytes();
        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Short name used in errors and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } | Self::AuthResponse(_) => "AUTH",
            Self::MailFrom { .. } => "MAIL FROM",
            Self::RcptTo { .. } => "RCPT TO",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Vrfy { .. } => "VRFY",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
        }
    }

    /// The command line as it may appear in logs, with credentials removed.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Auth {
                mechanism,
                initial_response: Some(_),
            } => format!("AUTH {mechanism} <redacted>"),
            Self::AuthResponse(_) => "<redacted>".to_string(),
            _ => self.line(),
        }
    }

    fn line(&self) -> String {
        match self {
            Self::Helo { hostname } => format!("HELO {hostname}"),
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".to_string(),
            Self::Auth {
                mechanism,
                initial_response,
            } => match initial_response {
                Some(resp) => format!("AUTH {mechanism} {resp}"),
                None => format!("AUTH {mechanism}"),
            },
            Self::AuthResponse(resp) => resp.clone(),
            Self::MailFrom { from, body, size } => {
                let mut line = format!("MAIL FROM:<{from}>");
                if let Some(body_type) = body {
                    line.push_str(" BODY=");
                    line.push_str(body_type);
                }
                if let Some(msg_size) = size {
                    line.push_str(&format!(" SIZE={msg_size}"));
                }
                line
            }
            Self::RcptTo { to } => format!("RCPT TO:<{to}>"),
            Self::Data => "DATA".to_string(),
            Self::Rset => "RSET".to_string(),
            Self::Vrfy { address } => format!("VRFY {address}"),
            Self::Noop => "NOOP".to_string(),
            Self::Quit => "QUIT".to_string(),
        }
    }
}
