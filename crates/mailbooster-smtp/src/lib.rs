//! # mailbooster-smtp
//!
//! An SMTP client session implementing RFC 5321.
//!
//! ## Features
//!
//! - **Runtime state machine**: every command checks the session state and
//!   fails fast, without touching the network, when it is not valid yet
//! - **Full protocol support**: EHLO (with HELO fallback), MAIL FROM,
//!   RCPT TO, DATA, RSET, NOOP, VRFY, QUIT
//! - **TLS support**: implicit TLS (port 465) and STARTTLS
//! - **Authentication**: CRAM-MD5, LOGIN, PLAIN, NTLM and XOAUTH2
//! - **Extensions**: 8BITMIME, SIZE, enhanced status codes
//! - **Transaction IDs**: queue identifiers parsed from exim, sendmail and
//!   postfix replies
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailbooster_smtp::{Address, Credentials, MailOptions, Session, Timeouts};
//!
//! #[tokio::main]
//! async fn main() -> mailbooster_smtp::Result<()> {
//!     let mut session = Session::new(Timeouts::default());
//!     session.connect("smtp.example.com", 587, false).await?;
//!     session.hello("client.example.com").await?;
//!     session.start_tls().await?;
//!     session
//!         .authenticate(&Credentials::new("user@example.com", "password"), None)
//!         .await?;
//!
//!     session
//!         .mail(&Address::new("sender@example.com")?, MailOptions::default())
//!         .await?;
//!     session.recipient(&Address::new("recipient@example.com")?).await?;
//!     let delivery = session
//!         .data("Subject: Test\r\n\r\nHello, World!\r\n")
//!         .await?;
//!     println!("queued as {:?}", delivery.transaction_id);
//!
//!     session.quit().await
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Disconnected ── connect() ──→ Connected ── hello() ──→ Greeted
//!                                                          │
//!          ┌──────────── start_tls() ──→ TlsEstablished ←──┤
//!          │                                               │
//!          └──→ authenticate() ──→ Authenticated ←─────────┘
//!                                       │
//!                  mail() ──→ InTransaction ── recipient()* ── data()
//! ```
//!
//! ## Modules
//!
//! - [`auth`]: mechanism selection, CRAM-MD5 and NTLM computations
//! - [`command`]: SMTP command builders
//! - [`connection`]: stream and session
//! - [`data`]: DATA line preparation and dot-stuffing
//! - [`parser`]: reply parser and transaction-ID extraction
//! - [`types`]: addresses, extensions, replies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod command;
pub mod connection;
pub mod data;
mod error;
pub mod parser;
pub mod types;

pub use auth::Credentials;
pub use connection::{
    Delivery, LastError, MailOptions, ServerInfo, Session, SessionState, Timeouts,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, EnhancedCode, Extension, Reply, ReplyCode};
