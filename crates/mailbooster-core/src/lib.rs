//! # mailbooster-core
//!
//! Mail transport core for `MailBooster`.
//!
//! This crate provides:
//! - **Transport configuration** - host list, security, auto-TLS, AUTH,
//!   timeouts and keep-alive, loadable from JSON
//! - **Multi-host failover** - each host is tried in order until one
//!   completes EHLO, STARTTLS and AUTH
//! - **Sending** - compose, envelope, per-recipient outcomes and DATA
//! - **Error taxonomy** - every failure carries an [`ErrorKind`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailbooster_core::{AuthConfig, Mailer, Security, TransportConfig};
//! use mailbooster_mime::{Mailbox, MessageDescriptor};
//!
//! let config = TransportConfig::builder("smtp.example.com;ssl://backup.example.com:465")
//!     .security(Security::Tls)
//!     .auth(AuthConfig::new("user@example.com", "password"))
//!     .build();
//! let mut mailer = Mailer::new(config)?;
//!
//! let mut desc = MessageDescriptor::new(Mailbox::new("user@example.com"));
//! desc.to.push(Mailbox::new("friend@example.org"));
//! desc.subject = "Hi".to_string();
//! desc.text_body = Some("hello".to_string());
//!
//! let report = mailer.send(&desc).await?;
//! println!("{} queued as {:?}", report.message_id, report.transaction_id);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod host;
pub mod report;
pub mod service;

pub use config::{AuthConfig, Mechanism, OAuthConfig, Security, TransportConfig, TransportConfigBuilder};
pub use error::{ErrorKind, MailError, Result};
pub use host::{HostEntry, parse_hosts};
pub use report::{HostFailure, RecipientOutcome, SendOutcome, SendReport};
pub use service::Mailer;
