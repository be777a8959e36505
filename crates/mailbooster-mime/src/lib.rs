//! # mailbooster-mime
//!
//! Builds outgoing email as RFC 5322 / MIME documents.
//!
//! ## Features
//!
//! - **Composition**: turns a [`MessageDescriptor`] into a header block and body
//!   using one of eight multipart shapes (plain, alternative, related, mixed
//!   and their nestings)
//! - **Encoding**: Base64, Quoted-Printable and RFC 2047 header encoding, with
//!   automatic 7bit/8bit/quoted-printable selection for text bodies
//! - **Attachments**: file or in-memory, regular or inline (content-id)
//! - **DKIM**: `rsa-sha256` signatures with relaxed/simple canonicalization
//! - **S/MIME**: pluggable [`BodySigner`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailbooster_mime::{Composer, Mailbox, MessageDescriptor};
//!
//! let mut desc = MessageDescriptor::new(Mailbox::new("a@x.com").with_name("Alice"));
//! desc.to.push(Mailbox::new("b@y.com"));
//! desc.subject = "Hi".to_string();
//! desc.text_body = Some("hello".to_string());
//!
//! let message = Composer::default().compose(&desc)?;
//! println!("{}", message.to_message());
//! ```
//!
//! ### Attachments
//!
//! ```ignore
//! use mailbooster_mime::Attachment;
//!
//! desc.attach_file(Attachment::from_path("report.pdf"))?;
//! desc.attachments.push(Attachment::from_bytes("logo.png", png).inline("logo"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod compose;
mod content_type;
mod descriptor;
mod error;
mod header;
mod shape;
mod smime;

pub mod dkim;
pub mod encoding;
pub mod wrap;

pub use address::{Mailbox, format_address_list, is_valid_address};
pub use compose::{ComposeOptions, ComposedMessage, Composer};
pub use content_type::ContentType;
pub use descriptor::{
    Attachment, AttachmentSource, Disposition, MessageDescriptor, Priority, RecipientKind,
};
pub use dkim::{DkimConfig, DkimSigner};
pub use encoding::TransferEncoding;
pub use error::{Error, Result};
pub use header::Headers;
pub use shape::MessageShape;
pub use smime::{BodySigner, SignedEntity};
