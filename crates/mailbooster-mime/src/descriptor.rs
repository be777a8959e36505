//! The message descriptor handed to the composer.

use crate::address::Mailbox;
use crate::dkim::DkimConfig;
use crate::encoding::TransferEncoding;
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;
use std::path::PathBuf;

/// Which recipient list an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
    /// Primary recipient.
    To,
    /// Carbon copy.
    Cc,
    /// Blind carbon copy.
    Bcc,
}

impl RecipientKind {
    /// Returns the lower-case label used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::To => "to",
            Self::Cc => "cc",
            Self::Bcc => "bcc",
        }
    }
}

/// `X-Priority` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Priority {
    /// `X-Priority: 1`.
    High,
    /// `X-Priority: 3`.
    Normal,
    /// `X-Priority: 5`.
    Low,
}

impl Priority {
    /// Returns the numeric header value.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::High => 1,
            Self::Normal => 3,
            Self::Low => 5,
        }
    }
}

/// Where attachment content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// Read from the filesystem at composition time.
    Path(PathBuf),
    /// In-memory content.
    Bytes(Vec<u8>),
}

/// Content-Disposition of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    /// A regular attachment.
    #[default]
    Attachment,
    /// An embedded part referenced by content-id (e.g. `cid:logo`).
    Inline,
}

impl Disposition {
    /// Returns the header token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attachment => "attachment",
            Self::Inline => "inline",
        }
    }
}

/// A file or in-memory attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Content source.
    pub source: AttachmentSource,
    /// Filename presented to the recipient; may be empty.
    pub filename: String,
    /// Explicit MIME type; guessed from the filename when `None`.
    pub content_type: Option<String>,
    /// Transfer encoding for the payload.
    pub encoding: TransferEncoding,
    /// Content-ID for inline parts.
    pub content_id: Option<String>,
    /// Disposition.
    pub disposition: Disposition,
}

impl Attachment {
    /// Creates an attachment read from `path` when the message is composed.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            source: AttachmentSource::Path(path),
            filename,
            content_type: None,
            encoding: TransferEncoding::Base64,
            content_id: None,
            disposition: Disposition::Attachment,
        }
    }

    /// Creates an attachment from in-memory bytes.
    #[must_use]
    pub fn from_bytes(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            source: AttachmentSource::Bytes(data.into()),
            filename: filename.into(),
            content_type: None,
            encoding: TransferEncoding::Base64,
            content_id: None,
            disposition: Disposition::Attachment,
        }
    }

    /// Marks the attachment as an inline part with the given content-id.
    #[must_use]
    pub fn inline(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self.disposition = Disposition::Inline;
        self
    }

    /// Sets an explicit MIME type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the payload transfer encoding.
    #[must_use]
    pub const fn with_encoding(mut self, encoding: TransferEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Returns true for inline parts.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.disposition == Disposition::Inline
    }
}

/// Everything needed to compose one outgoing message.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    /// Header `From`.
    pub from: Mailbox,
    /// Envelope sender used for `MAIL FROM`; defaults to `from`.
    pub sender: Option<String>,
    /// Reply-To mailboxes.
    pub reply_to: Vec<Mailbox>,
    /// Primary recipients.
    pub to: Vec<Mailbox>,
    /// Carbon-copy recipients.
    pub cc: Vec<Mailbox>,
    /// Blind carbon-copy recipients.
    pub bcc: Vec<Mailbox>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body (the alternative part when an HTML body is present).
    pub text_body: Option<String>,
    /// HTML body.
    pub html_body: Option<String>,
    /// Body character set.
    pub charset: String,
    /// Requested transfer encoding for text parts.
    pub encoding: TransferEncoding,
    /// Attachments and inline parts.
    pub attachments: Vec<Attachment>,
    /// Additional headers, emitted in order.
    pub custom_headers: Vec<(String, String)>,
    /// Caller-supplied Message-ID; used only if it looks like `<id@host>`.
    pub message_id: Option<String>,
    /// Fixed Date header; the current time is used when `None`.
    pub date: Option<DateTime<FixedOffset>>,
    /// `X-Priority` header.
    pub priority: Option<Priority>,
    /// Read-receipt address (`Disposition-Notification-To`).
    pub confirm_reading_to: Option<String>,
    /// `X-Mailer` header value.
    pub x_mailer: Option<String>,
    /// Column to wrap the plain-text body at; 0 disables wrapping.
    pub word_wrap: usize,
    /// Allow a message with no body.
    pub allow_empty: bool,
    /// DKIM signing parameters.
    pub dkim: Option<DkimConfig>,
}

impl MessageDescriptor {
    /// Creates a descriptor with the given sender and library defaults
    /// (utf-8, 8bit, no wrapping).
    #[must_use]
    pub fn new(from: Mailbox) -> Self {
        Self {
            from,
            sender: None,
            reply_to: Vec::new(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: String::new(),
            text_body: None,
            html_body: None,
            charset: "utf-8".to_string(),
            encoding: TransferEncoding::EightBit,
            attachments: Vec::new(),
            custom_headers: Vec::new(),
            message_id: None,
            date: None,
            priority: None,
            confirm_reading_to: None,
            x_mailer: None,
            word_wrap: 0,
            allow_empty: false,
            dkim: None,
        }
    }

    /// Adds a recipient after validating it.
    ///
    /// Returns `Ok(false)` and leaves the lists untouched when the address is
    /// already present in to, cc or bcc (compared case-insensitively).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address syntax is invalid.
    pub fn add_recipient(&mut self, kind: RecipientKind, mailbox: Mailbox) -> Result<bool> {
        mailbox.validate(kind.as_str())?;
        let normalized = mailbox.normalized();
        if self
            .all_recipients()
            .any(|existing| existing.normalized() == normalized)
        {
            tracing::debug!(address = %mailbox.address, "Ignoring duplicate recipient");
            return Ok(false);
        }
        match kind {
            RecipientKind::To => self.to.push(mailbox),
            RecipientKind::Cc => self.cc.push(mailbox),
            RecipientKind::Bcc => self.bcc.push(mailbox),
        }
        Ok(true)
    }

    /// Adds a Reply-To mailbox after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address syntax is invalid.
    pub fn add_reply_to(&mut self, mailbox: Mailbox) -> Result<()> {
        mailbox.validate("Reply-To")?;
        let normalized = mailbox.normalized();
        if !self.reply_to.iter().any(|m| m.normalized() == normalized) {
            self.reply_to.push(mailbox);
        }
        Ok(())
    }

    /// Adds a filesystem attachment, rejecting it if the file is unreadable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachmentNotFound`] if `path` is not a readable file.
    pub fn attach_file(&mut self, attachment: Attachment) -> Result<()> {
        if let AttachmentSource::Path(path) = &attachment.source
            && !path.is_file()
        {
            return Err(Error::AttachmentNotFound(path.clone()));
        }
        self.attachments.push(attachment);
        Ok(())
    }

    /// Iterates over to, cc and bcc in that order.
    pub fn all_recipients(&self) -> impl Iterator<Item = &Mailbox> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }

    /// Returns the de-duplicated envelope recipient addresses.
    #[must_use]
    pub fn envelope_recipients(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.all_recipients()
            .filter(|m| seen.insert(m.normalized()))
            .map(|m| m.address.clone())
            .collect()
    }

    /// Returns the envelope sender (`sender`, falling back to `from`).
    #[must_use]
    pub fn envelope_sender(&self) -> &str {
        self.sender
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.from.address)
    }

    /// Returns true when both a plain-text and an HTML body are present.
    #[must_use]
    pub fn has_alternative(&self) -> bool {
        let present = |b: &Option<String>| b.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.text_body) && present(&self.html_body)
    }

    /// Returns true if any attachment is inline.
    #[must_use]
    pub fn has_inline(&self) -> bool {
        self.attachments.iter().any(Attachment::is_inline)
    }

    /// Returns true if any attachment is a regular attachment.
    #[must_use]
    pub fn has_attachment(&self) -> bool {
        self.attachments.iter().any(|a| !a.is_inline())
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

    fn descriptor() -> MessageDescriptor {
        MessageDescriptor::new(Mailbox::new("a@x.com"))
    }

    #[test]
    fn test_duplicate_recipients_ignored() {
        let mut desc = descriptor();
        assert!(desc.add_recipient(RecipientKind::To, "b@y.com".into()).unwrap());
        assert!(!desc.add_recipient(RecipientKind::Cc, "B@Y.com".into()).unwrap());
        assert!(!desc.add_recipient(RecipientKind::Bcc, "b@y.COM".into()).unwrap());
        assert_eq!(desc.all_recipients().count(), 1);
    }

    #[test]
    fn test_invalid_recipient_rejected() {
        let mut desc = descriptor();
        let err = desc
            .add_recipient(RecipientKind::Cc, "not-an-address".into())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { kind: "cc", .. }));
        assert!(desc.cc.is_empty());
    }

    #[test]
    fn test_envelope_recipients_dedup() {
        let mut desc = descriptor();
        desc.to.push("b@y.com".into());
        desc.bcc.push("B@y.com".into());
        desc.cc.push("c@y.com".into());
        assert_eq!(desc.envelope_recipients(), vec!["b@y.com", "c@y.com"]);
    }

    #[test]
    fn test_envelope_sender_fallback() {
        let mut desc = descriptor();
        assert_eq!(desc.envelope_sender(), "a@x.com");
        desc.sender = Some("bounces@x.com".to_string());
        assert_eq!(desc.envelope_sender(), "bounces@x.com");
    }

    #[test]
    fn test_missing_file_attachment_rejected() {
        let mut desc = descriptor();
        let err = desc
            .attach_file(Attachment::from_path("/definitely/not/here.pdf"))
            .unwrap_err();
        assert!(matches!(err, Error::AttachmentNotFound(_)));
        assert!(desc.attachments.is_empty());
    }

    #[test]
    fn test_attachment_from_path_filename() {
        let att = Attachment::from_path("/tmp/report.pdf");
        assert_eq!(att.filename, "report.pdf");
        assert_eq!(att.encoding, TransferEncoding::Base64);
        assert!(!att.is_inline());
        assert!(att.clone().inline("logo").is_inline());
    }

    #[test]
    fn test_shape_flags() {
        let mut desc = descriptor();
        desc.text_body = Some("plain".to_string());
        assert!(!desc.has_alternative());
        desc.html_body = Some("<p>html</p>".to_string());
        assert!(desc.has_alternative());
        desc.attachments.push(Attachment::from_bytes("a.txt", "x").inline("a"));
        assert!(desc.has_inline());
        assert!(!desc.has_attachment());
    }
}
