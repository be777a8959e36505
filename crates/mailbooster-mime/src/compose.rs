//! Message composition: descriptor in, header block and MIME body out.

use crate::address::{Mailbox, format_address_list};
use crate::content_type::ContentType;
use crate::descriptor::{Attachment, AttachmentSource, Disposition, MessageDescriptor, RecipientKind};
use crate::dkim::DkimSigner;
use crate::encoding::{
    CRLF, HeaderPosition, TransferEncoding, encode_header, encode_payload, parameter_value,
    secure_header, select_body_encoding,
};
use crate::error::{Error, Result};
use crate::header::{Headers, fold_unstructured, validate_custom_name};
use crate::shape::MessageShape;
use crate::smime::BodySigner;
use crate::wrap::wrap_text;
use std::collections::HashSet;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

const PREAMBLE: &str = "This is a multi-part message in MIME format.\r\n\r\n";

/// Transport-dependent composition settings.
#[derive(Clone)]
pub struct ComposeOptions {
    /// Host part of generated Message-IDs.
    pub hostname: String,
    /// Emit a `Bcc` header (for transports that strip it themselves).
    pub include_bcc: bool,
    /// Optional S/MIME signer.
    pub signer: Option<Arc<dyn BodySigner>>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            hostname: "localhost.localdomain".to_string(),
            include_bcc: false,
            signer: None,
        }
    }
}

impl fmt::Debug for ComposeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposeOptions")
            .field("hostname", &self.hostname)
            .field("include_bcc", &self.include_bcc)
            .field("signer", &self.signer.is_some())
            .finish()
    }
}

/// A composed message ready for DATA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    /// Header lines, each CRLF-terminated, without the blank separator line.
    pub header: String,
    /// MIME body.
    pub body: String,
    /// Multipart boundaries in nesting order (outermost first).
    pub boundaries: Vec<String>,
    /// The Message-ID placed in the header.
    pub message_id: String,
    /// Structure the body was built with.
    pub shape: MessageShape,
}

impl ComposedMessage {
    /// Returns header, blank line and body as one document.
    #[must_use]
    pub fn to_message(&self) -> String {
        format!("{}{CRLF}{}", self.header, self.body)
    }

    /// Size in bytes of the complete document.
    #[must_use]
    pub fn size(&self) -> usize {
        self.header.len() + CRLF.len() + self.body.len()
    }
}

/// A text part with its final encoding decided.
struct TextPart {
    text: String,
    content_type: ContentType,
    encoding: TransferEncoding,
}

impl TextPart {
    fn new(text: &str, sub_type: &str, desc: &MessageDescriptor) -> Self {
        let encoding = select_body_encoding(text, desc.encoding);
        let charset = if desc.encoding == TransferEncoding::EightBit
            && encoding == TransferEncoding::SevenBit
        {
            "us-ascii"
        } else {
            desc.charset.as_str()
        };
        Self {
            text: text.to_string(),
            content_type: ContentType::new("text", sub_type).with_parameter("charset", charset),
            encoding,
        }
    }
}

/// An attachment with its content loaded and type resolved.
struct LoadedAttachment {
    data: Vec<u8>,
    filename: String,
    content_type: ContentType,
    encoding: TransferEncoding,
    content_id: Option<String>,
    disposition: Disposition,
}

/// Builds MIME documents from [`MessageDescriptor`]s.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    options: ComposeOptions,
}

impl Composer {
    /// Creates a composer.
    #[must_use]
    pub const fn new(options: ComposeOptions) -> Self {
        Self { options }
    }

    /// Returns the composition options.
    #[must_use]
    pub const fn options(&self) -> &ComposeOptions {
        &self.options
    }

    /// Composes a message.
    ///
    /// The body is built first so the header can describe its boundaries and
    /// encoding. Every call generates fresh boundaries, and a fresh
    /// Message-ID unless the descriptor carries a well-formed one.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid addresses, a missing recipient, an empty
    /// body (unless allowed), unreadable attachments, unresolvable MIME
    /// types, malformed custom headers, and DKIM or S/MIME failures.
    pub fn compose(&self, desc: &MessageDescriptor) -> Result<ComposedMessage> {
        validate(desc)?;
        let attachments = load_attachments(&desc.attachments)?;

        let has_inline = attachments.iter().any(|a| a.disposition == Disposition::Inline);
        let has_attachment = attachments
            .iter()
            .any(|a| a.disposition == Disposition::Attachment);
        let shape = MessageShape::from_flags(desc.has_alternative(), has_inline, has_attachment);

        let unique_id = uuid::Uuid::new_v4().simple().to_string();
        let boundaries: Vec<String> = (1..=shape.boundary_count())
            .map(|n| format!("b{n}_{unique_id}"))
            .collect();

        let text = desc
            .text_body
            .as_deref()
            .map(|t| wrap_text(t, desc.word_wrap, false));
        let (main, alt) = match desc.html_body.as_deref().filter(|h| !h.is_empty()) {
            Some(html) => (
                TextPart::new(html, "html", desc),
                text.as_deref()
                    .filter(|t| !t.is_empty())
                    .map(|t| TextPart::new(t, "plain", desc)),
            ),
            None => (TextPart::new(text.as_deref().unwrap_or_default(), "plain", desc), None),
        };

        let body = build_body(shape, &boundaries, &main, alt.as_ref(), &attachments)?;
        let mime_lines = mime_header_lines(shape, &boundaries, &main, alt.as_ref(), &attachments);

        let (mime_block, body) = match &self.options.signer {
            Some(signer) => {
                let signed = signer.sign(&format!("{mime_lines}{CRLF}{body}"))?;
                let mut headers = signed.headers;
                if !headers.ends_with(CRLF) {
                    headers.push_str(CRLF);
                }
                (headers, signed.body)
            }
            None => (format!("MIME-Version: 1.0{CRLF}{mime_lines}"), body),
        };

        let message_id = desc
            .message_id
            .as_deref()
            .map(str::trim)
            .filter(|id| is_valid_message_id(id))
            .map_or_else(
                || format!("<{unique_id}@{}>", self.options.hostname),
                String::from,
            );

        let mut header = self.header_fields(desc, &message_id)?.to_string();
        header.push_str(&mime_block);

        if let Some(dkim) = &desc.dkim {
            let signature = DkimSigner::from_config(dkim)?.sign(&header, &body)?;
            header.insert_str(0, &signature);
        }

        tracing::debug!(
            %shape,
            message_id = %message_id,
            size = header.len() + body.len(),
            "Composed message"
        );

        Ok(ComposedMessage {
            header,
            body,
            boundaries,
            message_id,
            shape,
        })
    }

    fn header_fields(&self, desc: &MessageDescriptor, message_id: &str) -> Result<Headers> {
        let charset = desc.charset.as_str();
        let mut seen = HashSet::new();
        let mut unique = |list: &[Mailbox]| -> Vec<Mailbox> {
            list.iter()
                .filter(|m| seen.insert(m.normalized()))
                .cloned()
                .collect()
        };
        let (to, cc, bcc) = (unique(&desc.to), unique(&desc.cc), unique(&desc.bcc));

        let mut headers = Headers::new();
        let date = desc
            .date
            .map_or_else(|| chrono::Local::now().to_rfc2822(), |d| d.to_rfc2822());
        headers.add("Date", date);

        if !to.is_empty() {
            headers.add("To", format_address_list("To", &to, charset));
        } else if cc.is_empty() {
            headers.add("To", "undisclosed-recipients:;");
        }
        headers.add("From", desc.from.format(charset));
        if !cc.is_empty() {
            headers.add("Cc", format_address_list("Cc", &cc, charset));
        }
        if self.options.include_bcc && !bcc.is_empty() {
            headers.add("Bcc", format_address_list("Bcc", &bcc, charset));
        }
        if !desc.reply_to.is_empty() {
            headers.add("Reply-To", format_address_list("Reply-To", &desc.reply_to, charset));
        }

        let subject = encode_header(&secure_header(&desc.subject), charset, HeaderPosition::Text);
        headers.add("Subject", fold_unstructured("Subject", &subject));
        headers.add("Message-ID", message_id);

        if let Some(priority) = desc.priority {
            headers.add("X-Priority", priority.value().to_string());
        }
        if let Some(mailer) = desc.x_mailer.as_deref().filter(|m| !m.trim().is_empty()) {
            headers.add("X-Mailer", secure_header(mailer));
        }
        if let Some(address) = &desc.confirm_reading_to {
            headers.add(
                "Disposition-Notification-To",
                format!("<{}>", secure_header(address)),
            );
        }

        for (name, value) in &desc.custom_headers {
            let name = name.trim();
            validate_custom_name(name)?;
            let value = encode_header(&secure_header(value), charset, HeaderPosition::Text);
            headers.add(name, fold_unstructured(name, &value));
        }

        Ok(headers)
    }
}

fn validate(desc: &MessageDescriptor) -> Result<()> {
    desc.from.validate("from")?;
    if let Some(sender) = desc.sender.as_deref().filter(|s| !s.is_empty()) {
        Mailbox::new(sender).validate("sender")?;
    }
    for mailbox in &desc.reply_to {
        mailbox.validate("Reply-To")?;
    }
    for (kind, list) in [
        (RecipientKind::To, &desc.to),
        (RecipientKind::Cc, &desc.cc),
        (RecipientKind::Bcc, &desc.bcc),
    ] {
        for mailbox in list {
            mailbox.validate(kind.as_str())?;
        }
    }
    if desc.all_recipients().next().is_none() {
        return Err(Error::NoRecipients);
    }
    if let Some(address) = &desc.confirm_reading_to {
        Mailbox::new(address.as_str()).validate("Disposition-Notification-To")?;
    }

    let empty = |b: &Option<String>| b.as_deref().is_none_or(str::is_empty);
    if !desc.allow_empty && empty(&desc.text_body) && empty(&desc.html_body) {
        return Err(Error::EmptyBody);
    }
    Ok(())
}

fn load_attachments(attachments: &[Attachment]) -> Result<Vec<LoadedAttachment>> {
    let mut loaded = Vec::with_capacity(attachments.len());
    let mut content_ids = HashSet::new();

    for attachment in attachments {
        let content_id = match attachment.disposition {
            Disposition::Inline => {
                let cid = attachment
                    .content_id
                    .clone()
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| attachment.filename.clone());
                if !content_ids.insert(cid.clone()) {
                    tracing::debug!(content_id = %cid, "Skipping duplicate inline part");
                    continue;
                }
                Some(cid)
            }
            Disposition::Attachment => None,
        };

        let data = match &attachment.source {
            AttachmentSource::Path(path) => {
                std::fs::read(path).map_err(|_| Error::AttachmentNotFound(path.clone()))?
            }
            AttachmentSource::Bytes(bytes) => bytes.clone(),
        };

        let content_type = match attachment.content_type.as_deref() {
            Some(explicit) => ContentType::parse(explicit)
                .map_err(|_| Error::UnknownMimeType(explicit.to_string()))?,
            None => mime_guess::from_path(&attachment.filename)
                .first_raw()
                .and_then(|guess| ContentType::parse(guess).ok())
                .unwrap_or_else(ContentType::octet_stream),
        };

        loaded.push(LoadedAttachment {
            data,
            filename: secure_header(&attachment.filename),
            content_type,
            encoding: attachment.encoding,
            content_id,
            disposition: attachment.disposition,
        });
    }

    Ok(loaded)
}

/// Content-Type (and, where needed, Content-Transfer-Encoding) lines for the
/// top-level entity.
fn mime_header_lines(
    shape: MessageShape,
    boundaries: &[String],
    main: &TextPart,
    alt: Option<&TextPart>,
    attachments: &[LoadedAttachment],
) -> String {
    let mut lines = String::new();
    match (shape.outer_subtype(), boundaries.first()) {
        (Some(subtype), Some(boundary)) => {
            let _ = write!(
                lines,
                "Content-Type: {}{CRLF}",
                ContentType::multipart(subtype, boundary.as_str())
            );
            // Multipart entities only declare 8bit; QP and base64 parts are 7bit-safe
            let eight_bit = std::iter::once(main.encoding)
                .chain(alt.map(|a| a.encoding))
                .chain(attachments.iter().map(|a| a.encoding))
                .any(|e| e == TransferEncoding::EightBit);
            if eight_bit {
                let _ = write!(lines, "Content-Transfer-Encoding: 8bit{CRLF}");
            }
        }
        _ => {
            let _ = write!(lines, "Content-Type: {}{CRLF}", main.content_type);
            if main.encoding != TransferEncoding::SevenBit {
                let _ = write!(lines, "Content-Transfer-Encoding: {}{CRLF}", main.encoding);
            }
        }
    }
    lines
}

fn build_body(
    shape: MessageShape,
    boundaries: &[String],
    main: &TextPart,
    alt: Option<&TextPart>,
    attachments: &[LoadedAttachment],
) -> Result<String> {
    let mut writer = BodyWriter {
        out: String::new(),
        attachments,
    };
    let b = |n: usize| boundaries.get(n).map_or("", String::as_str);

    // Shapes with an alternative always carry a plain part
    let plain = alt.unwrap_or(main);

    match shape {
        MessageShape::Plain => {
            writer.out = encode_payload(main.text.as_bytes(), main.encoding)?;
        }
        MessageShape::Inline | MessageShape::Attach => {
            let disposition = if shape == MessageShape::Inline {
                Disposition::Inline
            } else {
                Disposition::Attachment
            };
            writer.out.push_str(PREAMBLE);
            writer.text_part(b(0), main)?;
            writer.attach_all(disposition, b(0))?;
        }
        MessageShape::InlineAttach => {
            writer.out.push_str(PREAMBLE);
            writer.nested(b(0), "related", b(1));
            writer.text_part(b(1), main)?;
            writer.attach_all(Disposition::Inline, b(1))?;
            writer.out.push_str(CRLF);
            writer.attach_all(Disposition::Attachment, b(0))?;
        }
        MessageShape::Alt => {
            writer.out.push_str(PREAMBLE);
            writer.text_part(b(0), plain)?;
            writer.text_part(b(0), main)?;
            writer.end(b(0));
        }
        MessageShape::AltInline => {
            writer.out.push_str(PREAMBLE);
            writer.text_part(b(0), plain)?;
            writer.nested(b(0), "related", b(1));
            writer.text_part(b(1), main)?;
            writer.attach_all(Disposition::Inline, b(1))?;
            writer.out.push_str(CRLF);
            writer.end(b(0));
        }
        MessageShape::AltAttach => {
            writer.out.push_str(PREAMBLE);
            writer.nested(b(0), "alternative", b(1));
            writer.text_part(b(1), plain)?;
            writer.text_part(b(1), main)?;
            writer.end(b(1));
            writer.out.push_str(CRLF);
            writer.attach_all(Disposition::Attachment, b(0))?;
        }
        MessageShape::AltInlineAttach => {
            writer.out.push_str(PREAMBLE);
            writer.nested(b(0), "alternative", b(1));
            writer.text_part(b(1), plain)?;
            writer.nested(b(1), "related", b(2));
            writer.text_part(b(2), main)?;
            writer.attach_all(Disposition::Inline, b(2))?;
            writer.out.push_str(CRLF);
            writer.end(b(1));
            writer.out.push_str(CRLF);
            writer.attach_all(Disposition::Attachment, b(0))?;
        }
    }

    Ok(writer.out)
}

struct BodyWriter<'a> {
    out: String,
    attachments: &'a [LoadedAttachment],
}

impl BodyWriter<'_> {
    fn part_header(&mut self, boundary: &str, content_type: &ContentType, encoding: TransferEncoding) {
        let _ = write!(self.out, "--{boundary}{CRLF}Content-Type: {content_type}{CRLF}");
        // 7bit is the default and may be omitted
        if encoding != TransferEncoding::SevenBit {
            let _ = write!(self.out, "Content-Transfer-Encoding: {encoding}{CRLF}");
        }
    }

    fn text_part(&mut self, boundary: &str, part: &TextPart) -> Result<()> {
        self.part_header(boundary, &part.content_type, part.encoding);
        self.out.push_str(CRLF);
        self.out.push_str(&encode_payload(part.text.as_bytes(), part.encoding)?);
        self.out.push_str(CRLF);
        self.out.push_str(CRLF);
        Ok(())
    }

    fn nested(&mut self, boundary: &str, sub_type: &str, inner: &str) {
        let _ = write!(
            self.out,
            "--{boundary}{CRLF}Content-Type: {}{CRLF}{CRLF}",
            ContentType::multipart(sub_type, inner)
        );
    }

    fn end(&mut self, boundary: &str) {
        let _ = write!(self.out, "{CRLF}--{boundary}--{CRLF}");
    }

    fn attach_all(&mut self, disposition: Disposition, boundary: &str) -> Result<()> {
        let attachments = self.attachments;
        for attachment in attachments.iter().filter(|a| a.disposition == disposition) {
            let name = encode_header(&attachment.filename, "utf-8", HeaderPosition::Text);
            let content_type = if name.is_empty() {
                attachment.content_type.clone()
            } else {
                attachment.content_type.clone().with_parameter("name", name.as_str())
            };
            self.part_header(boundary, &content_type, attachment.encoding);
            if let Some(cid) = &attachment.content_id {
                let _ = write!(self.out, "Content-ID: <{cid}>{CRLF}");
            }
            if name.is_empty() {
                let _ = write!(self.out, "Content-Disposition: {}{CRLF}", disposition.as_str());
            } else {
                let _ = write!(
                    self.out,
                    "Content-Disposition: {}; filename={}{CRLF}",
                    disposition.as_str(),
                    parameter_value(&name)
                );
            }
            self.out.push_str(CRLF);
            self.out.push_str(&encode_payload(&attachment.data, attachment.encoding)?);
            self.out.push_str(CRLF);
        }
        self.end(boundary);
        Ok(())
    }
}

/// Accepts `<left@right>` with no whitespace.
fn is_valid_message_id(id: &str) -> bool {
    id.strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .and_then(|inner| inner.split_once('@'))
        .is_some_and(|(left, right)| {
            !left.is_empty()
                && !right.is_empty()
                && !id.chars().any(char::is_whitespace)
        })
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
    use crate::descriptor::Attachment;

    fn simple() -> MessageDescriptor {
        let mut desc = MessageDescriptor::new(Mailbox::new("a@x.com"));
        desc.to.push(Mailbox::new("b@y.com"));
        desc.subject = "Hi".to_string();
        desc.text_body = Some("hello".to_string());
        desc
    }

    fn header_count(message: &ComposedMessage, name: &str) -> usize {
        let prefix = format!("{name}:");
        message
            .header
            .split("\r\n")
            .filter(|line| line.starts_with(&prefix))
            .count()
    }

    #[test]
    fn test_plain_message() {
        let message = Composer::default().compose(&simple()).unwrap();
        assert_eq!(message.shape, MessageShape::Plain);
        assert!(message.boundaries.is_empty());
        for name in ["Date", "From", "Subject", "Message-ID"] {
            assert_eq!(header_count(&message, name), 1, "{name}");
        }
        assert!(message.header.contains("To: b@y.com\r\n"));
        assert!(message.header.contains("Content-Type: text/plain; charset=us-ascii\r\n"));
        assert!(!message.header.contains("Content-Transfer-Encoding"));
        assert_eq!(message.body, "hello\r\n");
        assert!(message.message_id.ends_with("@localhost.localdomain>"));
    }

    #[test]
    fn test_eight_bit_plain() {
        let mut desc = simple();
        desc.text_body = Some("grüße".to_string());
        let message = Composer::default().compose(&desc).unwrap();
        assert!(message.header.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(message.header.contains("Content-Transfer-Encoding: 8bit\r\n"));
    }

    #[test]
    fn test_long_line_uses_quoted_printable() {
        let mut desc = simple();
        desc.text_body = Some("x".repeat(1200));
        let message = Composer::default().compose(&desc).unwrap();
        assert!(message.header.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        for line in message.to_message().split("\r\n") {
            assert!(line.len() <= 998);
        }
    }

    #[test]
    fn test_recompose_is_stable() {
        let mut desc = simple();
        desc.text_body = Some("ünïcode body".to_string());
        let composer = Composer::default();
        let first = composer.compose(&desc).unwrap();
        let second = composer.compose(&desc).unwrap();
        assert_eq!(first.body, second.body);
        assert_ne!(first.message_id, second.message_id);
    }

    #[test]
    fn test_no_recipients() {
        let mut desc = simple();
        desc.to.clear();
        assert!(matches!(Composer::default().compose(&desc), Err(Error::NoRecipients)));
    }

    #[test]
    fn test_empty_body() {
        let mut desc = simple();
        desc.text_body = None;
        assert!(matches!(Composer::default().compose(&desc), Err(Error::EmptyBody)));

        desc.allow_empty = true;
        assert!(Composer::default().compose(&desc).is_ok());
    }

    #[test]
    fn test_invalid_from() {
        let mut desc = simple();
        desc.from = Mailbox::new("nope");
        assert!(matches!(
            Composer::default().compose(&desc),
            Err(Error::InvalidAddress { kind: "from", .. })
        ));
    }

    #[test]
    fn test_missing_attachment_file() {
        let mut desc = simple();
        desc.attachments.push(Attachment::from_path("/no/such/file.pdf"));
        assert!(matches!(
            Composer::default().compose(&desc),
            Err(Error::AttachmentNotFound(_))
        ));
    }

    #[test]
    fn test_unknown_explicit_type() {
        let mut desc = simple();
        desc.attachments
            .push(Attachment::from_bytes("a.bin", vec![1, 2, 3]).with_content_type("garbage"));
        assert!(matches!(
            Composer::default().compose(&desc),
            Err(Error::UnknownMimeType(_))
        ));
    }

    #[test]
    fn test_subject_encoding() {
        let mut desc = simple();
        desc.subject = "Привет мир".to_string();
        let message = Composer::default().compose(&desc).unwrap();
        assert!(message.header.contains("Subject: =?utf-8?B?"));
    }

    #[test]
    fn test_caller_message_id() {
        let mut desc = simple();
        desc.message_id = Some("<custom@x.com>".to_string());
        let message = Composer::default().compose(&desc).unwrap();
        assert_eq!(message.message_id, "<custom@x.com>");

        desc.message_id = Some("not-a-message-id".to_string());
        let message = Composer::default().compose(&desc).unwrap();
        assert_ne!(message.message_id, "not-a-message-id");
        assert!(message.message_id.starts_with('<') && message.message_id.contains('@'));
    }

    #[test]
    fn test_bcc_header_optional() {
        let mut desc = simple();
        desc.bcc.push(Mailbox::new("hidden@y.com"));
        let message = Composer::default().compose(&desc).unwrap();
        assert!(!message.header.contains("hidden@y.com"));

        let composer = Composer::new(ComposeOptions {
            include_bcc: true,
            ..ComposeOptions::default()
        });
        let message = composer.compose(&desc).unwrap();
        assert!(message.header.contains("Bcc: hidden@y.com\r\n"));
    }

    #[test]
    fn test_undisclosed_recipients() {
        let mut desc = simple();
        desc.to.clear();
        desc.bcc.push(Mailbox::new("hidden@y.com"));
        let message = Composer::default().compose(&desc).unwrap();
        assert!(message.header.contains("To: undisclosed-recipients:;\r\n"));
    }

    #[test]
    fn test_reserved_custom_header_rejected() {
        let mut desc = simple();
        desc.custom_headers.push(("Subject".to_string(), "again".to_string()));
        assert!(matches!(
            Composer::default().compose(&desc),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_custom_headers_and_extras() {
        let mut desc = simple();
        desc.custom_headers.push(("X-Campaign".to_string(), "spring\r\nBcc: x".to_string()));
        desc.priority = Some(crate::descriptor::Priority::High);
        desc.confirm_reading_to = Some("receipts@x.com".to_string());
        desc.reply_to.push(Mailbox::new("help@x.com").with_name("Help Desk"));
        let message = Composer::default().compose(&desc).unwrap();
        assert!(message.header.contains("X-Campaign: springBcc: x\r\n"));
        assert!(message.header.contains("X-Priority: 1\r\n"));
        assert!(message.header.contains("Disposition-Notification-To: <receipts@x.com>\r\n"));
        assert!(message.header.contains("Reply-To: Help Desk <help@x.com>\r\n"));
    }

    #[test]
    fn test_alt_shape() {
        let mut desc = simple();
        desc.html_body = Some("<p>hello</p>".to_string());
        let message = Composer::default().compose(&desc).unwrap();
        assert_eq!(message.shape, MessageShape::Alt);
        let b1 = &message.boundaries[0];
        assert!(message.header.contains(&format!(
            "Content-Type: multipart/alternative; boundary=\"{b1}\"\r\n"
        )));
        assert!(message.body.starts_with(PREAMBLE));
        let plain = message.body.find("text/plain").unwrap();
        let html = message.body.find("text/html").unwrap();
        assert!(plain < html);
        assert!(message.body.ends_with(&format!("--{b1}--\r\n")));
    }

    #[test]
    fn test_attach_shape_with_filename_quoting() {
        let mut desc = simple();
        desc.attachments
            .push(Attachment::from_bytes("annual report.pdf", b"%PDF-1.4".to_vec()));
        let message = Composer::default().compose(&desc).unwrap();
        assert_eq!(message.shape, MessageShape::Attach);
        assert!(message.header.contains("multipart/mixed"));
        assert!(message.body.contains("Content-Type: application/pdf; name=\"annual report.pdf\"\r\n"));
        assert!(message.body.contains("Content-Transfer-Encoding: base64\r\n"));
        assert!(message.body.contains("Content-Disposition: attachment; filename=\"annual report.pdf\"\r\n"));
    }

    #[test]
    fn test_inline_parts_deduplicated() {
        let mut desc = simple();
        desc.html_body = Some("<img src=\"cid:logo\">".to_string());
        desc.text_body = None;
        desc.attachments.push(Attachment::from_bytes("logo.png", vec![0x89, 0x50]).inline("logo"));
        desc.attachments.push(Attachment::from_bytes("logo2.png", vec![0x89, 0x50]).inline("logo"));
        let message = Composer::default().compose(&desc).unwrap();
        assert_eq!(message.shape, MessageShape::Inline);
        assert_eq!(message.body.matches("Content-ID: <logo>").count(), 1);
        assert!(message.header.contains("multipart/related"));
    }

    #[test]
    fn test_alt_inline_attach_nesting() {
        let mut desc = simple();
        desc.html_body = Some("<img src=\"cid:logo\">".to_string());
        desc.attachments.push(Attachment::from_bytes("logo.png", vec![1]).inline("logo"));
        desc.attachments.push(Attachment::from_bytes("notes.txt", "notes"));
        let message = Composer::default().compose(&desc).unwrap();
        assert_eq!(message.shape, MessageShape::AltInlineAttach);
        assert_eq!(message.boundaries.len(), 3);

        let body = &message.body;
        let [b1, b2, b3] = [&message.boundaries[0], &message.boundaries[1], &message.boundaries[2]];
        let alt = body.find(&format!("multipart/alternative; boundary=\"{b2}\"")).unwrap();
        let related = body.find(&format!("multipart/related; boundary=\"{b3}\"")).unwrap();
        let end_b3 = body.find(&format!("--{b3}--")).unwrap();
        let end_b2 = body.find(&format!("--{b2}--")).unwrap();
        let attachment = body.find("filename=notes.txt").unwrap();
        let end_b1 = body.find(&format!("--{b1}--")).unwrap();
        assert!(alt < related && related < end_b3 && end_b3 < end_b2);
        assert!(end_b2 < attachment && attachment < end_b1);
    }

    #[test]
    fn test_word_wrap_applies_to_text() {
        let mut desc = simple();
        desc.text_body = Some("one two three four five six".to_string());
        desc.word_wrap = 10;
        let message = Composer::default().compose(&desc).unwrap();
        for line in message.body.split("\r\n") {
            assert!(line.len() <= 10);
        }
    }

    struct FakeSigner;

    impl BodySigner for FakeSigner {
        fn sign(&self, entity: &str) -> Result<crate::smime::SignedEntity> {
            Ok(crate::smime::SignedEntity {
                headers: "MIME-Version: 1.0\r\nContent-Type: multipart/signed; boundary=\"sig\"".to_string(),
                body: format!("--sig\r\n{entity}\r\n--sig--\r\n"),
            })
        }
    }

    #[test]
    fn test_body_signer_moves_content_type() {
        let composer = Composer::new(ComposeOptions {
            signer: Some(Arc::new(FakeSigner)),
            ..ComposeOptions::default()
        });
        let message = composer.compose(&simple()).unwrap();
        assert!(message.header.ends_with("multipart/signed; boundary=\"sig\"\r\n"));
        assert_eq!(header_count(&message, "Content-Type"), 1);
        assert!(message.body.contains("Content-Type: text/plain; charset=us-ascii\r\n\r\nhello"));
    }

    #[test]
    fn test_attachment_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let mut desc = simple();
        desc.attach_file(Attachment::from_path(&path)).unwrap();
        let message = Composer::default().compose(&desc).unwrap();
        assert!(message.body.contains("text/csv"));
        assert!(message.body.contains(&crate::encoding::encode_base64(b"a,b\n1,2\n")));
    }

    #[test]
    fn test_dkim_header_prepended() {
        use rsa::pkcs8::{EncodePrivateKey, LineEnding};
        let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let mut desc = simple();
        desc.dkim = Some(crate::dkim::DkimConfig {
            domain: "x.com".to_string(),
            selector: "s1".to_string(),
            private_key: key.to_pkcs8_pem(LineEnding::LF).unwrap().as_str().to_owned(),
            identity: Some("@x.com".to_string()),
        });
        let message = Composer::default().compose(&desc).unwrap();
        assert!(message.header.starts_with("DKIM-Signature: v=1; a=rsa-sha256;"));
        assert!(message.header.contains(" i=@x.com;"));
    }
}
