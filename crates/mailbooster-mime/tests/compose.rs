//! Property tests for message composition.
//!
//! These build random descriptors across all eight shapes and check the
//! structural guarantees of the composed document.

#![allow(clippy::unwrap_used)]

use mailbooster_mime::encoding::{MAX_LINE_LENGTH, TransferEncoding};
use mailbooster_mime::{Attachment, Composer, Mailbox, MessageDescriptor, MessageShape};
use proptest::prelude::*;

fn descriptor(
    subject: &str,
    text: &str,
    html: Option<&str>,
    inline: bool,
    attach: bool,
) -> MessageDescriptor {
    let mut desc = MessageDescriptor::new(Mailbox::new("a@x.com").with_name("Sender"));
    desc.to.push(Mailbox::new("b@y.com"));
    desc.subject = subject.to_string();
    desc.text_body = Some(text.to_string());
    desc.html_body = html.map(ToString::to_string);
    if inline {
        desc.attachments
            .push(Attachment::from_bytes("logo.png", vec![0x89, b'P', b'N', b'G']).inline("logo"));
    }
    if attach {
        desc.attachments
            .push(Attachment::from_bytes("notes.txt", "attached notes"));
    }
    desc
}

fn count_header(header: &str, name: &str) -> usize {
    let prefix = format!("{name}:");
    header.split("\r\n").filter(|l| l.starts_with(&prefix)).count()
}

proptest! {
    #[test]
    fn prop_single_core_headers(
        subject in "\\PC{0,120}",
        text in "[a-zA-Zé ]{1,200}",
        html in proptest::option::of("<p>[a-z ]{1,50}</p>"),
        inline in proptest::bool::ANY,
        attach in proptest::bool::ANY,
    ) {
        let desc = descriptor(&subject, &text, html.as_deref(), inline, attach);
        let message = Composer::default().compose(&desc).unwrap();

        for name in ["Subject", "Message-ID", "Date", "From"] {
            prop_assert_eq!(count_header(&message.header, name), 1, "{}", name);
        }
        prop_assert_eq!(message.boundaries.len(), message.shape.boundary_count());
        for line in message.to_message().split("\r\n") {
            prop_assert!(line.len() <= MAX_LINE_LENGTH);
        }
        for boundary in &message.boundaries {
            let closing = format!("--{boundary}--");
            prop_assert!(message.body.contains(&closing));
        }
    }

    #[test]
    fn prop_message_id_shape(text in "[a-z ]{1,40}") {
        let message = Composer::default().compose(&descriptor("s", &text, None, false, false)).unwrap();
        let id = &message.message_id;
        prop_assert!(id.starts_with('<') && id.ends_with('>'));
        let (left, right) = id[1..id.len() - 1].split_once('@').unwrap();
        prop_assert!(!left.is_empty() && !right.is_empty());
    }
}

#[test]
fn test_every_shape_is_reachable() {
    let cases = [
        (None, false, false, MessageShape::Plain),
        (Some("<b>x</b>"), false, false, MessageShape::Alt),
        (None, true, false, MessageShape::Inline),
        (None, false, true, MessageShape::Attach),
        (None, true, true, MessageShape::InlineAttach),
        (Some("<b>x</b>"), true, false, MessageShape::AltInline),
        (Some("<b>x</b>"), false, true, MessageShape::AltAttach),
        (Some("<b>x</b>"), true, true, MessageShape::AltInlineAttach),
    ];
    for (html, inline, attach, shape) in cases {
        let message = Composer::default()
            .compose(&descriptor("s", "text", html, inline, attach))
            .unwrap();
        assert_eq!(message.shape, shape);
    }
}

#[test]
fn test_base64_request_is_honoured() {
    let mut desc = descriptor("s", "plain ascii body", None, false, false);
    desc.encoding = TransferEncoding::Base64;
    let message = Composer::default().compose(&desc).unwrap();
    assert!(message.header.contains("Content-Transfer-Encoding: base64\r\n"));
}
