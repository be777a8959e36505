//! The eight canonical MIME structures.

use std::fmt;

/// Overall structure of a composed message.
///
/// Chosen purely from three flags: an alternative (plain + HTML) body, inline
/// parts, and regular attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageShape {
    /// A single text part.
    Plain,
    /// `multipart/alternative` of plain and HTML.
    Alt,
    /// `multipart/related` of the body and inline parts.
    Inline,
    /// `multipart/mixed` of the body and attachments.
    Attach,
    /// `mixed` → `related` → body + inline parts, then attachments.
    InlineAttach,
    /// `alternative` → plain, `related` → HTML + inline parts.
    AltInline,
    /// `mixed` → `alternative` → plain + HTML, then attachments.
    AltAttach,
    /// `mixed` → `alternative` → plain, `related` → HTML + inline, then attachments.
    AltInlineAttach,
}

impl MessageShape {
    /// Selects the shape for the given content flags.
    #[must_use]
    pub const fn from_flags(has_alt: bool, has_inline: bool, has_attachment: bool) -> Self {
        match (has_alt, has_inline, has_attachment) {
            (false, false, false) => Self::Plain,
            (true, false, false) => Self::Alt,
            (false, true, false) => Self::Inline,
            (false, false, true) => Self::Attach,
            (false, true, true) => Self::InlineAttach,
            (true, true, false) => Self::AltInline,
            (true, false, true) => Self::AltAttach,
            (true, true, true) => Self::AltInlineAttach,
        }
    }

    /// Number of nested multipart boundaries this shape uses.
    #[must_use]
    pub const fn boundary_count(self) -> usize {
        match self {
            Self::Plain => 0,
            Self::Alt | Self::Inline | Self::Attach => 1,
            Self::InlineAttach | Self::AltInline | Self::AltAttach => 2,
            Self::AltInlineAttach => 3,
        }
    }

    /// Subtype of the outermost multipart, or `None` for [`Self::Plain`].
    #[must_use]
    pub const fn outer_subtype(self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::Inline => Some("related"),
            Self::Alt | Self::AltInline => Some("alternative"),
            Self::Attach | Self::InlineAttach | Self::AltAttach | Self::AltInlineAttach => {
                Some("mixed")
            }
        }
    }

    /// Returns the conventional lower-case name (`alt_inline_attach`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Alt => "alt",
            Self::Inline => "inline",
            Self::Attach => "attach",
            Self::InlineAttach => "inline_attach",
            Self::AltInline => "alt_inline",
            Self::AltAttach => "alt_attach",
            Self::AltInlineAttach => "alt_inline_attach",
        }
    }
}

impl fmt::Display for MessageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
