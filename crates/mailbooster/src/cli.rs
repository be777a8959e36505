//! Command-line arguments and their translation into library types.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mailbooster_core::TransportConfig;
use mailbooster_mime::{Attachment, DkimConfig, Mailbox, MessageDescriptor, RecipientKind};

/// Send mail through SMTP with host failover, STARTTLS, SASL and DKIM.
#[derive(Parser, Debug)]
#[command(name = "mailbooster", version)]
pub struct Cli {
    /// Transport configuration file (JSON).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compose and send a message.
    Send(SendArgs),
    /// Print the message that would be sent, without connecting.
    Compose(SendArgs),
    /// Write a default transport configuration.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    /// Sender, `addr` or `Name <addr>`.
    #[arg(long)]
    pub from: String,

    /// Primary recipients.
    #[arg(long, required = true)]
    pub to: Vec<String>,

    /// Carbon-copy recipients.
    #[arg(long)]
    pub cc: Vec<String>,

    /// Blind carbon-copy recipients.
    #[arg(long)]
    pub bcc: Vec<String>,

    /// Reply-To addresses.
    #[arg(long)]
    pub reply_to: Vec<String>,

    /// Envelope sender, when it differs from `--from`.
    #[arg(long)]
    pub sender: Option<String>,

    /// Subject line.
    #[arg(short, long, default_value = "")]
    pub subject: String,

    /// Plain-text body.
    #[arg(long, conflicts_with = "text_file")]
    pub text: Option<String>,

    /// Read the plain-text body from a file.
    #[arg(long)]
    pub text_file: Option<PathBuf>,

    /// Read the HTML body from a file.
    #[arg(long)]
    pub html_file: Option<PathBuf>,

    /// Attach a file.
    #[arg(long)]
    pub attach: Vec<PathBuf>,

    /// Word-wrap width for the plain-text body (0 disables wrapping).
    #[arg(long, default_value_t = 0)]
    pub word_wrap: usize,

    /// Send even when the body is empty.
    #[arg(long)]
    pub allow_empty: bool,

    /// DKIM signing domain.
    #[arg(long, requires_all = ["dkim_selector", "dkim_key"])]
    pub dkim_domain: Option<String>,

    /// DKIM selector.
    #[arg(long)]
    pub dkim_selector: Option<String>,

    /// DKIM private key (PEM file).
    #[arg(long)]
    pub dkim_key: Option<PathBuf>,
}

impl SendArgs {
    /// Builds the message descriptor these arguments describe.
    ///
    /// # Errors
    ///
    /// Returns an error if an address is invalid or a file cannot be read.
    pub fn descriptor(&self) -> Result<MessageDescriptor> {
        let mut desc = MessageDescriptor::new(parse_mailbox(&self.from));
        desc.sender.clone_from(&self.sender);
        desc.subject.clone_from(&self.subject);
        desc.word_wrap = self.word_wrap;
        desc.allow_empty = self.allow_empty;

        let lists = [
            (RecipientKind::To, &self.to),
            (RecipientKind::Cc, &self.cc),
            (RecipientKind::Bcc, &self.bcc),
        ];
        for (kind, list) in lists {
            for raw in list {
                desc.add_recipient(kind, parse_mailbox(raw))
                    .with_context(|| format!("invalid recipient {raw}"))?;
            }
        }
        for raw in &self.reply_to {
            desc.add_reply_to(parse_mailbox(raw))
                .with_context(|| format!("invalid Reply-To {raw}"))?;
        }

        desc.text_body = match (&self.text, &self.text_file) {
            (Some(text), _) => Some(text.clone()),
            (None, Some(path)) => Some(read_text(path)?),
            (None, None) => None,
        };
        desc.html_body = self.html_file.as_deref().map(read_text).transpose()?;

        for path in &self.attach {
            desc.attach_file(Attachment::from_path(path))
                .with_context(|| format!("cannot attach {}", path.display()))?;
        }

        if let (Some(domain), Some(selector), Some(key)) =
            (&self.dkim_domain, &self.dkim_selector, &self.dkim_key)
        {
            desc.dkim = Some(DkimConfig {
                domain: domain.clone(),
                selector: selector.clone(),
                private_key: read_text(key)?,
                identity: None,
            });
        }
        Ok(desc)
    }
}

/// Parses `Name <addr>` or a bare address.
#[must_use]
pub fn parse_mailbox(raw: &str) -> Mailbox {
    let raw = raw.trim();
    match (raw.rfind('<'), raw.ends_with('>')) {
        (Some(open), true) => {
            let address = &raw[open + 1..raw.len() - 1];
            let name = raw[..open].trim().trim_matches('"').trim();
            let mailbox = Mailbox::new(address.trim());
            if name.is_empty() {
                mailbox
            } else {
                mailbox.with_name(name)
            }
        }
        _ => Mailbox::new(raw),
    }
}

/// Where the transport configuration lives when `--config` is not given.
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailbooster")
        .join("transport.json")
}

/// Loads the transport configuration from `path`.
///
/// # Errors
///
/// Returns an error if the file is missing or invalid.
pub fn load_config(path: &Path) -> Result<TransportConfig> {
    TransportConfig::from_path(path)
        .with_context(|| format!("cannot load transport configuration {}", path.display()))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn send_args(args: &[&str]) -> SendArgs {
        let mut argv = vec!["mailbooster", "send"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Send(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_mailbox() {
        let mailbox = parse_mailbox("\"Alice Example\" <alice@x.com>");
        assert_eq!(mailbox.address, "alice@x.com");
        assert_eq!(mailbox.name.as_deref(), Some("Alice Example"));

        let mailbox = parse_mailbox(" bob@y.com ");
        assert_eq!(mailbox.address, "bob@y.com");
        assert_eq!(mailbox.name, None);

        assert_eq!(parse_mailbox("<carol@z.com>").name, None);
    }

    #[test]
    fn test_descriptor_from_args() {
        let args = send_args(&[
            "--from",
            "Alice <a@x.com>",
            "--to",
            "b@y.com",
            "--to",
            "c@y.com",
            "--bcc",
            "d@y.com",
            "--subject",
            "Hi",
            "--text",
            "hello",
        ]);
        let desc = args.descriptor().unwrap();
        assert_eq!(desc.from.name.as_deref(), Some("Alice"));
        assert_eq!(desc.to.len(), 2);
        assert_eq!(desc.bcc.len(), 1);
        assert_eq!(desc.subject, "Hi");
        assert_eq!(desc.text_body.as_deref(), Some("hello"));
        assert_eq!(desc.envelope_recipients().len(), 3);
    }

    #[test]
    fn test_invalid_recipient_is_reported() {
        let args = send_args(&["--from", "a@x.com", "--to", "not an address"]);
        let err = args.descriptor().unwrap_err();
        assert!(err.to_string().contains("not an address"));
    }

    #[test]
    fn test_body_and_attachment_files() {
        let dir = tempfile::tempdir().unwrap();
        let body = dir.path().join("body.txt");
        let notes = dir.path().join("notes.txt");
        std::fs::write(&body, "from a file").unwrap();
        std::fs::write(&notes, "attached").unwrap();

        let args = send_args(&[
            "--from",
            "a@x.com",
            "--to",
            "b@y.com",
            "--text-file",
            body.to_str().unwrap(),
            "--attach",
            notes.to_str().unwrap(),
        ]);
        let desc = args.descriptor().unwrap();
        assert_eq!(desc.text_body.as_deref(), Some("from a file"));
        assert_eq!(desc.attachments.len(), 1);
    }

    #[test]
    fn test_dkim_flags_require_each_other() {
        let argv = [
            "mailbooster",
            "send",
            "--from",
            "a@x.com",
            "--to",
            "b@y.com",
            "--dkim-domain",
            "x.com",
        ];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_default_config_path() {
        assert!(default_config_path().ends_with("mailbooster/transport.json"));
    }
}
