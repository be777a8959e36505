//! `MailBooster` - command-line mail sender
//!
//! Composes a message from flags and delivers it with the transport
//! configuration from `--config` or the user configuration directory.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use mailbooster_core::{MailError, Mailer, TransportConfig};
use mailbooster_mime::{ComposeOptions, Composer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command, SendArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailbooster=info,mailbooster_core=info,mailbooster_smtp=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(cli::default_config_path);

    match cli.command {
        Command::Send(args) => send(&cli::load_config(&config_path)?, &args).await,
        Command::Compose(args) => compose(&args),
        Command::InitConfig { force } => init_config(&config_path, force),
    }
}

async fn send(config: &TransportConfig, args: &SendArgs) -> Result<()> {
    let desc = args.descriptor()?;
    let mut mailer = Mailer::new(config.clone())?;
    info!(hosts = %config.hosts, "Sending message");

    let result = mailer.send(&desc).await;
    mailer.close().await;

    match result {
        Ok(report) => {
            println!("Message-ID: {}", report.message_id);
            if let Some(id) = &report.transaction_id {
                println!("Queued as: {id}");
            }
            println!("Host: {}", report.host);
            for recipient in &report.recipients {
                println!("  accepted {}", recipient.address);
            }
            Ok(())
        }
        Err(MailError::Recipients(report)) => {
            println!("Message-ID: {}", report.message_id);
            for recipient in &report.recipients {
                if recipient.accepted {
                    println!("  accepted {}", recipient.address);
                } else {
                    println!("  rejected {}: {}", recipient.address, recipient.detail);
                }
            }
            if report.delivered {
                bail!("some recipients were rejected");
            }
            bail!("all recipients were rejected");
        }
        Err(e) => {
            let kind = e.kind();
            Err(anyhow::Error::new(e).context(format!("send failed ({kind} error)")))
        }
    }
}

fn compose(args: &SendArgs) -> Result<()> {
    let desc = args.descriptor()?;
    let message = Composer::new(ComposeOptions::default())
        .compose(&desc)
        .context("cannot compose message")?;
    print!("{}", message.to_message());
    Ok(())
}

fn init_config(path: &std::path::Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create {}", dir.display()))?;
    }
    let contents = serde_json::to_string_pretty(&TransportConfig::default())?;
    std::fs::write(path, contents).with_context(|| format!("cannot write {}", path.display()))?;
    info!("Configuration written to {:?}", path);
    println!("{}", path.display());
    Ok(())
}
