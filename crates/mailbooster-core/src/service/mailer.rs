//! Delivery of composed messages over SMTP.
//!
//! The [`Mailer`] composes a descriptor, walks the configured host list
//! until one host accepts a connection and the EHLO/STARTTLS/AUTH
//! negotiation, then runs the envelope and DATA. Recipients are tried one by
//! one; a rejection is recorded and the remaining recipients still get their
//! RCPT TO.

use std::sync::Arc;

use mailbooster_mime::{ComposeOptions, ComposedMessage, Composer, MessageDescriptor};
use mailbooster_oauth::TokenProvider;
use mailbooster_smtp::{Address, AuthMechanism, Credentials, MailOptions, Session};

use crate::config::{Security, TransportConfig};
use crate::error::{MailError, Result};
use crate::host::HostEntry;
use crate::report::{HostFailure, RecipientOutcome, SendOutcome, SendReport};

/// Why negotiation with one host stopped.
enum NegotiationError {
    Session(mailbooster_smtp::Error),
    Authentication(mailbooster_smtp::Error),
}

/// A session that finished negotiation, bound to the host it talks to.
struct Connection {
    session: Session,
    host: HostEntry,
}

/// Sends messages with one transport configuration.
pub struct Mailer {
    config: TransportConfig,
    composer: Composer,
    credentials: Option<Credentials>,
    mechanism: Option<AuthMechanism>,
    connection: Option<Connection>,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("hosts", &self.config.hosts)
            .field("composer", &self.composer)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Mailer {
    /// Creates a mailer.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: TransportConfig) -> Result<Self> {
        config.validate()?;
        let credentials = config.auth.as_ref().map(|a| a.credentials()).transpose()?;
        let mechanism = config
            .auth
            .as_ref()
            .and_then(|a| a.mechanism)
            .map(AuthMechanism::from);
        let mut options = ComposeOptions::default();
        if let Some(helo) = &config.helo {
            options.hostname.clone_from(helo);
        }
        Ok(Self {
            config,
            composer: Composer::new(options),
            credentials,
            mechanism,
            connection: None,
        })
    }

    /// Replaces the composition options.
    #[must_use]
    pub fn with_compose_options(mut self, options: ComposeOptions) -> Self {
        self.composer = Composer::new(options);
        self
    }

    /// Supplies the XOAUTH2 token source, overriding any configured one.
    ///
    /// The token is requested for the configured auth username. XOAUTH2
    /// becomes the mechanism unless the configuration names another one.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Config`] if the configuration has no `auth`
    /// section to take the username from.
    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Result<Self> {
        let credentials = self.credentials.take().ok_or_else(|| {
            MailError::Config("a token provider needs an auth section with a username".into())
        })?;
        self.credentials = Some(credentials.with_token_provider(provider));
        if self.mechanism.is_none() {
            self.mechanism = Some(AuthMechanism::XOAuth2);
        }
        Ok(self)
    }

    /// Returns the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns true while a kept-alive connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.session.is_connected())
    }

    /// Composes and sends a message.
    ///
    /// # Errors
    ///
    /// - [`MailError::Compose`] or [`MailError::InvalidAddress`] before any
    ///   network activity
    /// - [`MailError::Connect`] when no host could be used
    /// - [`MailError::Authentication`] when the last host tried refused the
    ///   credentials
    /// - [`MailError::Smtp`] when MAIL FROM or DATA is rejected or the
    ///   connection breaks
    /// - [`MailError::Recipients`] when any recipient was rejected; its
    ///   report tells whether the accepted ones still got the message
    pub async fn send(&mut self, desc: &MessageDescriptor) -> Result<SendReport> {
        let message = self.composer.compose(desc)?;
        let sender = envelope_address(desc.envelope_sender())?;
        let recipients = desc
            .envelope_recipients()
            .iter()
            .map(|r| envelope_address(r))
            .collect::<Result<Vec<_>>>()?;

        let kept = match self.connection.take() {
            Some(conn) => revive(conn).await,
            None => None,
        };
        let mut connection = match kept {
            Some(conn) => conn,
            None => self.connect().await?,
        };

        let result = transact(&mut connection, &message, &sender, &recipients).await;
        self.finish(connection, result.is_ok()).await;

        let report = result?;
        if report.rejected().next().is_some() {
            return Err(MailError::Recipients(Box::new(report)));
        }
        tracing::info!(
            message_id = %report.message_id,
            transaction_id = ?report.transaction_id,
            host = %report.host,
            recipients = report.recipients.len(),
            "Message sent"
        );
        Ok(report)
    }

    /// Like [`send`](Self::send), but folds any error into a pass/fail
    /// outcome with a diagnostic string.
    pub async fn send_outcome(&mut self, desc: &MessageDescriptor) -> SendOutcome {
        SendOutcome::from(self.send(desc).await)
    }

    /// Ends a kept-alive connection with QUIT. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            if let Err(e) = conn.session.quit().await {
                tracing::debug!(error = %e, "QUIT failed");
            }
            conn.session.close().await;
        }
    }

    /// Tries each configured host in order until one completes
    /// negotiation.
    async fn connect(&self) -> Result<Connection> {
        let hosts = self.config.host_entries();
        let mut failures = Vec::new();
        let mut auth_error = None;

        for host in hosts {
            let mut session = Session::new(self.config.timeouts());
            let implicit_tls = host.security == Security::Ssl;

            if let Err(e) = session.connect(&host.host, host.port, implicit_tls).await {
                tracing::warn!(host = %host, error = %e, "SMTP connect failed");
                failures.push(host_failure(&host, &e));
                auth_error = None;
                continue;
            }

            match self.negotiate(&mut session, &host).await {
                Ok(()) => {
                    tracing::info!(host = %host, tls = session.is_tls(), "Using SMTP host");
                    return Ok(Connection { session, host });
                }
                Err(NegotiationError::Authentication(e)) => {
                    tracing::warn!(host = %host, error = %e, "SMTP authentication failed");
                    failures.push(host_failure(&host, &e));
                    auth_error = Some(e);
                }
                Err(NegotiationError::Session(e)) => {
                    tracing::warn!(host = %host, error = %e, "SMTP negotiation failed");
                    failures.push(host_failure(&host, &e));
                    auth_error = None;
                }
            }
            quit_quietly(&mut session).await;
        }

        match auth_error {
            Some(e) => Err(MailError::Authentication(e)),
            None => Err(MailError::Connect(failures)),
        }
    }

    /// EHLO, optional STARTTLS, optional AUTH.
    async fn negotiate(
        &self,
        session: &mut Session,
        host: &HostEntry,
    ) -> std::result::Result<(), NegotiationError> {
        let helo = self
            .config
            .helo
            .as_deref()
            .unwrap_or(&self.composer.options().hostname);
        session.hello(helo).await.map_err(NegotiationError::Session)?;

        let wants_tls = match host.security {
            Security::Tls => true,
            Security::Ssl => false,
            Security::None => self.config.auto_tls && session.server_info().supports_starttls(),
        };
        if wants_tls {
            session.start_tls().await.map_err(NegotiationError::Session)?;
        }

        if let Some(credentials) = &self.credentials {
            session
                .authenticate(credentials, self.mechanism)
                .await
                .map_err(NegotiationError::Authentication)?;
        }
        Ok(())
    }

    /// Keeps the connection for the next send or ends it.
    async fn finish(&mut self, mut connection: Connection, succeeded: bool) {
        if !self.config.keep_alive {
            quit_quietly(&mut connection.session).await;
            return;
        }
        if !connection.session.is_connected() {
            return;
        }
        if let Err(e) = connection.session.reset().await {
            tracing::debug!(error = %e, succeeded, "RSET failed, dropping kept-alive connection");
            quit_quietly(&mut connection.session).await;
            return;
        }
        self.connection = Some(connection);
    }
}

/// MAIL FROM, RCPT TO for each recipient, then DATA if any was accepted.
async fn transact(
    connection: &mut Connection,
    message: &ComposedMessage,
    sender: &Address,
    recipients: &[Address],
) -> Result<SendReport> {
    let session = &mut connection.session;
    let payload = message.to_message();
    let options = MailOptions {
        size: Some(payload.len()),
        eight_bit: payload.bytes().any(|b| b >= 0x80),
    };
    session.mail(sender, options).await?;

    let mut outcomes = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        match session.recipient(recipient).await {
            Ok(()) => outcomes.push(RecipientOutcome::accepted(recipient.as_str())),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(recipient = %recipient, error = %e, "Recipient rejected");
                let detail = session
                    .last_error()
                    .map_or_else(|| e.to_string(), |last| last.detail.clone());
                outcomes.push(RecipientOutcome::rejected(recipient.as_str(), detail, e.code()));
            }
        }
    }

    let mut report = SendReport {
        message_id: message.message_id.clone(),
        transaction_id: None,
        host: connection.host.to_string(),
        delivered: false,
        recipients: outcomes,
    };
    if report.accepted().next().is_none() {
        return Ok(report);
    }

    let delivery = session.data(&payload).await?;
    report.transaction_id = delivery.transaction_id;
    report.delivered = true;
    Ok(report)
}

/// Checks a kept-alive connection with NOOP before reuse. A connection the
/// server has dropped is closed and `None` returned.
async fn revive(mut connection: Connection) -> Option<Connection> {
    if !connection.session.is_connected() {
        return None;
    }
    match connection.session.noop().await {
        Ok(()) => Some(connection),
        Err(e) => {
            tracing::debug!(
                host = %connection.host,
                error = %e,
                "Kept-alive connection is gone, reconnecting"
            );
            connection.session.close().await;
            None
        }
    }
}

async fn quit_quietly(session: &mut Session) {
    if let Err(e) = session.quit().await {
        tracing::debug!(error = %e, "QUIT failed");
    }
    session.close().await;
}

fn envelope_address(address: &str) -> Result<Address> {
    Address::new(address).map_err(|e| MailError::InvalidAddress(e.to_string()))
}

fn host_failure(host: &HostEntry, error: &mailbooster_smtp::Error) -> HostFailure {
    HostFailure {
        host: host.host.clone(),
        port: host.port,
        error: error.to_string(),
        code: error.code(),
    }
}
