//! SMTP session state machine.
//!
//! One [`Session`] owns one connection. Every operation checks the current
//! [`SessionState`] first and fails fast without touching the network when
//! the command is not valid yet. Rejections are returned as
//! [`Error::SmtpError`] and remembered in [`Session::last_error`]; I/O
//! failures and timeouts also drop the connection.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mailbooster_oauth::sasl;
use tokio::time::{Instant, timeout};

use super::ServerInfo;
use super::stream::{SmtpStream, connect, connect_tls};
use crate::auth::{self, Credentials, ntlm};
use crate::command::Command;
use crate::data;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply, transaction_id};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};

/// Bytes written per timed write while streaming DATA.
const DATA_CHUNK: usize = 64 * 1024;

/// Where the session is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket.
    Disconnected,
    /// Socket open and banner read.
    Connected,
    /// EHLO or HELO accepted.
    Greeted,
    /// STARTTLS completed and EHLO re-issued.
    TlsEstablished,
    /// AUTH succeeded.
    Authenticated,
    /// MAIL FROM accepted; recipients and DATA may follow.
    InTransaction,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Greeted => "greeted",
            Self::TlsEstablished => "tls-established",
            Self::Authenticated => "authenticated",
            Self::InTransaction => "in-transaction",
        };
        f.write_str(name)
    }
}

/// Time budgets for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP connect and TLS handshake.
    pub connect: Duration,
    /// Each individual read or write.
    pub command: Duration,
    /// Whole reply to one command; doubled for the end of DATA.
    pub time_limit: Duration,
}

impl Timeouts {
    /// Uses the same duration for every budget.
    #[must_use]
    pub const fn uniform(duration: Duration) -> Self {
        Self {
            connect: duration,
            command: duration,
            time_limit: duration,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(300))
    }
}

/// Structured record of the most recent failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    /// Human readable summary.
    pub message: String,
    /// Server text or local detail.
    pub detail: String,
    /// SMTP reply code, when the server produced the error.
    pub code: Option<u16>,
    /// Enhanced status code, when the server sent one.
    pub enhanced_code: Option<String>,
}

impl From<&Error> for LastError {
    fn from(error: &Error) -> Self {
        match error {
            Error::SmtpError {
                command,
                code,
                enhanced_code,
                message,
            } => Self {
                message: format!("{command} command failed"),
                detail: message.clone(),
                code: Some(*code),
                enhanced_code: enhanced_code.clone(),
            },
            other => Self {
                message: other.to_string(),
                detail: String::new(),
                code: None,
                enhanced_code: None,
            },
        }
    }
}

/// Parameters for `MAIL FROM`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailOptions {
    /// Message size, sent as `SIZE=` when the server supports it.
    pub size: Option<usize>,
    /// Message contains 8-bit data; sends `BODY=8BITMIME` when supported.
    pub eight_bit: bool,
}

/// Outcome of a completed DATA transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Final reply from the server.
    pub reply: Reply,
    /// Queue identifier parsed from the reply, if recognizable.
    pub transaction_id: Option<String>,
}

/// One SMTP connection and its protocol state.
#[derive(Debug)]
pub struct Session {
    stream: Option<SmtpStream>,
    state: SessionState,
    server_info: ServerInfo,
    timeouts: Timeouts,
    host: String,
    client_name: String,
    greeting: Option<Reply>,
    last_reply: Option<Reply>,
    last_error: Option<LastError>,
    starttls_done: bool,
    authenticated: bool,
    accepted_recipients: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Timeouts::default())
    }
}

impl Session {
    /// Creates a disconnected session.
    #[must_use]
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            stream: None,
            state: SessionState::Disconnected,
            server_info: ServerInfo::default(),
            timeouts,
            host: String::new(),
            client_name: String::new(),
            greeting: None,
            last_reply: None,
            last_error: None,
            starttls_done: false,
            authenticated: false,
            accepted_recipients: 0,
        }
    }

    /// Current protocol state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true while a socket is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns true if the connection is encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.stream.as_ref().is_some_and(SmtpStream::is_tls)
    }

    /// Capabilities learned from the greeting and EHLO.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// The server's banner.
    #[must_use]
    pub const fn greeting(&self) -> Option<&Reply> {
        self.greeting.as_ref()
    }

    /// Most recent reply read from the server.
    #[must_use]
    pub const fn last_reply(&self) -> Option<&Reply> {
        self.last_reply.as_ref()
    }

    /// Most recent failure.
    #[must_use]
    pub const fn last_error(&self) -> Option<&LastError> {
        self.last_error.as_ref()
    }

    /// Configured time budgets.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Opens a connection and reads the 220 banner.
    ///
    /// With `implicit_tls` the TLS handshake happens before the banner.
    ///
    /// # Errors
    ///
    /// Returns an error if already connected, if the connection or
    /// handshake fails, or if the banner is not 220.
    pub async fn connect(&mut self, host: &str, port: u16, implicit_tls: bool) -> Result<Reply> {
        let result = self.open(host, port, implicit_tls).await;
        self.track(result)
    }

    async fn open(&mut self, host: &str, port: u16, implicit_tls: bool) -> Result<Reply> {
        if self.stream.is_some() {
            return Err(Error::InvalidState("Already connected to a server".into()));
        }

        tracing::debug!(host, port, implicit_tls, "Connecting");
        let stream = if implicit_tls {
            connect_tls(host, port, self.timeouts.connect).await?
        } else {
            connect(host, port, self.timeouts.connect).await?
        };
        self.reset_connection_state();
        self.stream = Some(stream);
        self.host = host.to_string();
        self.state = SessionState::Connected;

        let greeting = self.read_reply(self.timeouts.time_limit).await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            self.close().await;
            return Err(Error::from_reply("CONNECT", &greeting));
        }

        self.server_info.hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        tracing::info!(host, port, server = %self.server_info.hostname, "Connected to SMTP server");
        self.greeting = Some(greeting.clone());
        Ok(greeting)
    }

    /// Sends EHLO, falling back to HELO if EHLO is rejected, and records
    /// the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if not connected or both greetings are rejected.
    pub async fn hello(&mut self, client_name: &str) -> Result<()> {
        let result = self.greet(client_name).await;
        self.track(result)
    }

    async fn greet(&mut self, client_name: &str) -> Result<()> {
        self.require_connection()?;
        if self.state == SessionState::InTransaction {
            return Err(Error::InvalidState("Cannot greet during a mail transaction".into()));
        }

        let ehlo = self
            .exchange(Command::Ehlo {
                hostname: client_name.to_string(),
            })
            .await?;

        if ehlo.code == ReplyCode::OK {
            self.server_info.esmtp = true;
            self.server_info.extensions = ehlo
                .message
                .iter()
                .skip(1)
                .map(|line| Extension::parse(line))
                .collect();
        } else {
            tracing::debug!(code = %ehlo.code, "EHLO rejected, falling back to HELO");
            self.expect(
                Command::Helo {
                    hostname: client_name.to_string(),
                },
                &[ReplyCode::OK],
            )
            .await?;
            self.server_info.esmtp = false;
            self.server_info.extensions.clear();
        }

        self.client_name = client_name.to_string();
        self.state = self.idle_state();
        Ok(())
    }

    /// Upgrades the connection with STARTTLS and re-issues EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if no greeting has been exchanged, TLS is already
    /// active, the server did not advertise STARTTLS, the command is
    /// rejected, or the handshake fails.
    pub async fn start_tls(&mut self) -> Result<()> {
        let result = self.upgrade().await;
        self.track(result)
    }

    async fn upgrade(&mut self) -> Result<()> {
        self.require_greeting()?;
        if self.is_tls() {
            return Err(Error::InvalidState("TLS is already active".into()));
        }
        if self.server_info.esmtp && !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        self.expect(Command::StartTls, &[ReplyCode::SERVICE_READY])
            .await?;

        let stream = self.stream.take().ok_or_else(not_connected)?;
        match stream.upgrade_to_tls(&self.host, self.timeouts.connect).await {
            Ok(tls) => self.stream = Some(tls),
            Err(e) => {
                self.reset_connection_state();
                return Err(e);
            }
        }
        tracing::info!(host = %self.host, "STARTTLS negotiated");

        // Capabilities learned in plaintext must be discarded
        self.starttls_done = true;
        self.server_info.extensions.clear();
        let client_name = self.client_name.clone();
        self.greet(&client_name).await
    }

    /// Authenticates with the requested mechanism, or the first advertised
    /// one from [`AuthMechanism::PREFERENCE`].
    ///
    /// # Errors
    ///
    /// Returns an error if called before HELO/EHLO, if the server did not
    /// advertise AUTH, if the mechanism is not available, if a token cannot
    /// be obtained, or if the server rejects the credentials.
    pub async fn authenticate(
        &mut self,
        credentials: &Credentials,
        mechanism: Option<AuthMechanism>,
    ) -> Result<AuthMechanism> {
        let result = self.login(credentials, mechanism).await;
        self.track(result)
    }

    async fn login(
        &mut self,
        credentials: &Credentials,
        requested: Option<AuthMechanism>,
    ) -> Result<AuthMechanism> {
        self.require_connection()?;
        match self.state {
            SessionState::Connected => {
                return Err(Error::Auth(
                    "Authentication is not allowed before HELO/EHLO".into(),
                ));
            }
            SessionState::Authenticated => {
                return Err(Error::InvalidState("Already authenticated".into()));
            }
            SessionState::InTransaction => {
                return Err(Error::InvalidState(
                    "Cannot authenticate during a mail transaction".into(),
                ));
            }
            _ => {}
        }
        if !self.server_info.advertises_auth() {
            return Err(Error::Auth(
                "Authentication is not allowed at this stage".into(),
            ));
        }

        let mechanism = auth::select_mechanism(
            &self.server_info.auth_mechanisms(),
            requested,
            credentials.token_provider.is_some(),
        )?;
        tracing::info!(%mechanism, user = %credentials.username, "Authenticating");

        match mechanism {
            AuthMechanism::Plain => self.auth_plain(credentials).await?,
            AuthMechanism::Login => self.auth_login(credentials).await?,
            AuthMechanism::CramMd5 => self.auth_cram_md5(credentials).await?,
            AuthMechanism::Ntlm => self.auth_ntlm(credentials).await?,
            AuthMechanism::XOAuth2 => self.auth_xoauth2(credentials).await?,
        }

        self.authenticated = true;
        self.state = SessionState::Authenticated;
        Ok(mechanism)
    }

    async fn auth_plain(&mut self, credentials: &Credentials) -> Result<()> {
        self.expect(auth_start(AuthMechanism::Plain, None), &[ReplyCode::AUTH_CONTINUE])
            .await?;
        let response = sasl::plain_response(&credentials.username, &credentials.password);
        self.expect(Command::AuthResponse(response), &[ReplyCode::AUTH_SUCCESS])
            .await?;
        Ok(())
    }

    async fn auth_login(&mut self, credentials: &Credentials) -> Result<()> {
        self.expect(auth_start(AuthMechanism::Login, None), &[ReplyCode::AUTH_CONTINUE])
            .await?;
        self.expect(
            Command::AuthResponse(auth::login_field(&credentials.username)),
            &[ReplyCode::AUTH_CONTINUE],
        )
        .await?;
        self.expect(
            Command::AuthResponse(auth::login_field(&credentials.password)),
            &[ReplyCode::AUTH_SUCCESS],
        )
        .await?;
        Ok(())
    }

    async fn auth_cram_md5(&mut self, credentials: &Credentials) -> Result<()> {
        let challenge = self
            .expect(auth_start(AuthMechanism::CramMd5, None), &[ReplyCode::AUTH_CONTINUE])
            .await?;
        let response = auth::cram_md5_response(
            &credentials.username,
            &credentials.password,
            &challenge.message_text(),
        )?;
        self.expect(Command::AuthResponse(response), &[ReplyCode::AUTH_SUCCESS])
            .await?;
        Ok(())
    }

    async fn auth_ntlm(&mut self, credentials: &Credentials) -> Result<()> {
        let negotiate = STANDARD.encode(ntlm::negotiate_message());
        let reply = self
            .expect(
                auth_start(AuthMechanism::Ntlm, Some(negotiate)),
                &[ReplyCode::AUTH_CONTINUE],
            )
            .await?;

        let raw = STANDARD
            .decode(reply.message_text().trim())
            .map_err(|e| Error::Auth(format!("Invalid NTLM challenge: {e}")))?;
        let challenge = ntlm::Challenge::parse(&raw)?;
        let identity = ntlm::Identity {
            username: &credentials.username,
            password: &credentials.password,
            domain: &credentials.realm,
            workstation: &credentials.workstation,
        };
        let message = ntlm::authenticate_message(
            &challenge,
            identity,
            ntlm::client_challenge(),
            ntlm::filetime_now(),
        )?;
        self.expect(
            Command::AuthResponse(STANDARD.encode(message)),
            &[ReplyCode::AUTH_SUCCESS],
        )
        .await?;
        Ok(())
    }

    async fn auth_xoauth2(&mut self, credentials: &Credentials) -> Result<()> {
        let provider = credentials
            .token_provider
            .as_ref()
            .ok_or_else(|| Error::Auth("XOAUTH2 requires a token provider".into()))?;
        let token = provider.bearer_token(&credentials.username).await?;
        let initial = sasl::xoauth2_response(&credentials.username, &token);

        let reply = self
            .exchange(auth_start(AuthMechanism::XOAuth2, Some(initial)))
            .await?;
        if reply.code == ReplyCode::AUTH_SUCCESS {
            return Ok(());
        }
        if reply.code != ReplyCode::AUTH_CONTINUE {
            return Err(Error::from_reply("AUTH", &reply));
        }

        // Token rejected: the server explains in a 334 and waits for an
        // empty line before sending the final error
        if let Some(details) = sasl::parse_oauth_challenge(&reply.message_text()) {
            tracing::warn!(
                status = %details.status,
                scope = ?details.scope,
                "XOAUTH2 token rejected"
            );
        }
        let reply = self.exchange(Command::AuthResponse(String::new())).await?;
        Err(Error::from_reply("AUTH", &reply))
    }

    /// Starts a mail transaction with `MAIL FROM`.
    ///
    /// # Errors
    ///
    /// Returns an error if no greeting has been exchanged, a transaction is
    /// already open, the declared size exceeds the server limit, or the
    /// sender is rejected.
    pub async fn mail(&mut self, from: &Address, options: MailOptions) -> Result<()> {
        let result = self.start_transaction(from, options).await;
        self.track(result)
    }

    async fn start_transaction(&mut self, from: &Address, options: MailOptions) -> Result<()> {
        self.require_greeting()?;
        if self.state == SessionState::InTransaction {
            return Err(Error::InvalidState("Mail transaction already open".into()));
        }
        if let Some(size) = options.size {
            self.check_size(size)?;
        }

        let body = (options.eight_bit && self.server_info.supports_8bitmime())
            .then(|| "8BITMIME".to_string());
        let size = options.size.filter(|_| self.server_info.supports_size());
        self.expect(
            Command::MailFrom {
                from: from.clone(),
                body,
                size,
            },
            &[ReplyCode::OK],
        )
        .await?;

        self.accepted_recipients = 0;
        self.state = SessionState::InTransaction;
        Ok(())
    }

    /// Adds a recipient with `RCPT TO`.
    ///
    /// A rejection leaves the transaction open so further recipients can
    /// still be tried.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open or the recipient is
    /// rejected.
    pub async fn recipient(&mut self, to: &Address) -> Result<()> {
        let result = self.add_recipient(to).await;
        self.track(result)
    }

    async fn add_recipient(&mut self, to: &Address) -> Result<()> {
        self.require_greeting()?;
        if self.state != SessionState::InTransaction {
            return Err(Error::InvalidState("RCPT TO requires MAIL FROM first".into()));
        }
        self.expect(
            Command::RcptTo { to: to.clone() },
            &[ReplyCode::OK, ReplyCode::FORWARD],
        )
        .await?;
        self.accepted_recipients += 1;
        Ok(())
    }

    /// Sends `DATA`, streams the prepared message and reads the final reply.
    ///
    /// The final reply gets twice the usual time limit. The transaction is
    /// closed once that reply arrives, whatever its code.
    ///
    /// # Errors
    ///
    /// Returns an error if no recipient was accepted, the message exceeds
    /// the advertised SIZE, or the server rejects DATA or the message.
    pub async fn data(&mut self, message: &str) -> Result<Delivery> {
        let result = self.transfer(message).await;
        self.track(result)
    }

    async fn transfer(&mut self, message: &str) -> Result<Delivery> {
        self.require_greeting()?;
        if self.state != SessionState::InTransaction {
            return Err(Error::InvalidState("DATA requires MAIL FROM first".into()));
        }
        if self.accepted_recipients == 0 {
            return Err(Error::InvalidState(
                "DATA requires at least one accepted recipient".into(),
            ));
        }
        self.check_size(message.len())?;

        self.expect(Command::Data, &[ReplyCode::START_DATA]).await?;

        let payload = data::encode(message);
        tracing::debug!(bytes = payload.len(), "C: <message data>");
        for chunk in payload.chunks(DATA_CHUNK) {
            self.write(chunk).await?;
        }

        let reply = self.read_reply(self.timeouts.time_limit * 2).await?;
        self.accepted_recipients = 0;
        self.state = self.idle_state();
        if reply.code != ReplyCode::OK {
            return Err(Error::from_reply("DATA", &reply));
        }

        let transaction_id = transaction_id(&reply);
        tracing::debug!(transaction_id = ?transaction_id, "Message accepted");
        Ok(Delivery {
            reply,
            transaction_id,
        })
    }

    /// Aborts the current transaction with `RSET`.
    ///
    /// # Errors
    ///
    /// Returns an error if no greeting has been exchanged or RSET is
    /// rejected.
    pub async fn reset(&mut self) -> Result<()> {
        let result = self.rset().await;
        self.track(result)
    }

    async fn rset(&mut self) -> Result<()> {
        self.require_greeting()?;
        self.expect(Command::Rset, &[ReplyCode::OK]).await?;
        self.accepted_recipients = 0;
        self.state = self.idle_state();
        Ok(())
    }

    /// Sends `NOOP`, e.g. to check a kept-alive connection.
    ///
    /// # Errors
    ///
    /// Returns an error if no greeting has been exchanged or the server
    /// does not answer 250.
    pub async fn noop(&mut self) -> Result<()> {
        let result = self.ping().await;
        self.track(result)
    }

    async fn ping(&mut self) -> Result<()> {
        self.require_greeting()?;
        self.expect(Command::Noop, &[ReplyCode::OK]).await?;
        Ok(())
    }

    /// Asks the server to verify a name with `VRFY`.
    ///
    /// # Errors
    ///
    /// Returns an error if no greeting has been exchanged or the server
    /// answers with anything but 250, 251 or 252.
    pub async fn verify(&mut self, name: &str) -> Result<Reply> {
        let result = self.vrfy(name).await;
        self.track(result)
    }

    async fn vrfy(&mut self, name: &str) -> Result<Reply> {
        self.require_greeting()?;
        self.expect(
            Command::Vrfy {
                address: name.to_string(),
            },
            &[ReplyCode::OK, ReplyCode::FORWARD, ReplyCode::CANNOT_VERIFY],
        )
        .await
    }

    /// Sends `QUIT` and closes the connection.
    ///
    /// Allowed in any connected state so a failed negotiation can still be
    /// ended politely. Does nothing when already disconnected.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer 221; the connection
    /// is closed either way.
    pub async fn quit(&mut self) -> Result<()> {
        if self.stream.is_none() {
            return Ok(());
        }
        let result = self.expect(Command::Quit, &[ReplyCode::CLOSING]).await.map(drop);
        self.close().await;
        self.track(result)
    }

    /// Closes the socket without QUIT. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await;
            tracing::debug!(host = %self.host, "Connection closed");
        }
        self.reset_connection_state();
    }

    async fn exchange(&mut self, command: Command) -> Result<Reply> {
        tracing::debug!(command = %command.redacted(), "C:");
        self.write(&command.serialize()).await?;
        self.read_reply(self.timeouts.time_limit).await
    }

    async fn expect(&mut self, command: Command, codes: &[ReplyCode]) -> Result<Reply> {
        let name = command.name();
        let reply = self.exchange(command).await?;
        if codes.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(Error::from_reply(name, &reply))
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        timeout(self.timeouts.command, stream.write_all(bytes))
            .await
            .map_err(|_| Error::Timeout("write"))?
    }

    async fn read_reply(&mut self, time_limit: Duration) -> Result<Reply> {
        let per_read = self.timeouts.command;
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        let deadline = Instant::now() + time_limit;

        let mut lines = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout("reply time limit"));
            }
            let line = timeout(remaining.min(per_read), stream.read_line())
                .await
                .map_err(|_| Error::Timeout("read"))??;
            tracing::debug!(%line, "S:");
            if line.is_empty() {
                continue;
            }

            let is_last = is_last_reply_line(&line);
            lines.push(line);
            if is_last {
                break;
            }
        }

        let reply = parse_reply(&lines)?;
        self.last_reply = Some(reply.clone());
        Ok(reply)
    }

    fn check_size(&self, size: usize) -> Result<()> {
        match self.server_info.max_message_size() {
            Some(limit) if size > limit => Err(Error::MessageTooLarge { size, limit }),
            _ => Ok(()),
        }
    }

    fn require_connection(&self) -> Result<()> {
        if self.stream.is_none() {
            return Err(not_connected());
        }
        Ok(())
    }

    fn require_greeting(&self) -> Result<()> {
        self.require_connection()?;
        if self.state == SessionState::Connected {
            return Err(Error::InvalidState(
                "Command not allowed before HELO/EHLO".into(),
            ));
        }
        Ok(())
    }

    const fn idle_state(&self) -> SessionState {
        if self.authenticated {
            SessionState::Authenticated
        } else if self.starttls_done {
            SessionState::TlsEstablished
        } else {
            SessionState::Greeted
        }
    }

    fn reset_connection_state(&mut self) {
        self.stream = None;
        self.state = SessionState::Disconnected;
        self.server_info = ServerInfo::default();
        self.greeting = None;
        self.starttls_done = false;
        self.authenticated = false;
        self.accepted_recipients = 0;
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.last_error = Some(LastError::from(e));
            if e.is_fatal() && self.stream.is_some() {
                tracing::debug!(error = %e, "Dropping connection");
                self.reset_connection_state();
            }
        }
        result
    }
}

fn auth_start(mechanism: AuthMechanism, initial_response: Option<String>) -> Command {
    Command::Auth {
        mechanism,
        initial_response,
    }
}

fn not_connected() -> Error {
    Error::InvalidState("Not connected to a server".into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commands_fail_fast_when_disconnected() {
        let mut session = Session::default();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_connected());

        assert!(matches!(session.hello("me").await, Err(Error::InvalidState(_))));
        let from = Address::new("a@x.com").unwrap();
        assert!(matches!(
            session.mail(&from, MailOptions::default()).await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(session.recipient(&from).await, Err(Error::InvalidState(_))));
        assert!(matches!(session.data("x").await, Err(Error::InvalidState(_))));
        assert!(matches!(session.noop().await, Err(Error::InvalidState(_))));
        assert!(matches!(
            session.authenticate(&Credentials::new("u", "p"), None).await,
            Err(Error::InvalidState(_))
        ));

        let last = session.last_error().unwrap();
        assert!(last.message.contains("Not connected"));
        assert_eq!(last.code, None);
    }

    #[tokio::test]
    async fn test_quit_and_close_are_idempotent() {
        let mut session = Session::default();
        session.quit().await.unwrap();
        session.close().await;
        session.close().await;
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_last_error_from_smtp_error() {
        let reply = Reply::new(ReplyCode::new(535), vec!["5.7.8 bad credentials".into()]);
        let last = LastError::from(&Error::from_reply("AUTH", &reply));
        assert_eq!(last.message, "AUTH command failed");
        assert_eq!(last.detail, "bad credentials");
        assert_eq!(last.code, Some(535));
        assert_eq!(last.enhanced_code.as_deref(), Some("5.7.8"));
    }

    #[test]
    fn test_timeouts_default() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.connect, Duration::from_secs(300));
        assert_eq!(timeouts, Timeouts::uniform(Duration::from_secs(300)));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::TlsEstablished.to_string(), "tls-established");
        assert_eq!(SessionState::InTransaction.to_string(), "in-transaction");
    }
}
