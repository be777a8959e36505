//! End-to-end tests for the mailer.
//!
//! Scripted SMTP servers on loopback sockets answer each command with the
//! next canned reply and return what the client sent.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use mailbooster_core::{
    AuthConfig, ErrorKind, MailError, Mailer, Mechanism, TransportConfig,
};
use mailbooster_mime::{Mailbox, MessageDescriptor};
use mailbooster_oauth::StaticTokenProvider;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Marks a step that consumes the message body up to the `.` line.
const MESSAGE: &str = "<message>";

struct ScriptedServer {
    port: u16,
    handle: JoinHandle<Vec<Vec<String>>>,
}

impl ScriptedServer {
    async fn start(steps: Vec<(&'static str, &'static str)>) -> Self {
        Self::start_sessions(vec![steps]).await
    }

    /// Serves one script per accepted connection, in order. Each connection
    /// is dropped once its script runs out.
    async fn start_sessions(sessions: Vec<Vec<(&'static str, &'static str)>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let mut transcripts = Vec::new();
            for steps in sessions {
                let (socket, _) = listener.accept().await.unwrap();
                transcripts.push(serve(socket, steps).await);
            }
            transcripts
        });

        Self { port, handle }
    }

    fn host(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    async fn transcript(self) -> Vec<String> {
        self.transcripts().await.into_iter().next().unwrap_or_default()
    }

    async fn transcripts(self) -> Vec<Vec<String>> {
        self.handle.await.unwrap()
    }
}

async fn serve(socket: TcpStream, steps: Vec<(&'static str, &'static str)>) -> Vec<String> {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let mut transcript = Vec::new();

    write_half.write_all(b"220 mx.test ESMTP\r\n").await.unwrap();
    for (expect, reply) in steps {
        let received = if expect == MESSAGE {
            let mut lines = Vec::new();
            loop {
                match read_line(&mut reader).await {
                    Some(line) if line == "." => break,
                    Some(line) => lines.push(line),
                    None => return transcript,
                }
            }
            MESSAGE.to_string() + &lines.join("\r\n")
        } else {
            match read_line(&mut reader).await {
                Some(line) => line,
                None => return transcript,
            }
        };
        transcript.push(received);
        write_half
            .write_all(format!("{reply}\r\n").as_bytes())
            .await
            .unwrap();
    }
    transcript
}

async fn read_line<R: tokio::io::AsyncBufRead + Unpin>(reader: &mut R) -> Option<String> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await.ok()?;
    (n > 0).then(|| line.trim_end_matches(['\r', '\n']).to_string())
}

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn config(hosts: &str) -> TransportConfig {
    TransportConfig::builder(hosts)
        .helo("client.test")
        .timeout(Duration::from_secs(5))
        .build()
}

fn descriptor(to: &[&str]) -> MessageDescriptor {
    let mut desc = MessageDescriptor::new(Mailbox::new("a@x.com"));
    for rcpt in to {
        desc.to.push(Mailbox::new(*rcpt));
    }
    desc.subject = "Hi".to_string();
    desc.text_body = Some("hello".to_string());
    desc
}

fn commands(transcript: &[String]) -> Vec<&str> {
    transcript
        .iter()
        .map(|line| {
            if line.starts_with(MESSAGE) {
                MESSAGE
            } else {
                line.split(':').next().unwrap_or(line)
            }
        })
        .collect()
}

#[tokio::test]
async fn test_send_single_recipient() {
    let server = ScriptedServer::start(vec![
        ("EHLO", "250 mx.test"),
        ("MAIL", "250 OK"),
        ("RCPT", "250 OK"),
        ("DATA", "354 Start mail input"),
        (MESSAGE, "250 OK"),
        ("QUIT", "221 Bye"),
    ])
    .await;

    let mut mailer = Mailer::new(config(&server.host())).unwrap();
    let report = mailer.send(&descriptor(&["b@y.com"])).await.unwrap();

    let message_id = Regex::new(r"^<.+@.+>$").unwrap();
    assert!(message_id.is_match(&report.message_id), "{}", report.message_id);
    assert!(report.delivered);
    assert!(report.is_complete());
    assert_eq!(report.transaction_id, None);
    assert_eq!(report.host, server.host());
    assert!(!mailer.is_connected());

    let transcript = server.transcript().await;
    assert_eq!(transcript[0], "EHLO client.test");
    assert_eq!(transcript[1], "MAIL FROM:<a@x.com>");
    assert_eq!(transcript[2], "RCPT TO:<b@y.com>");
    assert!(transcript[4].contains("Subject: Hi"));
    assert!(transcript[4].contains(&format!("Message-ID: {}", report.message_id)));
    assert!(transcript[4].ends_with("hello"));
    assert_eq!(transcript[5], "QUIT");
}

#[tokio::test]
async fn test_only_recipient_rejected_skips_data() {
    let server = ScriptedServer::start(vec![
        ("EHLO", "250 mx.test"),
        ("MAIL", "250 OK"),
        ("RCPT", "550 5.1.1 b@y.com: Recipient address rejected"),
        ("QUIT", "221 Bye"),
    ])
    .await;

    let mut mailer = Mailer::new(config(&server.host())).unwrap();
    let outcome = mailer.send_outcome(&descriptor(&["b@y.com"])).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error_kind, Some(ErrorKind::Recipients));
    assert!(outcome.detail.contains("b@y.com"));

    let report = outcome.report.unwrap();
    assert!(!report.delivered);
    let rejected: Vec<&str> = report.rejected().map(|r| r.address.as_str()).collect();
    assert_eq!(rejected, vec!["b@y.com"]);

    let transcript = server.transcript().await;
    assert_eq!(commands(&transcript), vec!["EHLO client.test", "MAIL FROM", "RCPT TO", "QUIT"]);
}

#[tokio::test]
async fn test_second_of_three_recipients_rejected() {
    let server = ScriptedServer::start(vec![
        ("EHLO", "250-mx.test\r\n250 8BITMIME"),
        ("MAIL", "250 OK"),
        ("RCPT", "250 OK"),
        ("RCPT", "550 5.1.1 Mailbox unavailable"),
        ("RCPT", "250 OK"),
        ("DATA", "354 Go ahead"),
        (MESSAGE, "250 2.0.0 Ok: queued as 9C1F2"),
        ("QUIT", "221 Bye"),
    ])
    .await;

    let mut mailer = Mailer::new(config(&server.host())).unwrap();
    let err = mailer
        .send(&descriptor(&["one@y.com", "two@y.com", "three@y.com"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Recipients);

    let report = err.report().unwrap();
    assert!(report.delivered);
    assert_eq!(report.transaction_id.as_deref(), Some("9C1F2"));
    assert_eq!(report.accepted().count(), 2);
    let rejected: Vec<_> = report.rejected().collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].address, "two@y.com");
    assert_eq!(rejected[0].detail, "Mailbox unavailable");
    assert_eq!(rejected[0].code, Some(550));

    let transcript = server.transcript().await;
    assert!(transcript.iter().any(|line| line == "DATA"));
}

#[tokio::test]
async fn test_no_reachable_hosts() {
    let first = closed_port().await;
    let second = closed_port().await;
    let hosts = format!("127.0.0.1:{first};127.0.0.1:{second}");

    let mut mailer = Mailer::new(config(&hosts)).unwrap();
    let err = mailer.send(&descriptor(&["b@y.com"])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    match &err {
        MailError::Connect(failures) => {
            assert_eq!(failures.len(), 2);
            assert_eq!(failures[0].port, first);
            assert_eq!(failures[1].port, second);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("SMTP connect failed"));
}

#[tokio::test]
async fn test_failover_after_rejected_greeting() {
    let refusing = ScriptedServer::start(vec![
        ("EHLO", "554 5.7.1 Go away"),
        ("HELO", "554 5.7.1 Go away"),
        ("QUIT", "221 Bye"),
    ])
    .await;
    let working = ScriptedServer::start(vec![
        ("EHLO", "250 mx.test"),
        ("MAIL", "250 OK"),
        ("RCPT", "250 OK"),
        ("DATA", "354 Go ahead"),
        (MESSAGE, "250 OK id=1r2s3t-000abc-XY"),
        ("QUIT", "221 Bye"),
    ])
    .await;

    let hosts = format!("bad host;{};{}", refusing.host(), working.host());
    let mut mailer = Mailer::new(config(&hosts)).unwrap();
    let report = mailer.send(&descriptor(&["b@y.com"])).await.unwrap();
    assert_eq!(report.host, working.host());
    assert_eq!(report.transaction_id.as_deref(), Some("1r2s3t-000abc-XY"));

    assert_eq!(
        refusing.transcript().await,
        ["EHLO client.test", "HELO client.test", "QUIT"]
    );
    drop(working.transcript().await);
}

#[tokio::test]
async fn test_auth_login_selected_and_used() {
    let server = ScriptedServer::start(vec![
        ("EHLO", "250-mx.test\r\n250 AUTH LOGIN XOAUTH2"),
        ("AUTH LOGIN", "334 VXNlcm5hbWU6"),
        ("dXNlckB4LmNvbQ==", "334 UGFzc3dvcmQ6"),
        ("c2VjcmV0", "235 2.7.0 Accepted"),
        ("MAIL", "250 OK"),
        ("RCPT", "250 OK"),
        ("DATA", "354 Go ahead"),
        (MESSAGE, "250 OK"),
        ("QUIT", "221 Bye"),
    ])
    .await;

    let config = TransportConfig::builder(server.host())
        .helo("client.test")
        .auth(AuthConfig::new("user@x.com", "secret"))
        .timeout(Duration::from_secs(5))
        .build();
    let mut mailer = Mailer::new(config).unwrap();
    mailer.send(&descriptor(&["b@y.com"])).await.unwrap();

    let transcript = server.transcript().await;
    assert_eq!(transcript[1], "AUTH LOGIN");
}

#[tokio::test]
async fn test_auth_failure_stops_before_envelope() {
    let server = ScriptedServer::start(vec![
        ("EHLO", "250-mx.test\r\n250 AUTH PLAIN LOGIN"),
        ("AUTH PLAIN", "334 "),
        ("AHVzZXJAeC5jb20Ad3Jvbmc=", "535 5.7.8 Authentication failed"),
        ("QUIT", "221 Bye"),
    ])
    .await;

    let mut auth = AuthConfig::new("user@x.com", "wrong");
    auth.mechanism = Some(Mechanism::Plain);
    let config = TransportConfig::builder(server.host())
        .helo("client.test")
        .auth(auth)
        .timeout(Duration::from_secs(5))
        .build();
    let mut mailer = Mailer::new(config).unwrap();
    let err = mailer.send(&descriptor(&["b@y.com"])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.smtp_code(), Some(535));

    let transcript = server.transcript().await;
    assert!(!transcript.iter().any(|line| line.starts_with("MAIL")));
    assert_eq!(transcript.last().unwrap(), "QUIT");
}

#[tokio::test]
async fn test_keep_alive_reuses_connection() {
    let server = ScriptedServer::start(vec![
        ("EHLO", "250 mx.test"),
        ("MAIL", "250 OK"),
        ("RCPT", "250 OK"),
        ("DATA", "354 Go ahead"),
        (MESSAGE, "250 OK"),
        ("RSET", "250 OK"),
        ("NOOP", "250 OK"),
        ("MAIL", "250 OK"),
        ("RCPT", "250 OK"),
        ("DATA", "354 Go ahead"),
        (MESSAGE, "250 OK"),
        ("RSET", "250 OK"),
        ("QUIT", "221 Bye"),
    ])
    .await;

    let config = TransportConfig::builder(server.host())
        .helo("client.test")
        .keep_alive(true)
        .timeout(Duration::from_secs(5))
        .build();
    let mut mailer = Mailer::new(config).unwrap();

    let first = mailer.send(&descriptor(&["b@y.com"])).await.unwrap();
    assert!(mailer.is_connected());
    let second = mailer.send(&descriptor(&["c@y.com"])).await.unwrap();
    assert_ne!(first.message_id, second.message_id);

    mailer.close().await;
    mailer.close().await;
    assert!(!mailer.is_connected());

    let transcript = server.transcript().await;
    assert_eq!(
        commands(&transcript),
        vec![
            "EHLO client.test",
            "MAIL FROM",
            "RCPT TO",
            "DATA",
            MESSAGE,
            "RSET",
            "NOOP",
            "MAIL FROM",
            "RCPT TO",
            "DATA",
            MESSAGE,
            "RSET",
            "QUIT",
        ]
    );
}

#[tokio::test]
async fn test_keep_alive_reconnects_after_server_hangup() {
    let server = ScriptedServer::start_sessions(vec![
        vec![
            ("EHLO", "250 mx.test"),
            ("MAIL", "250 OK"),
            ("RCPT", "250 OK"),
            ("DATA", "354 Go ahead"),
            (MESSAGE, "250 OK"),
            ("RSET", "250 OK"),
        ],
        vec![
            ("EHLO", "250 mx.test"),
            ("MAIL", "250 OK"),
            ("RCPT", "250 OK"),
            ("DATA", "354 Go ahead"),
            (MESSAGE, "250 OK"),
            ("RSET", "250 OK"),
            ("QUIT", "221 Bye"),
        ],
    ])
    .await;

    let config = TransportConfig::builder(server.host())
        .helo("client.test")
        .keep_alive(true)
        .timeout(Duration::from_secs(5))
        .build();
    let mut mailer = Mailer::new(config).unwrap();

    mailer.send(&descriptor(&["b@y.com"])).await.unwrap();
    assert!(mailer.is_connected());
    let second = mailer.send(&descriptor(&["c@y.com"])).await.unwrap();
    assert!(second.delivered);
    mailer.close().await;

    let transcripts = server.transcripts().await;
    assert_eq!(transcripts.len(), 2);
    assert_eq!(transcripts[0].last().unwrap(), "RSET");
    assert_eq!(
        commands(&transcripts[1]),
        vec!["EHLO client.test", "MAIL FROM", "RCPT TO", "DATA", MESSAGE, "RSET", "QUIT"]
    );
    assert_eq!(transcripts[1][2], "RCPT TO:<c@y.com>");
}

#[tokio::test]
async fn test_injected_token_provider_authenticates() {
    let server = ScriptedServer::start(vec![
        ("EHLO", "250-mx.test\r\n250 AUTH XOAUTH2"),
        (
            "AUTH XOAUTH2 dXNlcj11c2VyQHguY29tAWF1dGg9QmVhcmVyIHRvawEB",
            "235 2.7.0 Accepted",
        ),
        ("MAIL", "250 OK"),
        ("RCPT", "250 OK"),
        ("DATA", "354 Go ahead"),
        (MESSAGE, "250 OK"),
        ("QUIT", "221 Bye"),
    ])
    .await;

    let config = TransportConfig::builder(server.host())
        .helo("client.test")
        .auth(AuthConfig::new("user@x.com", ""))
        .timeout(Duration::from_secs(5))
        .build();
    let mut mailer = Mailer::new(config)
        .unwrap()
        .with_token_provider(Arc::new(StaticTokenProvider::new("tok")))
        .unwrap();
    mailer.send(&descriptor(&["b@y.com"])).await.unwrap();

    let transcript = server.transcript().await;
    assert_eq!(
        transcript[1],
        "AUTH XOAUTH2 dXNlcj11c2VyQHguY29tAWF1dGg9QmVhcmVyIHRvawEB"
    );
    assert_eq!(transcript[2], "MAIL FROM:<a@x.com>");
}

#[test]
fn test_token_provider_requires_auth_section() {
    let err = Mailer::new(config("127.0.0.1:25"))
        .unwrap()
        .with_token_provider(Arc::new(StaticTokenProvider::new("tok")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_composition_error_before_network() {
    let port = closed_port().await;
    let mut mailer = Mailer::new(config(&format!("127.0.0.1:{port}"))).unwrap();

    let err = mailer.send(&descriptor(&[])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Composition);

    let mut desc = descriptor(&["b@y.com"]);
    desc.text_body = None;
    let outcome = mailer.send_outcome(&desc).await;
    assert_eq!(outcome.error_kind, Some(ErrorKind::Composition));
}

#[tokio::test]
async fn test_invalid_configuration() {
    let err = Mailer::new(TransportConfig::new("")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
