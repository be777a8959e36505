//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

/// Longest reply line accepted, terminator included.
pub const MAX_LINE_LENGTH: u64 = 8192;

/// SMTP stream (TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(BufReader<TcpStream>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<tokio_rustls::client::TlsStream<TcpStream>>>),
}

impl SmtpStream {
    /// Reads a line from the stream, without its line terminator.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails, the server closed the
    /// connection, or the line is longer than [`MAX_LINE_LENGTH`].
    pub async fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let n = match self {
            Self::Tcp(reader) => read_capped_line(reader, &mut buf).await?,
            Self::Tls(reader) => read_capped_line(reader, &mut buf).await?,
        };
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        Ok(String::from_utf8_lossy(&buf).trim_end().to_string())
    }

    /// Writes data to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
        }
        Ok(())
    }

    /// Returns true once the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Shuts down the write half, ignoring errors.
    pub async fn shutdown(&mut self) {
        let result = match self {
            Self::Tcp(reader) => reader.get_mut().shutdown().await,
            Self::Tls(reader) => reader.get_mut().shutdown().await,
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "Stream shutdown failed");
        }
    }

    /// Upgrades a TCP stream to TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS handshake fails or does not finish
    /// within `handshake_timeout`.
    pub async fn upgrade_to_tls(self, hostname: &str, handshake_timeout: Duration) -> Result<Self> {
        let tcp_stream = match self {
            Self::Tcp(reader) => reader.into_inner(),
            Self::Tls(_) => return Err(Error::Protocol("Already using TLS".into())),
        };

        let server_name = server_name(hostname)?;
        let tls_stream = timeout(
            handshake_timeout,
            create_tls_connector().connect(server_name, tcp_stream),
        )
        .await
        .map_err(|_| Error::Timeout("TLS handshake"))??;
        Ok(Self::Tls(Box::new(BufReader::new(tls_stream))))
    }
}

/// Connects to an SMTP server over plain TCP.
///
/// `hostname` may be a DNS name or an IP literal (IPv6 without brackets).
///
/// # Errors
///
/// Returns an error if the connection fails or times out.
pub async fn connect(hostname: &str, port: u16, connect_timeout: Duration) -> Result<SmtpStream> {
    let stream = timeout(connect_timeout, TcpStream::connect((hostname, port)))
        .await
        .map_err(|_| Error::Timeout("connect"))??;
    Ok(SmtpStream::Tcp(BufReader::new(stream)))
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails or times out.
pub async fn connect_tls(
    hostname: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<SmtpStream> {
    connect(hostname, port, connect_timeout)
        .await?
        .upgrade_to_tls(hostname, connect_timeout)
        .await
}

async fn read_capped_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let n = reader.take(MAX_LINE_LENGTH).read_until(b'\n', buf).await?;
    if u64::try_from(n).is_ok_and(|n| n >= MAX_LINE_LENGTH) && buf.last() != Some(&b'\n') {
        return Err(Error::Protocol(format!(
            "Reply line exceeds {MAX_LINE_LENGTH} bytes"
        )));
    }
    Ok(n)
}

fn server_name(hostname: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))
}

/// Creates a TLS connector with the webpki root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
