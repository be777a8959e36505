//! SMTP extension types.

/// SMTP extensions discovered from EHLO response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade
    StartTls,
    /// AUTH - Authentication
    Auth(Vec<AuthMechanism>),
    /// SIZE - Maximum message size
    Size(Option<usize>),
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// PIPELINING - Command pipelining
    Pipelining,
    /// CHUNKING - Chunked message transfer
    Chunking,
    /// SMTPUTF8 - UTF-8 email addresses
    SmtpUtf8,
    /// DSN - Delivery status notifications
    Dsn,
    /// ENHANCEDSTATUSCODES - RFC 2034 status codes in replies
    EnhancedStatusCodes,
    /// Unknown extension
    Unknown(String),
}

impl Extension {
    /// Parses an extension line from EHLO response.
    ///
    /// The obsolete `AUTH=LOGIN PLAIN` form some servers still send is
    /// accepted as well.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split(|c: char| c == ' ' || c == '=').filter(|p| !p.is_empty());
        let Some(keyword) = parts.next() else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(parts.filter_map(AuthMechanism::parse).collect()),
            "SIZE" => Self::Size(parts.next().and_then(|s| s.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "CHUNKING" => Self::Chunking,
            "SMTPUTF8" => Self::SmtpUtf8,
            "DSN" => Self::Dsn,
            "ENHANCEDSTATUSCODES" => Self::EnhancedStatusCodes,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN - plaintext authentication
    Plain,
    /// LOGIN - legacy plaintext
    Login,
    /// CRAM-MD5 - challenge-response
    CramMd5,
    /// NTLM - Microsoft challenge-response
    Ntlm,
    /// `XOAUTH2` - `OAuth2` (Google/Microsoft)
    XOAuth2,
}

impl AuthMechanism {
    /// Order in which mechanisms are tried when none is requested.
    pub const PREFERENCE: [Self; 5] = [
        Self::CramMd5,
        Self::Login,
        Self::Plain,
        Self::Ntlm,
        Self::XOAuth2,
    ];

    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            "NTLM" => Some(Self::Ntlm),
            "XOAUTH2" => Some(Self::XOAuth2),
            _ => None,
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::Ntlm => "NTLM",
            Self::XOAuth2 => "XOAUTH2",
        }
    }
}

impl std::fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
