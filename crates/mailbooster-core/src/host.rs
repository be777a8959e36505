//! Host list parsing.
//!
//! A host list is a `;` separated string. Each entry may carry an `ssl://`
//! or `tls://` scheme, which overrides the transport security, and a
//! `:port` suffix, which overrides the transport port. IPv6 literals are
//! written in brackets.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::Security;

#[allow(clippy::expect_used)] // pattern is a literal
static HOST_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((ssl|tls)://)*([a-zA-Z0-9.-]*|\[[a-fA-F0-9:]+\]):?([0-9]*)$")
        .expect("host entry pattern")
});

/// One host to try, with its effective port and security.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    /// DNS name or IP literal (IPv6 without brackets).
    pub host: String,
    /// Port to connect to.
    pub port: u16,
    /// Security for this host.
    pub security: Security,
}

impl HostEntry {
    /// Parses a single entry.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the entry is malformed, the
    /// host is not a valid name or address, or the port is out of range.
    pub fn parse(
        entry: &str,
        default_port: u16,
        default_security: Security,
    ) -> Result<Self, String> {
        let entry = entry.trim();
        let caps = HOST_ENTRY
            .captures(entry)
            .ok_or_else(|| format!("malformed host entry \"{entry}\""))?;

        let security = match caps.get(2).map(|m| m.as_str()) {
            Some("ssl") => Security::Ssl,
            Some("tls") => Security::Tls,
            _ => default_security,
        };

        let raw_host = caps.get(3).map_or("", |m| m.as_str());
        let host = raw_host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(raw_host);
        if !is_valid_host(raw_host) {
            return Err(format!("invalid host \"{raw_host}\""));
        }

        let port = match caps.get(4).map_or("", |m| m.as_str()) {
            "" => default_port,
            digits => digits
                .parse::<u16>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| format!("invalid port \"{digits}\""))?,
        };

        Ok(Self {
            host: host.to_string(),
            port,
            security,
        })
    }
}

impl fmt::Display for HostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parses a `;` separated host list, skipping invalid entries with a warning.
#[must_use]
pub fn parse_hosts(list: &str, default_port: u16, default_security: Security) -> Vec<HostEntry> {
    list.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            HostEntry::parse(entry, default_port, default_security)
                .map_err(|reason| tracing::warn!(entry, %reason, "Ignoring invalid host"))
                .ok()
        })
        .collect()
}

/// Accepts an IPv4 address, a bracketed IPv6 address, or a DNS name.
fn is_valid_host(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        return inner.parse::<Ipv6Addr>().is_ok();
    }
    if host.parse::<Ipv4Addr>().is_ok() {
        return true;
    }
    // A dotted-numeric string that is not a valid IPv4 address is rejected
    if host.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_host_uses_defaults() {
        let entry = HostEntry::parse("smtp.example.com", 587, Security::Tls).unwrap();
        assert_eq!(entry.host, "smtp.example.com");
        assert_eq!(entry.port, 587);
        assert_eq!(entry.security, Security::Tls);
    }

    #[test]
    fn test_scheme_and_port_override() {
        let entry = HostEntry::parse("ssl://smtp.example.com:465", 25, Security::None).unwrap();
        assert_eq!(entry.port, 465);
        assert_eq!(entry.security, Security::Ssl);

        let entry = HostEntry::parse("tls://mx.test", 25, Security::Ssl).unwrap();
        assert_eq!(entry.security, Security::Tls);
        assert_eq!(entry.port, 25);
    }

    #[test]
    fn test_ipv6_brackets_are_stripped() {
        let entry = HostEntry::parse("[::1]:2525", 25, Security::None).unwrap();
        assert_eq!(entry.host, "::1");
        assert_eq!(entry.port, 2525);
        assert_eq!(entry.to_string(), "[::1]:2525");
    }

    #[test]
    fn test_invalid_entries() {
        for bad in [
            "",
            "ssl://",
            "bad host",
            "-leading.example.com",
            "999.1.1.1",
            "[not:ipv6:zz]",
            "mx.test:0",
            "mx.test:70000",
            "http://mx.test",
        ] {
            assert!(HostEntry::parse(bad, 25, Security::None).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_parse_hosts_skips_invalid() {
        let hosts = parse_hosts(
            "a.example.com; bad host ;ssl://b.example.com:465;;127.0.0.1",
            25,
            Security::None,
        );
        let rendered: Vec<String> = hosts.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["a.example.com:25", "b.example.com:465", "127.0.0.1:25"]
        );
        assert_eq!(hosts[1].security, Security::Ssl);
    }
}
