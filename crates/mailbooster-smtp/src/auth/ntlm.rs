//! NTLM (NTLMv2 responses) for `AUTH NTLM`.
//!
//! Three messages: the client's NEGOTIATE, the server's CHALLENGE carried in
//! a 334 reply, and the client's AUTHENTICATE. Layouts follow MS-NLMP.

use std::time::{SystemTime, UNIX_EPOCH};

use md4::{Digest, Md4};

use super::hmac_md5;
use crate::error::{Error, Result};

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const NEGOTIATE_OEM: u32 = 0x0000_0002;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
const NEGOTIATE_EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;
const NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;

const NEGOTIATE_FLAGS: u32 = NEGOTIATE_UNICODE
    | NEGOTIATE_OEM
    | REQUEST_TARGET
    | NEGOTIATE_NTLM
    | NEGOTIATE_ALWAYS_SIGN
    | NEGOTIATE_EXTENDED_SESSIONSECURITY;

const AUTHENTICATE_HEADER_LEN: usize = 64;

/// `MsvAvTimestamp` attribute id in the target info block.
const AV_TIMESTAMP: u16 = 7;
const AV_EOL: u16 = 0;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_EPOCH_OFFSET: u64 = 11_644_473_600;

/// Builds the NEGOTIATE message (type 1).
#[must_use]
pub fn negotiate_message() -> Vec<u8> {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&1u32.to_le_bytes());
    msg.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
    // Empty domain and workstation buffers, offset just past the header
    for _ in 0..2 {
        msg.extend_from_slice(&0u16.to_le_bytes());
        msg.extend_from_slice(&0u16.to_le_bytes());
        msg.extend_from_slice(&32u32.to_le_bytes());
    }
    msg
}

/// The server's CHALLENGE message (type 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Negotiated flags.
    pub flags: u32,
    /// 8-byte server nonce.
    pub server_challenge: [u8; 8],
    /// `AV_PAIR` list describing the target.
    pub target_info: Vec<u8>,
}

impl Challenge {
    /// Parses a decoded CHALLENGE message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is truncated, has the wrong
    /// signature or type, or points outside itself.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 32 || &bytes[..8] != SIGNATURE {
            return Err(malformed("bad signature"));
        }
        if read_u32(bytes, 8) != Some(2) {
            return Err(malformed("not a challenge message"));
        }
        let flags = read_u32(bytes, 20).ok_or_else(|| malformed("missing flags"))?;
        let mut server_challenge = [0u8; 8];
        server_challenge.copy_from_slice(&bytes[24..32]);

        let target_info = if bytes.len() >= 48 {
            let len = read_u16(bytes, 40).ok_or_else(|| malformed("target info"))?;
            let offset = read_u32(bytes, 44).ok_or_else(|| malformed("target info"))?;
            let start = usize::try_from(offset).map_err(|_| malformed("target info offset"))?;
            bytes
                .get(start..start + usize::from(len))
                .ok_or_else(|| malformed("target info out of bounds"))?
                .to_vec()
        } else {
            Vec::new()
        };

        Ok(Self {
            flags,
            server_challenge,
            target_info,
        })
    }

    /// Returns the server's `MsvAvTimestamp`, if it sent one.
    #[must_use]
    pub fn timestamp(&self) -> Option<u64> {
        let mut rest = self.target_info.as_slice();
        while rest.len() >= 4 {
            let id = read_u16(rest, 0)?;
            let len = usize::from(read_u16(rest, 2)?);
            if id == AV_EOL {
                return None;
            }
            let value = rest.get(4..4 + len)?;
            if id == AV_TIMESTAMP && len == 8 {
                return read_u64(value, 0);
            }
            rest = &rest[4 + len..];
        }
        None
    }
}

/// Identity presented in the AUTHENTICATE message.
#[derive(Debug, Clone, Copy)]
pub struct Identity<'a> {
    /// Account name.
    pub username: &'a str,
    /// Account password.
    pub password: &'a str,
    /// Account domain.
    pub domain: &'a str,
    /// Client workstation name.
    pub workstation: &'a str,
}

/// Builds the AUTHENTICATE message (type 3) with NTLMv2 and LMv2 responses.
///
/// `timestamp` is a Windows FILETIME; the server's own timestamp is used
/// instead when the challenge carries one.
///
/// # Errors
///
/// Returns an error if a field is too long to be encoded.
pub fn authenticate_message(
    challenge: &Challenge,
    identity: Identity<'_>,
    client_challenge: [u8; 8],
    timestamp: u64,
) -> Result<Vec<u8>> {
    let key = ntowf_v2(identity.password, identity.username, identity.domain)?;
    let timestamp = challenge.timestamp().unwrap_or(timestamp);

    let mut lm_input = challenge.server_challenge.to_vec();
    lm_input.extend_from_slice(&client_challenge);
    let mut lm_response = hmac_md5(&key, &lm_input)?.to_vec();
    lm_response.extend_from_slice(&client_challenge);

    let mut blob = vec![0x01, 0x01, 0, 0, 0, 0, 0, 0];
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0; 4]);
    blob.extend_from_slice(&challenge.target_info);
    blob.extend_from_slice(&[0; 4]);

    let mut nt_input = challenge.server_challenge.to_vec();
    nt_input.extend_from_slice(&blob);
    let mut nt_response = hmac_md5(&key, &nt_input)?.to_vec();
    nt_response.extend_from_slice(&blob);

    let domain = utf16le(identity.domain);
    let user = utf16le(identity.username);
    let workstation = utf16le(identity.workstation);

    let mut header = Vec::with_capacity(AUTHENTICATE_HEADER_LEN);
    let mut payload = Vec::new();
    header.extend_from_slice(SIGNATURE);
    header.extend_from_slice(&3u32.to_le_bytes());
    // LM, NT, domain, user, workstation, session key
    for field in [
        lm_response.as_slice(),
        nt_response.as_slice(),
        domain.as_slice(),
        user.as_slice(),
        workstation.as_slice(),
        &[],
    ] {
        push_buffer(&mut header, &mut payload, field, AUTHENTICATE_HEADER_LEN)?;
    }
    let flags = (NEGOTIATE_FLAGS & !NEGOTIATE_OEM) | (challenge.flags & NEGOTIATE_TARGET_INFO);
    header.extend_from_slice(&flags.to_le_bytes());
    header.extend_from_slice(&payload);
    Ok(header)
}

/// NT one-way function: MD4 of the UTF-16LE password.
#[must_use]
pub fn nt_hash(password: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&Md4::digest(utf16le(password)));
    out
}

/// NTLMv2 response key: `HMAC-MD5(nt_hash, UTF16LE(upper(user) + domain))`.
///
/// # Errors
///
/// Returns an error if the HMAC cannot be keyed.
pub fn ntowf_v2(password: &str, username: &str, domain: &str) -> Result<[u8; 16]> {
    let identity = utf16le(&format!("{}{domain}", username.to_uppercase()));
    hmac_md5(&nt_hash(password), &identity)
}

/// Current time as a Windows FILETIME (100ns ticks since 1601).
#[must_use]
pub fn filetime_now() -> u64 {
    let since_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (since_unix.as_secs() + FILETIME_EPOCH_OFFSET) * 10_000_000
        + u64::from(since_unix.subsec_nanos() / 100)
}

/// Fresh random client nonce.
#[must_use]
pub fn client_challenge() -> [u8; 8] {
    rand::random()
}

fn push_buffer(
    header: &mut Vec<u8>,
    payload: &mut Vec<u8>,
    data: &[u8],
    header_len: usize,
) -> Result<()> {
    let len = u16::try_from(data.len()).map_err(|_| malformed("field too long"))?;
    let offset =
        u32::try_from(header_len + payload.len()).map_err(|_| malformed("message too long"))?;
    header.extend_from_slice(&len.to_le_bytes());
    header.extend_from_slice(&len.to_le_bytes());
    header.extend_from_slice(&offset.to_le_bytes());
    payload.extend_from_slice(data);
    Ok(())
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

fn read_u64(bytes: &[u8], at: usize) -> Option<u64> {
    Some(u64::from_le_bytes(bytes.get(at..at + 8)?.try_into().ok()?))
}

fn malformed(what: &str) -> Error {
    Error::Auth(format!("Malformed NTLM message: {what}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    // Values from MS-NLMP section 4.2.4
    const SERVER_CHALLENGE: [u8; 8] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];
    const CLIENT_CHALLENGE: [u8; 8] = [0xaa; 8];

    fn target_info() -> Vec<u8> {
        let mut info = vec![0x02, 0x00, 0x0c, 0x00];
        info.extend(utf16le("Domain"));
        info.extend([0x01, 0x00, 0x0c, 0x00]);
        info.extend(utf16le("Server"));
        info.extend([0x00, 0x00, 0x00, 0x00]);
        info
    }

    fn identity() -> Identity<'static> {
        Identity {
            username: "User",
            password: "Password",
            domain: "Domain",
            workstation: "COMPUTER",
        }
    }

    fn buffer(msg: &[u8], at: usize) -> &[u8] {
        let len = usize::from(read_u16(msg, at).unwrap());
        let offset = read_u32(msg, at + 4).unwrap() as usize;
        &msg[offset..offset + len]
    }

    #[test]
    fn test_nt_hash() {
        assert_eq!(hex::encode(nt_hash("Password")), "a4f49c406510bdcab6824ee7c30fd852");
    }

    #[test]
    fn test_ntowf_v2() {
        let key = ntowf_v2("Password", "User", "Domain").unwrap();
        assert_eq!(hex::encode(key), "0c868a403bfd7a93a3001ef22ef02e3f");
    }

    #[test]
    fn test_authenticate_message_responses() {
        let challenge = Challenge {
            flags: NEGOTIATE_UNICODE | NEGOTIATE_TARGET_INFO,
            server_challenge: SERVER_CHALLENGE,
            target_info: target_info(),
        };
        let msg = authenticate_message(&challenge, identity(), CLIENT_CHALLENGE, 0).unwrap();

        assert_eq!(&msg[..8], SIGNATURE);
        assert_eq!(read_u32(&msg, 8), Some(3));

        let lm = buffer(&msg, 12);
        assert_eq!(
            hex::encode(lm),
            "86c35097ac9cec102554764a57cccc19aaaaaaaaaaaaaaaa"
        );

        let nt = buffer(&msg, 20);
        assert_eq!(hex::encode(&nt[..16]), "68cd0ab851e51c96aabc927bebef6a1c");
        assert_eq!(&nt[16..18], &[0x01, 0x01]);

        assert_eq!(buffer(&msg, 28), utf16le("Domain").as_slice());
        assert_eq!(buffer(&msg, 36), utf16le("User").as_slice());
        assert_eq!(buffer(&msg, 44), utf16le("COMPUTER").as_slice());
        assert!(buffer(&msg, 52).is_empty());

        let flags = read_u32(&msg, 60).unwrap();
        assert_ne!(flags & NEGOTIATE_UNICODE, 0);
        assert_ne!(flags & NEGOTIATE_TARGET_INFO, 0);
    }

    #[test]
    fn test_negotiate_message() {
        let msg = negotiate_message();
        assert_eq!(msg.len(), 32);
        assert_eq!(&msg[..8], SIGNATURE);
        assert_eq!(read_u32(&msg, 8), Some(1));
        assert_eq!(read_u32(&msg, 12), Some(NEGOTIATE_FLAGS));
    }

    #[test]
    fn test_parse_challenge() {
        let info = target_info();
        let mut msg = Vec::new();
        msg.extend_from_slice(SIGNATURE);
        msg.extend_from_slice(&2u32.to_le_bytes());
        msg.extend_from_slice(&[0, 0, 0, 0, 48, 0, 0, 0]); // empty target name
        msg.extend_from_slice(&(NEGOTIATE_UNICODE | NEGOTIATE_TARGET_INFO).to_le_bytes());
        msg.extend_from_slice(&SERVER_CHALLENGE);
        msg.extend_from_slice(&[0; 8]);
        let len = u16::try_from(info.len()).unwrap();
        msg.extend_from_slice(&len.to_le_bytes());
        msg.extend_from_slice(&len.to_le_bytes());
        msg.extend_from_slice(&48u32.to_le_bytes());
        msg.extend_from_slice(&info);

        let challenge = Challenge::parse(&msg).unwrap();
        assert_eq!(challenge.server_challenge, SERVER_CHALLENGE);
        assert_eq!(challenge.target_info, info);
        assert_eq!(challenge.timestamp(), None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Challenge::parse(b"short").is_err());
        let mut msg = negotiate_message();
        assert!(Challenge::parse(&msg).is_err());
        msg[0] = b'X';
        assert!(Challenge::parse(&msg).is_err());
    }

    #[test]
    fn test_server_timestamp_is_used() {
        let mut info = vec![0x07, 0x00, 0x08, 0x00];
        info.extend_from_slice(&0x01d0_0000_0000_0000u64.to_le_bytes());
        info.extend([0, 0, 0, 0]);
        let challenge = Challenge {
            flags: 0,
            server_challenge: SERVER_CHALLENGE,
            target_info: info,
        };
        assert_eq!(challenge.timestamp(), Some(0x01d0_0000_0000_0000));

        let msg = authenticate_message(&challenge, identity(), CLIENT_CHALLENGE, 42).unwrap();
        let nt = buffer(&msg, 20);
        assert_eq!(read_u64(nt, 24), Some(0x01d0_0000_0000_0000));
    }

    #[test]
    fn test_filetime_is_after_2020() {
        // 2020-01-01 as FILETIME
        assert!(filetime_now() > 132_223_104_000_000_000);
    }
}
