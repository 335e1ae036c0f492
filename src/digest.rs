//! Digest computations for CRAM-MD5 and DIGEST-MD5.
//!
//! The functions are pure, apart from [`NonceSource`], which holds the random
//! generator used for DIGEST-MD5 client nonces.

use crate::result::Result;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use zeroize::Zeroizing;

type HmacMd5 = Hmac<Md5>;

/// Nonce count of the first (and only) DIGEST-MD5 response on a connection.
pub const INITIAL_NONCE_COUNT: &str = "00000001";

const CNONCE_LEN: usize = 16;

/// Keyed MD5 digest of a CRAM-MD5 challenge ([RFC 2195](https://tools.ietf.org/html/rfc2195)),
/// as 32 lowercase hex digits.
///
/// Keys longer than the 64-byte MD5 block are hashed first, as HMAC prescribes.
pub fn hmac_md5_digest(password: &[u8], challenge: &[u8]) -> Result<String> {
    let mut mac = HmacMd5::new_from_slice(password)?;
    mac.update(challenge);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Character set for the string components of a DIGEST-MD5 digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Charset {
    /// Used when the server announces `charset=utf-8`.
    Utf8,
    /// The default in the absence of a `charset` directive.
    Latin1,
}

impl Charset {
    /// Encode a string. Characters outside ISO-8859-1 become `?` in `Latin1`.
    pub fn encode(self, s: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 => s.as_bytes().to_vec(),
            Charset::Latin1 => s
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

/// Inputs of a DIGEST-MD5 response ([RFC 2831](https://tools.ietf.org/html/rfc2831)).
#[derive(Clone, Copy)]
pub struct DigestMd5Input<'a> {
    pub authid: &'a str,
    pub authzid: Option<&'a str>,
    pub password: &'a [u8],
    pub realm: Option<&'a str>,
    pub nonce: &'a str,
    pub cnonce: &'a str,
    pub nonce_count: &'a str,
    pub digest_uri: &'a str,
    pub qop: &'a str,
    pub charset: Charset,
}

/// The `response` directive value, as lowercase hex.
pub fn digest_md5_response(input: &DigestMd5Input) -> String {
    hex::encode(kd_digest(input, "AUTHENTICATE:"))
}

/// The `rspauth` value the server must return on success, as raw bytes.
pub fn digest_md5_rspauth(input: &DigestMd5Input) -> [u8; 16] {
    kd_digest(input, ":")
}

fn kd_digest(input: &DigestMd5Input, a2_prefix: &str) -> [u8; 16] {
    let cs = input.charset;

    let mut urp = Zeroizing::new(cs.encode(&format!(
        "{}:{}:",
        input.authid,
        input.realm.unwrap_or("")
    )));
    urp.extend_from_slice(input.password);
    let mut a1 = Zeroizing::new(Md5::digest(&urp[..]).to_vec());
    let mut a1_tail = format!(":{}:{}", input.nonce, input.cnonce);
    if let Some(authzid) = input.authzid {
        a1_tail.push(':');
        a1_tail.push_str(authzid);
    }
    a1.extend(cs.encode(&a1_tail));

    let mut a2 = format!("{}{}", a2_prefix, input.digest_uri);
    if input.qop == "auth-int" || input.qop == "auth-conf" {
        a2.push_str(":00000000000000000000000000000000");
    }

    let kd = format!(
        "{}:{}:{}:{}:{}:{}",
        hex::encode(Md5::digest(&a1[..])),
        input.nonce,
        input.nonce_count,
        input.cnonce,
        input.qop,
        hex::encode(Md5::digest(cs.encode(&a2)))
    );
    Md5::digest(cs.encode(&kd)).into()
}

/// Source of DIGEST-MD5 client nonces.
///
/// The generator is seeded from the operating system on first use and reused
/// for the lifetime of the value.
#[derive(Debug, Default)]
pub struct NonceSource {
    rng: Option<StdRng>,
}

impl NonceSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn seeded(seed: u64) -> Self {
        NonceSource {
            rng: Some(StdRng::seed_from_u64(seed)),
        }
    }

    /// Sixteen random bytes, base64-encoded.
    pub fn generate_cnonce(&mut self) -> String {
        let rng = self.rng.get_or_insert_with(StdRng::from_os_rng);
        let mut buf = [0u8; CNONCE_LEN];
        rng.fill_bytes(&mut buf);
        BASE64.encode(buf)
    }
}
