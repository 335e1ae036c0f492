//! DIGEST-MD5 challenge parsing and response assembly ([RFC 2831](https://tools.ietf.org/html/rfc2831)).

use std::str;

use crate::digest::{Charset, DigestMd5Input, INITIAL_NONCE_COUNT, digest_md5_rspauth};
use crate::mechanism::DigestMd5Params;
use crate::result::{LdapError, Result};

const MECH: &str = "DIGEST-MD5";

fn malformed(reason: String) -> LdapError {
    LdapError::MalformedServerCredentials { mech: MECH, reason }
}

/// Split a directive list into `(name, value)` pairs.
///
/// Names are lowercased and trimmed. Values may be quoted; inside quotes a comma
/// doesn't end the value, and a backslash escapes the next character anywhere.
/// A closing quote must be followed by a comma or the end of the input.
pub(crate) fn parse_directives(s: &str) -> Result<Vec<(String, String)>> {
    let chars: Vec<char> = s.chars().collect();
    let mut directives = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        let eq = chars[pos + 1..]
            .iter()
            .position(|&c| c == '=')
            .map(|off| pos + 1 + off)
            .ok_or_else(|| malformed(format!("no '=' in directive at position {}", pos)))?;
        let name: String = chars[pos..eq].iter().collect();
        let (value, next) = read_value(&chars, eq + 1)?;
        directives.push((name.trim().to_ascii_lowercase(), value));
        pos = next;
    }
    Ok(directives)
}

fn read_value(chars: &[char], start: usize) -> Result<(String, usize)> {
    let mut value = String::new();
    let Some(&first) = chars.get(start) else {
        return Ok((value, start));
    };
    let mut pos = start + 1;
    let mut quoted = false;
    let mut escaped = false;
    match first {
        ',' => return Ok((value, pos)),
        '"' => quoted = true,
        '\\' => escaped = true,
        c => value.push(c),
    }
    while let Some(&c) = chars.get(pos) {
        pos += 1;
        if escaped {
            value.push(c);
            escaped = false;
            continue;
        }
        match c {
            ',' if quoted => value.push(c),
            ',' => break,
            '"' if quoted => match chars.get(pos) {
                None => break,
                Some(',') => {
                    pos += 1;
                    break;
                }
                Some(_) => {
                    return Err(malformed(format!(
                        "closing quote at position {} not followed by a comma",
                        pos - 1
                    )));
                }
            },
            '\\' => escaped = true,
            c => value.push(c),
        }
    }
    Ok((value, pos))
}

/// What the client takes from the server's first-round challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct DigestChallenge {
    pub(crate) realm: Option<String>,
    pub(crate) nonce: String,
    pub(crate) charset: Charset,
}

impl DigestChallenge {
    /// Parse the server's credentials against the client's parameters.
    ///
    /// A realm offered by the server is adopted only if the client didn't pin one
    /// and the server offered exactly one. Unknown directives are ignored.
    pub(crate) fn parse(creds: &[u8], params: &DigestMd5Params) -> Result<Self> {
        let s = str::from_utf8(creds).map_err(|e| malformed(format!("not UTF-8: {}", e)))?;
        let mut realm = params.realm.clone();
        let mut realm_pinned = params.realm_from_property();
        let mut nonce = None;
        let mut charset = Charset::Latin1;
        for (name, value) in parse_directives(s)? {
            match name.as_str() {
                "charset" => {
                    if !value.eq_ignore_ascii_case("utf-8") {
                        return Err(LdapError::UnsupportedCharset(value));
                    }
                    charset = Charset::Utf8;
                }
                "realm" if !realm_pinned => {
                    if realm.is_none() {
                        realm = Some(value);
                    } else {
                        realm = None;
                        realm_pinned = true;
                    }
                }
                "nonce" => nonce = Some(value),
                "qop" => {
                    let offered = value
                        .split(',')
                        .any(|q| q.trim().eq_ignore_ascii_case(&params.qop));
                    if !offered {
                        return Err(LdapError::RequestedQopNotSupported {
                            requested: params.qop.clone(),
                            offered: value,
                        });
                    }
                }
                _ => trace!("DIGEST-MD5: ignoring directive {}", name),
            }
        }
        Ok(DigestChallenge {
            realm,
            nonce: nonce.ok_or(LdapError::MissingServerNonce)?,
            charset,
        })
    }

    pub(crate) fn digest_input<'a>(
        &'a self,
        params: &'a DigestMd5Params,
        password: &'a [u8],
        cnonce: &'a str,
    ) -> DigestMd5Input<'a> {
        DigestMd5Input {
            authid: &params.authid,
            authzid: params.authzid.as_deref(),
            password,
            realm: self.realm.as_deref(),
            nonce: &self.nonce,
            cnonce,
            nonce_count: INITIAL_NONCE_COUNT,
            digest_uri: &params.digest_uri,
            qop: &params.qop,
            charset: self.charset,
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Second-round credentials carrying the response digest.
pub(crate) fn response_credentials(input: &DigestMd5Input, response: &str) -> String {
    let mut creds = format!("username={}", quote(input.authid));
    if let Some(realm) = input.realm {
        creds.push_str(",realm=");
        creds.push_str(&quote(realm));
    }
    creds.push_str(&format!(
        ",nonce={},cnonce={},nc={},qop={},digest-uri={},response={}",
        quote(input.nonce),
        quote(input.cnonce),
        input.nonce_count,
        input.qop,
        quote(input.digest_uri),
        response
    ));
    if input.charset == Charset::Utf8 {
        creds.push_str(",charset=utf-8");
    }
    if let Some(authzid) = input.authzid {
        creds.push_str(",authzid=");
        creds.push_str(&quote(authzid));
    }
    creds
}

/// Check the server's final credentials, which must be `rspauth=<hex>` with
/// the value the client computes on its own.
pub(crate) fn verify_rspauth(server_creds: Option<&[u8]>, input: &DigestMd5Input) -> Result<()> {
    let creds = server_creds.ok_or(LdapError::MissingServerCredentials { mech: MECH })?;
    let value = match creds.get(..8) {
        Some(prefix) if prefix.eq_ignore_ascii_case(b"rspauth=") => &creds[8..],
        _ => return Err(malformed(String::from("final credentials lack rspauth"))),
    };
    let server = hex::decode(value).map_err(|e| malformed(format!("rspauth: {}", e)))?;
    if server[..] != digest_md5_rspauth(input)[..] {
        return Err(LdapError::RspAuthMismatch);
    }
    Ok(())
}
