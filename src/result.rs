//! Bind results, errors, and response classification.
//!
//! A successful Bind produces a [`BindResult`]. Everything else is an
//! [`LdapError`], whose [`kind()`](LdapError::kind) sorts it into one of the
//! broad categories a caller usually needs to tell apart: bad parameters,
//! a broken connection, a misbehaving server, rejected credentials, or a
//! server-initiated disconnect.

use std::error::Error;
use std::fmt;
use std::io;
use std::result::Result as StdResult;

use crate::controls::RawControl;
use crate::protocol::{LdapResponse, ResponseOp, ResultComponents};
use crate::transport::TransportError;

use thiserror::Error;

pub(crate) const LDAP_SUCCESS: u32 = 0;
pub(crate) const LDAP_PROTOCOL_ERROR: u32 = 2;
pub(crate) const LDAP_SASL_BIND_IN_PROGRESS: u32 = 14;

/// Type alias for the standard `Result` with the fixed `LdapError` error part.
pub type Result<T> = std::result::Result<T, LdapError>;

/// Broad category of an [`LdapError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed, forbidden or missing parameters. Detected before any I/O,
    /// except for a QoP which the server turns out not to offer.
    Parameter,
    /// Send or receive failure, or a closed connection.
    Transport,
    /// The server's messages didn't follow the protocol.
    Protocol,
    /// The server rejected the credentials, or couldn't prove it knew them.
    Authentication,
    /// The server sent a Notice of Disconnection.
    Disconnect,
}

/// Error variants recognized by the library.
#[derive(Debug, Error)]
pub enum LdapError {
    /// Empty SASL mechanism name.
    #[error("no SASL mechanism specified")]
    NoSaslMechanism,

    /// Mechanism name not in the registry.
    #[error("unsupported SASL mechanism: {0}")]
    UnsupportedMechanism(String),

    /// A property given as text lacks the `name=value` form.
    #[error("invalid SASL property specification: {0}")]
    InvalidPropertyFormat(String),

    /// Property not allowed for the mechanism.
    #[error("SASL property \"{name}\" is not allowed for the {mech} mechanism")]
    InvalidProperty { name: String, mech: &'static str },

    /// Single-valued property given more than once.
    #[error("SASL property \"{name}\" for the {mech} mechanism may only have one value")]
    PropertyMustBeSingleValued { name: String, mech: &'static str },

    /// Required property absent or empty.
    #[error("SASL property \"{name}\" is required for the {mech} mechanism")]
    RequiredPropertyMissing { name: &'static str, mech: &'static str },

    /// QoP value recognized, but not implemented.
    #[error("unsupported quality of protection: {0}")]
    UnsupportedQop(String),

    /// QoP value not recognized.
    #[error("invalid quality of protection: {0}")]
    InvalidQop(String),

    /// The server doesn't offer the QoP chosen by the client.
    #[error("requested QoP \"{requested}\" not offered by the server (offered: \"{offered}\")")]
    RequestedQopNotSupported { requested: String, offered: String },

    /// No GSSAPI provider is available.
    #[error("GSSAPI support is not available")]
    GssapiUnavailable,

    /// The credential source couldn't provide a password.
    #[error("cannot obtain password: {0}")]
    CredentialPrompt(String),

    /// Encapsulated I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Malformed response.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Connection closed before the response arrived.
    #[error("connection closed before the response was received")]
    ConnectionClosed,

    /// Response of a type not expected at this point.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The server omitted the SASL credentials needed for the next step.
    #[error("no server SASL credentials in {mech} bind response")]
    MissingServerCredentials { mech: &'static str },

    /// Syntax error in the server's SASL credentials.
    #[error("malformed {mech} server credentials: {reason}")]
    MalformedServerCredentials { mech: &'static str, reason: String },

    /// DIGEST-MD5 charset other than UTF-8.
    #[error("unsupported DIGEST-MD5 charset: {0}")]
    UnsupportedCharset(String),

    /// DIGEST-MD5 challenge without a nonce.
    #[error("no nonce in DIGEST-MD5 server credentials")]
    MissingServerNonce,

    /// The negotiation library didn't finish when the server reported success.
    #[error("GSSAPI negotiation incomplete after successful bind")]
    GssapiIncomplete,

    /// Negotiation library failure.
    #[error("GSSAPI operation error: {0}")]
    GssapiOperationError(String),

    /// HMAC keying failure, as reported by the `hmac` crate. HMAC-MD5 accepts keys
    /// of any length, so CRAM-MD5 never produces it.
    #[error("digest key error: {source}")]
    DigestKey {
        #[from]
        source: hmac::digest::InvalidLength,
    },

    /// LDAP operation result with an error return code.
    #[error("LDAP operation result: {result}")]
    LdapResult {
        #[from]
        result: LdapResult,
    },

    /// DIGEST-MD5 server proof doesn't match the locally computed one.
    #[error("DIGEST-MD5 rspauth mismatch, server authentication failed")]
    RspAuthMismatch,

    /// Notice of Disconnection received.
    #[error("server disconnected: rc={rc}, text: \"{text}\"")]
    Disconnect { rc: u32, text: String },
}

impl LdapError {
    /// Category of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LdapError::NoSaslMechanism
            | LdapError::UnsupportedMechanism(_)
            | LdapError::InvalidPropertyFormat(_)
            | LdapError::InvalidProperty { .. }
            | LdapError::PropertyMustBeSingleValued { .. }
            | LdapError::RequiredPropertyMissing { .. }
            | LdapError::UnsupportedQop(_)
            | LdapError::InvalidQop(_)
            | LdapError::RequestedQopNotSupported { .. }
            | LdapError::GssapiUnavailable
            | LdapError::CredentialPrompt(_)
            | LdapError::DigestKey { .. } => ErrorKind::Parameter,
            LdapError::Io { .. } | LdapError::Decoding(_) | LdapError::ConnectionClosed => {
                ErrorKind::Transport
            }
            LdapError::UnexpectedResponse(_)
            | LdapError::MissingServerCredentials { .. }
            | LdapError::MalformedServerCredentials { .. }
            | LdapError::UnsupportedCharset(_)
            | LdapError::MissingServerNonce
            | LdapError::GssapiIncomplete => ErrorKind::Protocol,
            LdapError::GssapiOperationError(_)
            | LdapError::LdapResult { .. }
            | LdapError::RspAuthMismatch => ErrorKind::Authentication,
            LdapError::Disconnect { .. } => ErrorKind::Disconnect,
        }
    }

    /// Server result code, for errors which carry one.
    pub fn result_code(&self) -> Option<u32> {
        match self {
            LdapError::LdapResult { result } => Some(result.rc),
            LdapError::Disconnect { rc, .. } => Some(*rc),
            LdapError::MissingServerCredentials { .. }
            | LdapError::MalformedServerCredentials { .. }
            | LdapError::UnsupportedCharset(_)
            | LdapError::MissingServerNonce => Some(LDAP_PROTOCOL_ERROR),
            _ => None,
        }
    }
}

impl From<TransportError> for LdapError {
    fn from(te: TransportError) -> LdapError {
        match te {
            TransportError::Io { source } => LdapError::Io { source },
            TransportError::Decode(msg) => LdapError::Decoding(msg),
        }
    }
}

impl From<LdapError> for io::Error {
    fn from(le: LdapError) -> io::Error {
        match le {
            LdapError::Io { source, .. } => source,
            _ => io::Error::other(format!("{}", le)),
        }
    }
}

/// Symbolic name of an LDAP result code.
pub fn rc_name(rc: u32) -> &'static str {
    match rc {
        0 => "success",
        1 => "operationsError",
        2 => "protocolError",
        3 => "timeLimitExceeded",
        4 => "sizeLimitExceeded",
        7 => "authMethodNotSupported",
        8 => "strongerAuthRequired",
        10 => "referral",
        11 => "adminLimitExceeded",
        12 => "unavailableCriticalExtension",
        13 => "confidentialityRequired",
        14 => "saslBindInProgress",
        32 => "noSuchObject",
        34 => "invalidDNSyntax",
        48 => "inappropriateAuthentication",
        49 => "invalidCredentials",
        50 => "insufficientAccessRights",
        51 => "busy",
        52 => "unavailable",
        53 => "unwillingToPerform",
        80 => "other",
        _ => "unknown",
    }
}

/// Common components of an LDAP operation result.
///
/// A failed Bind is reported as this structure wrapped in
/// [`LdapError::LdapResult`], so that the caller can inspect the result code,
/// the diagnostic text, and the matched DN.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LdapResult {
    /// Result code.
    ///
    /// See [Section A.1 of RFC 4511](https://tools.ietf.org/html/rfc4511#appendix-A.1).
    pub rc: u32,
    /// Matched component DN, where applicable.
    pub matched: String,
    /// Additional diagnostic text.
    pub text: String,
    /// Referrals.
    ///
    /// Absence of referrals is represented by an empty vector.
    pub refs: Vec<String>,
    /// Response controls.
    ///
    /// Missing and empty controls are both represented by an empty vector.
    pub ctrls: Vec<RawControl>,
}

impl LdapResult {
    pub(crate) fn from_parts(res: ResultComponents, ctrls: Vec<RawControl>) -> Self {
        LdapResult {
            rc: res.rc,
            matched: res.matched,
            text: res.text,
            refs: res.refs,
            ctrls,
        }
    }

    /// If the result code is zero, return the instance itself wrapped
    /// in `Ok()`, otherwise wrap the instance in an `LdapError`.
    pub fn success(self) -> Result<Self> {
        if self.rc == LDAP_SUCCESS {
            Ok(self)
        } else {
            Err(LdapError::from(self))
        }
    }
}

impl Error for LdapResult {}

impl fmt::Display for LdapResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> StdResult<(), fmt::Error> {
        write!(
            f,
            "rc={} ({}), dn: \"{}\", text: \"{}\"",
            self.rc,
            rc_name(self.rc),
            self.matched,
            self.text
        )
    }
}

/// Outcome of a successful Bind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BindResult {
    /// Diagnostic text of the final response, if the server sent any.
    pub message: Option<String>,
    /// Response controls of the final response.
    pub ctrls: Vec<RawControl>,
}

impl BindResult {
    pub(crate) fn from_final(result: LdapResult) -> Self {
        BindResult {
            message: Some(result.text).filter(|t| !t.is_empty()),
            ctrls: result.ctrls,
        }
    }
}

/// Interpretation of a response received during a Bind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseClass {
    /// Bind response with result code 0, and the server credentials, if any.
    Success {
        result: LdapResult,
        server_creds: Option<Vec<u8>>,
    },
    /// Bind response with result code 14, the server wants another round.
    InProgress {
        result: LdapResult,
        server_creds: Option<Vec<u8>>,
    },
    /// Bind response with any other result code.
    Failure(LdapResult),
    /// Notice of Disconnection, with the server's result code and text.
    Disconnect { rc: u32, text: String },
    /// Anything else, described for diagnostics.
    Unexpected(String),
}

impl ResponseClass {
    /// Classify a response to a Bind request.
    ///
    /// Only Bind and Extended responses are acceptable. A Bind response is sorted by
    /// its result code. An Extended response must be a Notice of Disconnection, whose
    /// own result code doesn't matter for the classification.
    pub fn of(resp: LdapResponse) -> ResponseClass {
        match resp.op {
            ResponseOp::Bind(bind) => {
                let result = LdapResult::from_parts(bind.result, resp.ctrls);
                match result.rc {
                    LDAP_SUCCESS => ResponseClass::Success {
                        result,
                        server_creds: bind.server_creds,
                    },
                    LDAP_SASL_BIND_IN_PROGRESS => ResponseClass::InProgress {
                        result,
                        server_creds: bind.server_creds,
                    },
                    _ => ResponseClass::Failure(result),
                }
            }
            ResponseOp::Extended(ext) if ext.is_disconnect_notice() => ResponseClass::Disconnect {
                rc: ext.result.rc,
                text: ext.result.text,
            },
            ResponseOp::Extended(ext) => ResponseClass::Unexpected(format!(
                "extended response (oid: {}, {})",
                ext.name.as_deref().unwrap_or("none"),
                LdapResult::from_parts(ext.result, vec![])
            )),
            op @ ResponseOp::Other(_) => ResponseClass::Unexpected(op.name()),
        }
    }

    /// Collapse into the final outcome of a single-round exchange: success yields the
    /// result and server credentials, everything else becomes the matching error.
    pub(crate) fn into_success(self) -> Result<(LdapResult, Option<Vec<u8>>)> {
        match self {
            ResponseClass::Success {
                result,
                server_creds,
            } => Ok((result, server_creds)),
            other => Err(other.into_error()),
        }
    }

    /// Expect an intermediate round.
    pub(crate) fn into_in_progress(self) -> Result<Option<Vec<u8>>> {
        match self {
            ResponseClass::InProgress { server_creds, .. } => Ok(server_creds),
            other => Err(other.into_error()),
        }
    }

    pub(crate) fn into_error(self) -> LdapError {
        match self {
            ResponseClass::Success { result, .. }
            | ResponseClass::InProgress { result, .. }
            | ResponseClass::Failure(result) => LdapError::LdapResult { result },
            ResponseClass::Disconnect { rc, text } => LdapError::Disconnect { rc, text },
            ResponseClass::Unexpected(desc) => LdapError::UnexpectedResponse(desc),
        }
    }
}
