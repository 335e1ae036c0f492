//! Typed LDAP operations exchanged with the transport.
//!
//! The bind engine never sees the BER envelope. It hands the transport an
//! [`LdapRequest`] and receives an [`LdapResponse`], and the encoding of both
//! belongs to whatever connection sits behind the [`Transport`](crate::Transport).

use crate::RequestId;
use crate::controls::RawControl;

pub(crate) type MaybeControls = Option<Vec<RawControl>>;

/// LDAP protocol version sent in Bind requests unless configured otherwise.
pub const LDAP_VERSION3: u8 = 3;

/// OID of the unsolicited Notice of Disconnection ([RFC 4511, Section 4.4.1](https://tools.ietf.org/html/rfc4511#section-4.4.1)).
pub const NOTICE_OF_DISCONNECTION_OID: &str = "1.3.6.1.4.1.1466.20036";

/// Outgoing message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LdapRequest {
    /// Message id, allocated from the connection's sequence.
    pub id: RequestId,
    /// Protocol operation.
    pub op: RequestOp,
    /// Request controls, possibly empty.
    pub ctrls: Vec<RawControl>,
}

/// Request operations issued by this crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestOp {
    Bind(BindRequest),
    Extended(ExtendedRequest),
}

/// Bind request, `[APPLICATION 0]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindRequest {
    pub version: u8,
    /// Bind DN. Empty for anonymous simple binds, and usually for SASL binds.
    pub dn: Vec<u8>,
    pub auth: BindAuth,
}

/// Authentication choice of a Bind request.
#[derive(Clone, PartialEq, Eq)]
pub enum BindAuth {
    /// Cleartext password, `[0]`.
    Simple(Vec<u8>),
    /// SASL credentials, `[3]`.
    Sasl {
        mechanism: String,
        credentials: Option<Vec<u8>>,
    },
}

impl std::fmt::Debug for BindAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Payloads are secrets or derived from them, only lengths are shown.
        match self {
            BindAuth::Simple(pw) => f
                .debug_tuple("Simple")
                .field(&format_args!("<{} bytes>", pw.len()))
                .finish(),
            BindAuth::Sasl {
                mechanism,
                credentials,
            } => f
                .debug_struct("Sasl")
                .field("mechanism", mechanism)
                .field(
                    "credentials",
                    &credentials.as_ref().map(|c| format!("<{} bytes>", c.len())),
                )
                .finish(),
        }
    }
}

impl BindRequest {
    pub(crate) fn simple(version: u8, dn: &[u8], password: &[u8]) -> Self {
        BindRequest {
            version,
            dn: dn.to_vec(),
            auth: BindAuth::Simple(password.to_vec()),
        }
    }

    pub(crate) fn sasl(dn: &[u8], mech: &str, creds: Option<&[u8]>) -> Self {
        BindRequest {
            version: LDAP_VERSION3,
            dn: dn.to_vec(),
            auth: BindAuth::Sasl {
                mechanism: mech.to_owned(),
                credentials: creds.map(<[u8]>::to_vec),
            },
        }
    }
}

/// Extended request, `[APPLICATION 23]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedRequest {
    pub name: String,
    pub value: Option<Vec<u8>>,
}

/// Incoming message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LdapResponse {
    /// Message id. Unsolicited notifications carry zero.
    pub id: RequestId,
    pub op: ResponseOp,
    /// Response controls, possibly empty.
    pub ctrls: Vec<RawControl>,
}

/// Response operations as decoded by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseOp {
    Bind(BindResponse),
    Extended(ExtendedResponse),
    /// Any other protocol operation, identified by its application tag number.
    Other(u64),
}

impl ResponseOp {
    /// Short name of the operation, for diagnostics.
    pub fn name(&self) -> String {
        match self {
            ResponseOp::Bind(_) => String::from("BindResponse"),
            ResponseOp::Extended(_) => String::from("ExtendedResponse"),
            ResponseOp::Other(tag) => format!("protocol op [APPLICATION {}]", tag),
        }
    }
}

/// Components of `LDAPResult`, shared by all response types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultComponents {
    pub rc: u32,
    pub matched: String,
    pub text: String,
    pub refs: Vec<String>,
}

/// Bind response, `[APPLICATION 1]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BindResponse {
    pub result: ResultComponents,
    /// `serverSaslCreds`, `[7]`.
    pub server_creds: Option<Vec<u8>>,
}

/// Extended response, `[APPLICATION 24]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtendedResponse {
    pub result: ResultComponents,
    /// `responseName`, `[10]`.
    pub name: Option<String>,
    /// `responseValue`, `[11]`.
    pub value: Option<Vec<u8>>,
}

impl ExtendedResponse {
    /// Whether this is an unsolicited Notice of Disconnection.
    pub fn is_disconnect_notice(&self) -> bool {
        self.name.as_deref() == Some(NOTICE_OF_DISCONNECTION_OID)
    }
}
