//! Extended operations used around a Bind.

use crate::protocol::ExtendedRequest;

pub const WHOAMI_OID: &str = "1.3.6.1.4.1.4203.1.11.3";

/// Generic extended operation.
///
/// Since the same struct can be used both for requests and responses,
/// both fields must be declared as optional; when sending an extended
/// request, `name` must not be `None`.
#[derive(Clone, Debug, Default)]
pub struct Exop {
    /// OID of the operation. It may be absent in the response.
    pub name: Option<String>,
    /// Request or response value. It may be absent in both cases.
    pub val: Option<Vec<u8>>,
}

impl Exop {
    /// Parse the generic exop into an exop-specific struct.
    pub fn parse<T: ExopParser>(&self) -> T {
        T::parse(self.val.as_deref().unwrap_or_default())
    }

    pub(crate) fn into_request(self) -> ExtendedRequest {
        ExtendedRequest {
            name: self.name.unwrap_or_default(),
            value: self.val,
        }
    }
}

/// Conversion trait for extended response values.
pub trait ExopParser {
    /// Convert the raw BER value into an exop-specific struct.
    fn parse(val: &[u8]) -> Self;
}

/// Who Am I extended operation ([RFC 4532](https://tools.ietf.org/html/rfc4532)).
///
/// This operation doesn't have any data associated with a request. It can be
/// sent right after a Bind to find out which authorization identity the server
/// associated with the connection.
#[derive(Clone, Copy, Debug)]
pub struct WhoAmI;

/// Who Am I response.
#[derive(Clone, Debug)]
pub struct WhoAmIResp {
    /// Authorization identity, in the `dn:` or `u:` form. Empty for anonymous.
    pub authzid: String,
}

impl WhoAmIResp {
    /// The identity, unless it denotes the anonymous user.
    pub fn identity(self) -> Option<String> {
        if self.authzid.is_empty() || self.authzid.eq_ignore_ascii_case("dn:") {
            None
        } else {
            Some(self.authzid)
        }
    }
}

impl From<WhoAmI> for Exop {
    fn from(_: WhoAmI) -> Exop {
        Exop {
            name: Some(WHOAMI_OID.to_owned()),
            val: None,
        }
    }
}

impl ExopParser for WhoAmIResp {
    fn parse(val: &[u8]) -> WhoAmIResp {
        WhoAmIResp {
            authzid: String::from_utf8_lossy(val).into_owned(),
        }
    }
}
