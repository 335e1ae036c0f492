//! SASL mechanism registry, property bags, and property validation.
//!
//! Every mechanism declares the properties it accepts in a static rule table.
//! Validation checks a [`SaslProperties`] bag against that table and produces the
//! mechanism's parsed parameters, so that a Bind with bad properties fails before
//! anything is sent to the server.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

use crate::result::{LdapError, Result};

pub const SASL_PROPERTY_AUTHID: &str = "authid";
pub const SASL_PROPERTY_AUTHZID: &str = "authzid";
pub const SASL_PROPERTY_DIGEST_URI: &str = "digest-uri";
pub const SASL_PROPERTY_KDC: &str = "kdc";
pub const SASL_PROPERTY_QOP: &str = "qop";
pub const SASL_PROPERTY_REALM: &str = "realm";
pub const SASL_PROPERTY_TRACE: &str = "trace";

/// The only quality of protection implemented.
pub const QOP_AUTH: &str = "auth";

/// SASL mechanism, parsed from its name.
///
/// Names are matched case-insensitively. A name which doesn't match any supported
/// mechanism parses into [`Mechanism::Unsupported`], which fails at dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Mechanism {
    Anonymous,
    CramMd5,
    DigestMd5,
    External,
    Gssapi,
    Plain,
    Unsupported(String),
}

/// All supported mechanisms, in the order they are advertised.
pub const SUPPORTED_MECHANISMS: [Mechanism; 6] = [
    Mechanism::Anonymous,
    Mechanism::CramMd5,
    Mechanism::DigestMd5,
    Mechanism::External,
    Mechanism::Gssapi,
    Mechanism::Plain,
];

impl Mechanism {
    pub fn parse(name: &str) -> Mechanism {
        match name.to_ascii_uppercase().as_str() {
            "ANONYMOUS" => Mechanism::Anonymous,
            "CRAM-MD5" => Mechanism::CramMd5,
            "DIGEST-MD5" => Mechanism::DigestMd5,
            "EXTERNAL" => Mechanism::External,
            "GSSAPI" => Mechanism::Gssapi,
            "PLAIN" => Mechanism::Plain,
            _ => Mechanism::Unsupported(name.to_owned()),
        }
    }

    /// Registered name, or the name as given for an unsupported mechanism.
    pub fn name(&self) -> &str {
        match self {
            Mechanism::Unsupported(name) => name,
            known => known.static_name().unwrap_or_default(),
        }
    }

    fn static_name(&self) -> Option<&'static str> {
        Some(match self {
            Mechanism::Anonymous => "ANONYMOUS",
            Mechanism::CramMd5 => "CRAM-MD5",
            Mechanism::DigestMd5 => "DIGEST-MD5",
            Mechanism::External => "EXTERNAL",
            Mechanism::Gssapi => "GSSAPI",
            Mechanism::Plain => "PLAIN",
            Mechanism::Unsupported(_) => return None,
        })
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Mechanism::Unsupported(_))
    }

    /// Property rules of the mechanism; `None` if unsupported.
    pub fn property_rules(&self) -> Option<&'static [PropertyRule]> {
        Some(match self {
            Mechanism::Anonymous => ANONYMOUS_RULES,
            Mechanism::CramMd5 => CRAM_MD5_RULES,
            Mechanism::DigestMd5 => DIGEST_MD5_RULES,
            Mechanism::External => &[],
            Mechanism::Gssapi => GSSAPI_RULES,
            Mechanism::Plain => PLAIN_RULES,
            Mechanism::Unsupported(_) => return None,
        })
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Names of the supported mechanisms.
pub fn supported_mechanisms() -> Vec<&'static str> {
    SUPPORTED_MECHANISMS
        .iter()
        .filter_map(Mechanism::static_name)
        .collect()
}

/// Advertised properties of the named mechanism, as `(name, description)` pairs in
/// schema order. An unknown mechanism has no schema.
pub fn sasl_properties(mech: &str) -> Option<Vec<(&'static str, &'static str)>> {
    Mechanism::parse(mech).property_rules().map(|rules| {
        rules
            .iter()
            .filter(|r| r.advertised)
            .map(|r| (r.name, r.description))
            .collect()
    })
}

/// Acceptance rule for one SASL property.
#[derive(Clone, Copy, Debug)]
pub struct PropertyRule {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    /// Whether the property appears in the mechanism's schema.
    pub advertised: bool,
}

const fn rule(name: &'static str, description: &'static str, required: bool) -> PropertyRule {
    PropertyRule {
        name,
        description,
        required,
        advertised: true,
    }
}

const AUTHID_DESC: &str = "Specifies the authentication ID for the bind";
const AUTHZID_DESC: &str = "Specifies the authorization ID to use for the bind";
const REALM_DESC: &str = "Specifies the realm into which the authentication is to be performed";
const QOP_DESC: &str = "Specifies the quality of protection to use for the bind";

static ANONYMOUS_RULES: &[PropertyRule] = &[rule(
    SASL_PROPERTY_TRACE,
    "Specifies a text string that may be written to the directory server access log as trace information for the bind",
    false,
)];

static CRAM_MD5_RULES: &[PropertyRule] = &[rule(SASL_PROPERTY_AUTHID, AUTHID_DESC, true)];

static DIGEST_MD5_RULES: &[PropertyRule] = &[
    rule(SASL_PROPERTY_AUTHID, AUTHID_DESC, true),
    rule(SASL_PROPERTY_REALM, REALM_DESC, false),
    rule(SASL_PROPERTY_QOP, QOP_DESC, false),
    rule(
        SASL_PROPERTY_DIGEST_URI,
        "Specifies the digest URI to use for the bind, by default \"ldap/\" followed by the server host name",
        false,
    ),
    rule(SASL_PROPERTY_AUTHZID, AUTHZID_DESC, false),
];

static GSSAPI_RULES: &[PropertyRule] = &[
    rule(SASL_PROPERTY_AUTHID, AUTHID_DESC, true),
    rule(SASL_PROPERTY_AUTHZID, AUTHZID_DESC, false),
    rule(
        SASL_PROPERTY_KDC,
        "Specifies the KDC to use for the Kerberos authentication",
        false,
    ),
    rule(SASL_PROPERTY_REALM, REALM_DESC, false),
    PropertyRule {
        advertised: false,
        ..rule(SASL_PROPERTY_QOP, QOP_DESC, false)
    },
];

static PLAIN_RULES: &[PropertyRule] = &[
    rule(SASL_PROPERTY_AUTHID, AUTHID_DESC, true),
    rule(SASL_PROPERTY_AUTHZID, AUTHZID_DESC, false),
];

/// Bag of SASL properties.
///
/// Names are case-insensitive and stored in lowercase. A name may accumulate several
/// values in insertion order, though every property currently defined is
/// single-valued, and validation rejects repeated ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaslProperties(BTreeMap<String, Vec<String>>);

impl SaslProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value for the property `name`.
    pub fn insert<V: Into<String>>(&mut self, name: &str, value: V) -> &mut Self {
        self.0
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    /// Add a property given in the `name=value` form. Everything after the first
    /// `=` is the value, which may be empty; the name may not.
    pub fn parse_property(&mut self, assignment: &str) -> Result<&mut Self> {
        match assignment.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok(self.insert(name, value)),
            _ => Err(LdapError::InvalidPropertyFormat(assignment.to_owned())),
        }
    }

    /// Values of the property `name`.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(&name.to_ascii_lowercase()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter(self.0.iter())
    }
}

/// Iterator over the properties of a [`SaslProperties`] bag.
pub struct Iter<'a>(btree_map::Iter<'a, String, Vec<String>>);

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a [String]);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<'a> IntoIterator for &'a SaslProperties {
    type Item = (&'a str, &'a [String]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for SaslProperties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = SaslProperties::new();
        for (k, v) in iter {
            props.insert(k.as_ref(), v);
        }
        props
    }
}

/// Properties which passed the rule check, one value each.
struct Checked<'a>(BTreeMap<&'static str, &'a str>);

impl<'a> Checked<'a> {
    fn get(&self, name: &str) -> Option<&'a str> {
        self.0.get(name).copied()
    }

    fn owned(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_owned)
    }

    fn required(&self, name: &str) -> String {
        // Presence of required properties is established by check().
        self.owned(name).unwrap_or_default()
    }
}

fn check<'a>(
    mech: &'static str,
    rules: &'static [PropertyRule],
    props: &'a SaslProperties,
) -> Result<Checked<'a>> {
    let mut checked = BTreeMap::new();
    for (name, values) in props {
        let rule = rules
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| LdapError::InvalidProperty {
                name: name.to_owned(),
                mech,
            })?;
        match values {
            [] => (),
            [value] => {
                checked.insert(rule.name, value.as_str());
            }
            _ => {
                return Err(LdapError::PropertyMustBeSingleValued {
                    name: name.to_owned(),
                    mech,
                });
            }
        }
    }
    for rule in rules.iter().filter(|r| r.required) {
        if checked.get(rule.name).is_none_or(|v| v.is_empty()) {
            return Err(LdapError::RequiredPropertyMissing {
                name: rule.name,
                mech,
            });
        }
    }
    Ok(Checked(checked))
}

/// Validate a QoP value, returning it in lowercase.
pub fn validate_qop(qop: &str) -> Result<String> {
    let lc = qop.to_ascii_lowercase();
    match lc.as_str() {
        QOP_AUTH => Ok(lc),
        "auth-int" | "auth-conf" => Err(LdapError::UnsupportedQop(qop.to_owned())),
        _ => Err(LdapError::InvalidQop(qop.to_owned())),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnonymousParams {
    /// Trace string, sent as the SASL credentials.
    pub trace: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CramMd5Params {
    pub authid: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestMd5Params {
    pub authid: String,
    /// Realm chosen by the client. If `None`, the server's realm may be adopted.
    pub realm: Option<String>,
    pub qop: String,
    pub digest_uri: String,
    pub authzid: Option<String>,
}

impl DigestMd5Params {
    /// Whether the realm was given as a property, which pins it even if absent.
    pub(crate) fn realm_from_property(&self) -> bool {
        self.realm.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GssapiParams {
    pub authid: String,
    /// Defaults to `authid`.
    pub authzid: String,
    pub kdc: Option<String>,
    pub realm: Option<String>,
    pub qop: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlainParams {
    pub authid: String,
    pub authzid: Option<String>,
}

/// Parsed parameters of a mechanism.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MechanismParams {
    Anonymous(AnonymousParams),
    CramMd5(CramMd5Params),
    DigestMd5(DigestMd5Params),
    External,
    Gssapi(GssapiParams),
    Plain(PlainParams),
}

impl MechanismParams {
    /// Validate `props` for `mech` and parse the mechanism parameters. The host name
    /// provides the DIGEST-MD5 `digest-uri` default.
    pub fn parse(mech: &Mechanism, props: &SaslProperties, host: &str) -> Result<Self> {
        let (name, rules) = match (mech.static_name(), mech.property_rules()) {
            (Some(name), Some(rules)) => (name, rules),
            _ => return Err(LdapError::UnsupportedMechanism(mech.name().to_owned())),
        };
        let p = check(name, rules, props)?;
        let qop = p
            .get(SASL_PROPERTY_QOP)
            .map_or_else(|| Ok(String::from(QOP_AUTH)), validate_qop)?;
        Ok(match mech {
            Mechanism::Anonymous => MechanismParams::Anonymous(AnonymousParams {
                trace: p.owned(SASL_PROPERTY_TRACE),
            }),
            Mechanism::CramMd5 => MechanismParams::CramMd5(CramMd5Params {
                authid: p.required(SASL_PROPERTY_AUTHID),
            }),
            Mechanism::DigestMd5 => MechanismParams::DigestMd5(DigestMd5Params {
                authid: p.required(SASL_PROPERTY_AUTHID),
                realm: p.owned(SASL_PROPERTY_REALM),
                qop,
                digest_uri: p
                    .get(SASL_PROPERTY_DIGEST_URI)
                    .map_or_else(|| format!("ldap/{}", host), str::to_lowercase),
                authzid: p.get(SASL_PROPERTY_AUTHZID).map(str::to_lowercase),
            }),
            Mechanism::External => MechanismParams::External,
            Mechanism::Gssapi => {
                let authid = p.required(SASL_PROPERTY_AUTHID);
                MechanismParams::Gssapi(GssapiParams {
                    authzid: p.owned(SASL_PROPERTY_AUTHZID).unwrap_or_else(|| authid.clone()),
                    authid,
                    kdc: p.owned(SASL_PROPERTY_KDC),
                    realm: p.owned(SASL_PROPERTY_REALM),
                    qop,
                })
            }
            Mechanism::Plain => MechanismParams::Plain(PlainParams {
                authid: p.required(SASL_PROPERTY_AUTHID),
                authzid: p.owned(SASL_PROPERTY_AUTHZID),
            }),
            Mechanism::Unsupported(name) => {
                return Err(LdapError::UnsupportedMechanism(name.clone()));
            }
        })
    }
}
