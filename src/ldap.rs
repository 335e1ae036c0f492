use std::fmt;

use crate::RequestId;
use crate::controls::RawControl;
use crate::controls_impl::IntoRawControlVec;
use crate::digest::NonceSource;
use crate::exop::{Exop, WhoAmI, WhoAmIResp};
use crate::gssapi::GssapiProvider;
use crate::mechanism::{Mechanism, MechanismParams, SaslProperties};
use crate::prompt::{CredentialSource, NoPrompt, Password};
use crate::protocol::{
    BindRequest, LDAP_VERSION3, LdapRequest, LdapResponse, MaybeControls, RequestOp, ResponseOp,
};
use crate::result::{BindResult, LDAP_SUCCESS, LdapError, LdapResult, ResponseClass, Result};
use crate::transport::{MessageIdSequence, Transport};

use zeroize::Zeroizing;

/// Additional parameters for Bind operations.
///
/// The settings are opaque; they are set with the consuming `set_*` methods, which
/// can be chained:
///
/// ```rust
/// # use ldapbind::BindSettings;
/// let settings = BindSettings::new()
///     .set_host("ldap.example.com")
///     .set_version(3);
/// ```
#[derive(Clone, Debug)]
pub struct BindSettings {
    host: String,
    version: u8,
}

impl Default for BindSettings {
    fn default() -> Self {
        BindSettings {
            host: String::from("localhost"),
            version: LDAP_VERSION3,
        }
    }
}

impl BindSettings {
    /// Create an instance of the structure with default settings.
    pub fn new() -> BindSettings {
        BindSettings::default()
    }

    /// Set the host name of the directory server. It is used for the DIGEST-MD5
    /// `digest-uri` default and the Kerberos service principal. The default
    /// is `localhost`.
    pub fn set_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    /// Set the protocol version sent with a simple Bind. The default is 3. SASL
    /// Binds always use version 3.
    pub fn set_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn version(&self) -> u8 {
        self.version
    }
}

/// Asynchronous Bind driver. __*__
///
/// The handler borrows a [`Transport`] and a shared [`MessageIdSequence`], and runs
/// one Bind at a time over them, each round awaiting exactly one response before the
/// next request is sent. It never closes the connection.
///
/// Request controls are attached by calling [`with_controls()`](#method.with_controls)
/// before invoking the operation. They are consumed by that operation, whether it
/// succeeds or not.
///
/// Passwords which aren't supplied with the call are obtained from the
/// [`CredentialSource`] configured with
/// [`with_credential_source()`](#method.with_credential_source); the default source
/// has no passwords, and the Bind proceeds with an empty one.
pub struct BindHandler<T> {
    pub(crate) transport: T,
    pub(crate) msgids: MessageIdSequence,
    pub(crate) settings: BindSettings,
    pub(crate) prompt: Box<dyn CredentialSource + Send>,
    pub(crate) gssapi: Option<Box<dyn GssapiProvider>>,
    pub(crate) nonces: NonceSource,
    pub(crate) last_id: RequestId,
    pub(crate) controls: MaybeControls,
}

impl<T: fmt::Debug> fmt::Debug for BindHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindHandler")
            .field("transport", &self.transport)
            .field("msgids", &self.msgids)
            .field("settings", &self.settings)
            .field("gssapi", &self.gssapi.is_some())
            .field("last_id", &self.last_id)
            .field("controls", &self.controls)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "gssapi")]
fn default_gssapi_provider() -> Option<Box<dyn GssapiProvider>> {
    Some(Box::new(crate::gssapi::Krb5Provider))
}

#[cfg(not(feature = "gssapi"))]
fn default_gssapi_provider() -> Option<Box<dyn GssapiProvider>> {
    None
}

impl<T: Transport> BindHandler<T> {
    /// Create a handler with default settings.
    pub fn new(transport: T, msgids: MessageIdSequence) -> Self {
        Self::with_settings(BindSettings::new(), transport, msgids)
    }

    /// Create a handler, using `settings` to specify additional parameters.
    pub fn with_settings(settings: BindSettings, transport: T, msgids: MessageIdSequence) -> Self {
        BindHandler {
            transport,
            msgids,
            settings,
            prompt: Box::new(NoPrompt),
            gssapi: default_gssapi_provider(),
            nonces: NonceSource::new(),
            last_id: 0,
            controls: None,
        }
    }

    /// Use `source` for passwords not supplied with the Bind.
    pub fn with_credential_source<S>(mut self, source: S) -> Self
    where
        S: CredentialSource + Send + 'static,
    {
        self.prompt = Box::new(source);
        self
    }

    /// Use `provider` for GSSAPI negotiation, replacing the default one.
    pub fn with_gssapi_provider<P>(mut self, provider: P) -> Self
    where
        P: GssapiProvider + 'static,
    {
        self.gssapi = Some(Box::new(provider));
        self
    }

    /// Pass the provided request control(s) to the next operation.
    ///
    /// This method accepts either a control vector or a single `RawControl`.
    /// For a SASL mechanism with a preliminary round, the controls are sent with
    /// the request carrying the client's credentials.
    pub fn with_controls<V: IntoRawControlVec>(&mut self, ctrls: V) -> &mut Self {
        self.controls = Some(ctrls.into());
        self
    }

    /// Return the message id of the last request sent by this handler, or 0 if none
    /// was sent.
    pub fn last_id(&self) -> RequestId {
        self.last_id
    }

    pub fn settings(&self) -> &BindSettings {
        &self.settings
    }

    /// Release the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    pub(crate) async fn op_call(
        &mut self,
        op: RequestOp,
        ctrls: Vec<RawControl>,
    ) -> Result<LdapResponse> {
        let id = self.msgids.next_id();
        self.last_id = id;
        self.transport.send(LdapRequest { id, op, ctrls }).await?;
        let resp = self
            .transport
            .recv()
            .await?
            .ok_or(LdapError::ConnectionClosed)?;
        if resp.id != id {
            debug!("response id {} doesn't match request id {}", resp.id, id);
        }
        Ok(resp)
    }

    pub(crate) async fn bind_round(
        &mut self,
        req: BindRequest,
        ctrls: Vec<RawControl>,
    ) -> Result<ResponseClass> {
        let resp = self.op_call(RequestOp::Bind(req), ctrls).await?;
        let class = ResponseClass::of(resp);
        match &class {
            ResponseClass::Success { .. } => trace!("bind round {}: success", self.last_id),
            ResponseClass::InProgress { .. } => trace!("bind round {}: in progress", self.last_id),
            ResponseClass::Failure(res) => debug!("bind round {}: rc={}", self.last_id, res.rc),
            ResponseClass::Disconnect { rc, .. } => {
                debug!("bind round {}: disconnected, rc={}", self.last_id, rc)
            }
            ResponseClass::Unexpected(desc) => debug!("bind round {}: {}", self.last_id, desc),
        }
        Ok(class)
    }

    /// The password given with the call, or one obtained from the credential source.
    pub(crate) fn password(&mut self, given: Option<&[u8]>, identity: &str) -> Result<Password> {
        match given {
            Some(pw) => Ok(Zeroizing::new(pw.to_vec())),
            None => {
                debug!("prompting for the password of \"{}\"", identity);
                Ok(self
                    .prompt
                    .prompt_password(identity)?
                    .unwrap_or_else(|| Zeroizing::new(Vec::new())))
            }
        }
    }

    /// Do a simple Bind with the provided DN (`bind_dn`) and password (`bind_pw`).
    ///
    /// An empty DN means an anonymous Bind. If the password is `None` and the DN isn't
    /// empty, the credential source is asked for it.
    pub async fn simple_bind(&mut self, bind_dn: &str, bind_pw: Option<&[u8]>) -> Result<BindResult> {
        let ctrls = self.controls.take().unwrap_or_default();
        let password = if bind_dn.is_empty() {
            Zeroizing::new(bind_pw.map(<[u8]>::to_vec).unwrap_or_default())
        } else {
            self.password(bind_pw, bind_dn)?
        };
        let req = BindRequest::simple(self.settings.version, bind_dn.as_bytes(), &password);
        drop(password);
        let (result, _) = self.bind_round(req, ctrls).await?.into_success()?;
        Ok(BindResult::from_final(result))
    }

    /// Do a SASL Bind using the named mechanism.
    ///
    /// The properties are validated against the mechanism's rules before anything is
    /// sent. The password, if the mechanism needs one and `bind_pw` is `None`, is
    /// obtained from the credential source. The bind DN is sent with every request.
    ///
    /// See [`supported_mechanisms()`](crate::supported_mechanisms) and
    /// [`sasl_properties()`](crate::sasl_properties) for the mechanisms and their
    /// properties.
    pub async fn sasl_bind(
        &mut self,
        bind_dn: &str,
        bind_pw: Option<&[u8]>,
        mechanism: &str,
        props: &SaslProperties,
    ) -> Result<BindResult> {
        if mechanism.is_empty() {
            return Err(LdapError::NoSaslMechanism);
        }
        let mech = Mechanism::parse(mechanism);
        let params = MechanismParams::parse(&mech, props, &self.settings.host)?;
        let ctrls = self.controls.take().unwrap_or_default();
        debug!("SASL {} bind as \"{}\"", mech, bind_dn);
        match params {
            MechanismParams::Anonymous(p) => self.anonymous_bind(bind_dn, p, ctrls).await,
            MechanismParams::CramMd5(p) => self.cram_md5_bind(bind_dn, bind_pw, p, ctrls).await,
            MechanismParams::DigestMd5(p) => {
                self.digest_md5_bind(bind_dn, bind_pw, p, ctrls).await
            }
            MechanismParams::External => self.external_bind(bind_dn, ctrls).await,
            MechanismParams::Gssapi(p) => self.gssapi_bind(bind_dn, bind_pw, p, ctrls).await,
            MechanismParams::Plain(p) => self.plain_bind(bind_dn, bind_pw, p, ctrls).await,
        }
    }

    /// Ask the server for the authorization identity of the connection, with the
    /// Who Am I extended operation. Returns `None` for the anonymous identity.
    pub async fn who_am_i(&mut self) -> Result<Option<String>> {
        let ctrls = self.controls.take().unwrap_or_default();
        let req = Exop::from(WhoAmI).into_request();
        let resp = self.op_call(RequestOp::Extended(req), ctrls).await?;
        match resp.op {
            ResponseOp::Extended(ext) if ext.is_disconnect_notice() => Err(LdapError::Disconnect {
                rc: ext.result.rc,
                text: ext.result.text,
            }),
            ResponseOp::Extended(ext) => {
                if ext.result.rc != LDAP_SUCCESS {
                    return Err(LdapResult::from_parts(ext.result, resp.ctrls).into());
                }
                let exop = Exop {
                    name: ext.name,
                    val: ext.value,
                };
                Ok(exop.parse::<WhoAmIResp>().identity())
            }
            op => Err(LdapError::UnexpectedResponse(op.name())),
        }
    }
}
