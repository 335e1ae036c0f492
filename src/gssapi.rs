//! GSSAPI negotiation capability.
//!
//! The bind engine drives the GSSAPI exchange through the narrow [`SaslNegotiator`]
//! interface, and obtains negotiators from a [`GssapiProvider`]. With the __gssapi__
//! feature, [`Krb5Provider`] supplies negotiators backed by the system Kerberos
//! libraries through `cross-krb5`. Without it, a provider must be injected with
//! [`BindHandler::with_gssapi_provider()`](crate::BindHandler::with_gssapi_provider).

use crate::mechanism::GssapiParams;
use crate::result::Result;

/// Client side of a SASL security mechanism exchange.
pub trait SaslNegotiator: Send {
    /// Initial client response, sent with the first Bind request. `None` if the
    /// mechanism has no initial response.
    fn initial_token(&mut self) -> Result<Option<Vec<u8>>>;

    /// Produce the response to a server challenge. An empty challenge is passed if
    /// the server sent no credentials.
    fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Vec<u8>>;

    /// Whether the exchange is finished from the client's point of view.
    fn is_complete(&self) -> bool;
}

/// Everything a provider needs to set up a GSSAPI negotiation.
#[derive(Clone, Copy, Debug)]
pub struct GssapiLogin<'a> {
    pub params: &'a GssapiParams,
    /// Host name of the directory server, for the service principal.
    pub server_host: &'a str,
    /// Password given with the Bind, if any. Providers which rely on a credential
    /// cache may ignore it.
    pub password: Option<&'a [u8]>,
}

/// Factory of GSSAPI negotiators.
pub trait GssapiProvider: Send {
    /// Establish the client credentials and start a negotiation.
    fn negotiator(&mut self, login: &GssapiLogin<'_>) -> Result<Box<dyn SaslNegotiator>>;
}

#[cfg(feature = "gssapi")]
pub use self::krb5::{Krb5Negotiator, Krb5Provider};

#[cfg(feature = "gssapi")]
mod krb5 {
    use std::mem;

    use super::{GssapiLogin, GssapiProvider, SaslNegotiator};
    use crate::result::{LdapError, Result};

    use cross_krb5::{ClientCtx, InitiateFlags, K5Ctx, PendingClientCtx, Step};

    const GSSAUTH_P_NONE: u8 = 1;

    fn gss_err(e: impl std::fmt::Display) -> LdapError {
        LdapError::GssapiOperationError(format!("{:#}", e))
    }

    /// Provider using the default Kerberos credential cache.
    ///
    /// The client principal is the `authid` property, qualified with the `realm`
    /// property if it has no realm of its own. The service principal is
    /// `ldap/<server host>`. A `kdc` property can't be honored per Bind, since KDC
    /// discovery belongs to the Kerberos configuration; it is logged and ignored.
    #[cfg_attr(docsrs, doc(cfg(feature = "gssapi")))]
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Krb5Provider;

    impl GssapiProvider for Krb5Provider {
        fn negotiator(&mut self, login: &GssapiLogin<'_>) -> Result<Box<dyn SaslNegotiator>> {
            let params = login.params;
            if let Some(kdc) = params.kdc.as_deref() {
                warn!("GSSAPI: kdc property \"{}\" ignored, configure it in krb5.conf", kdc);
            }
            if login.password.is_some() {
                debug!("GSSAPI: password ignored, using the credential cache");
            }
            let principal = match params.realm.as_deref() {
                Some(realm) if !params.authid.contains('@') => {
                    format!("{}@{}", params.authid, realm)
                }
                _ => params.authid.clone(),
            };
            Ok(Box::new(Krb5Negotiator {
                principal,
                spn: format!("ldap/{}", login.server_host),
                authzid: params.authzid.clone(),
                state: State::Initial,
            }))
        }
    }

    enum State {
        Initial,
        Pending(PendingClientCtx),
        Established(ClientCtx),
        Complete,
        Failed,
    }

    /// Kerberos V5 GSSAPI negotiator ([RFC 4752](https://tools.ietf.org/html/rfc4752)).
    ///
    /// After the security context is established, the final server challenge offers
    /// security layers. The negotiator always selects none, so the connection stays
    /// unwrapped after the Bind; use TLS for confidentiality.
    #[cfg_attr(docsrs, doc(cfg(feature = "gssapi")))]
    pub struct Krb5Negotiator {
        principal: String,
        spn: String,
        authzid: String,
        state: State,
    }

    impl SaslNegotiator for Krb5Negotiator {
        fn initial_token(&mut self) -> Result<Option<Vec<u8>>> {
            let (pending, token) =
                ClientCtx::new(InitiateFlags::empty(), Some(self.principal.as_str()), &self.spn, None)
                    .map_err(gss_err)?;
            self.state = State::Pending(pending);
            Ok(Some(token.to_vec()))
        }

        fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
            match mem::replace(&mut self.state, State::Failed) {
                State::Pending(pending) => match pending.step(challenge).map_err(gss_err)? {
                    Step::Finished((ctx, token)) => {
                        self.state = State::Established(ctx);
                        Ok(token.map(|t| t.to_vec()).unwrap_or_default())
                    }
                    Step::Continue((pending, token)) => {
                        self.state = State::Pending(pending);
                        Ok(token.to_vec())
                    }
                },
                State::Established(mut ctx) => {
                    let offer = ctx.unwrap(challenge).map_err(gss_err)?;
                    if offer.len() != 4 {
                        return Err(LdapError::GssapiOperationError(format!(
                            "bad security layer offer length: {}",
                            offer.len()
                        )));
                    }
                    if offer[0] & GSSAUTH_P_NONE == 0 {
                        return Err(LdapError::GssapiOperationError(format!(
                            "server requires a security layer, mask {}",
                            offer[0]
                        )));
                    }
                    let mut reply = vec![GSSAUTH_P_NONE, 0, 0, 0];
                    reply.extend_from_slice(self.authzid.as_bytes());
                    let wrapped = ctx.wrap(false, &reply).map_err(gss_err)?;
                    self.state = State::Complete;
                    Ok(wrapped.to_vec())
                }
                State::Initial | State::Complete | State::Failed => Err(
                    LdapError::GssapiOperationError(String::from("unexpected server challenge")),
                ),
            }
        }

        fn is_complete(&self) -> bool {
            matches!(self.state, State::Complete)
        }
    }
}
