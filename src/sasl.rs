//! Round drivers of the SASL mechanisms.
//!
//! Each driver runs the whole exchange of its mechanism over the handler's
//! transport. ANONYMOUS, EXTERNAL and PLAIN take a single round. CRAM-MD5 and
//! DIGEST-MD5 open with a request carrying no credentials, which the server must
//! answer with a challenge. GSSAPI takes as many rounds as the negotiator needs.

mod digest_md5;

use crate::controls::RawControl;
use crate::digest::{digest_md5_response, hmac_md5_digest};
use crate::gssapi::GssapiLogin;
use crate::ldap::BindHandler;
use crate::mechanism::{AnonymousParams, CramMd5Params, DigestMd5Params, GssapiParams, PlainParams};
use crate::protocol::BindRequest;
use crate::result::{BindResult, LdapError, ResponseClass, Result};
use crate::transport::Transport;

use self::digest_md5::{DigestChallenge, response_credentials, verify_rspauth};

use zeroize::Zeroizing;

const ANONYMOUS: &str = "ANONYMOUS";
const CRAM_MD5: &str = "CRAM-MD5";
const DIGEST_MD5: &str = "DIGEST-MD5";
const EXTERNAL: &str = "EXTERNAL";
const GSSAPI: &str = "GSSAPI";
const PLAIN: &str = "PLAIN";

impl<T: Transport> BindHandler<T> {
    async fn single_round(&mut self, req: BindRequest, ctrls: Vec<RawControl>) -> Result<BindResult> {
        let (result, _) = self.bind_round(req, ctrls).await?.into_success()?;
        Ok(BindResult::from_final(result))
    }

    /// Send the credential-less opening request and return the server's challenge.
    async fn challenge_round(&mut self, dn: &str, mech: &'static str) -> Result<Vec<u8>> {
        let req = BindRequest::sasl(dn.as_bytes(), mech, None);
        self.bind_round(req, vec![])
            .await?
            .into_in_progress()?
            .ok_or(LdapError::MissingServerCredentials { mech })
    }

    pub(crate) async fn anonymous_bind(
        &mut self,
        dn: &str,
        params: AnonymousParams,
        ctrls: Vec<RawControl>,
    ) -> Result<BindResult> {
        let trace = params.trace.as_deref().map(str::as_bytes);
        let req = BindRequest::sasl(dn.as_bytes(), ANONYMOUS, trace);
        self.single_round(req, ctrls).await
    }

    pub(crate) async fn external_bind(
        &mut self,
        dn: &str,
        ctrls: Vec<RawControl>,
    ) -> Result<BindResult> {
        let req = BindRequest::sasl(dn.as_bytes(), EXTERNAL, None);
        self.single_round(req, ctrls).await
    }

    pub(crate) async fn plain_bind(
        &mut self,
        dn: &str,
        bind_pw: Option<&[u8]>,
        params: PlainParams,
        ctrls: Vec<RawControl>,
    ) -> Result<BindResult> {
        let password = self.password(bind_pw, &params.authid)?;
        let authzid = params.authzid.as_deref().unwrap_or_default();
        let mut payload =
            Zeroizing::new(Vec::with_capacity(authzid.len() + params.authid.len() + password.len() + 2));
        payload.extend_from_slice(authzid.as_bytes());
        payload.push(0);
        payload.extend_from_slice(params.authid.as_bytes());
        payload.push(0);
        payload.extend_from_slice(&password);
        let req = BindRequest::sasl(dn.as_bytes(), PLAIN, Some(&payload[..]));
        self.single_round(req, ctrls).await
    }

    pub(crate) async fn cram_md5_bind(
        &mut self,
        dn: &str,
        bind_pw: Option<&[u8]>,
        params: CramMd5Params,
        ctrls: Vec<RawControl>,
    ) -> Result<BindResult> {
        let password = self.password(bind_pw, &params.authid)?;
        let challenge = self.challenge_round(dn, CRAM_MD5).await?;
        let creds = format!("{} {}", params.authid, hmac_md5_digest(&password, &challenge)?);
        let req = BindRequest::sasl(dn.as_bytes(), CRAM_MD5, Some(creds.as_bytes()));
        self.single_round(req, ctrls).await
    }

    pub(crate) async fn digest_md5_bind(
        &mut self,
        dn: &str,
        bind_pw: Option<&[u8]>,
        params: DigestMd5Params,
        ctrls: Vec<RawControl>,
    ) -> Result<BindResult> {
        let password = self.password(bind_pw, &params.authid)?;
        let server_creds = self.challenge_round(dn, DIGEST_MD5).await?;
        let challenge = DigestChallenge::parse(&server_creds, &params)?;
        let cnonce = self.nonces.generate_cnonce();
        let input = challenge.digest_input(&params, &password, &cnonce);
        let creds = response_credentials(&input, &digest_md5_response(&input));
        let req = BindRequest::sasl(dn.as_bytes(), DIGEST_MD5, Some(creds.as_bytes()));
        let (result, server_creds) = self.bind_round(req, ctrls).await?.into_success()?;
        verify_rspauth(server_creds.as_deref(), &input)?;
        Ok(BindResult::from_final(result))
    }

    /// Drive the negotiator until it completes and the server reports success.
    ///
    /// Request controls go with every request. Credentials which come with the final
    /// success are handed to the negotiator if it isn't complete yet.
    pub(crate) async fn gssapi_bind(
        &mut self,
        dn: &str,
        bind_pw: Option<&[u8]>,
        params: GssapiParams,
        ctrls: Vec<RawControl>,
    ) -> Result<BindResult> {
        let provider = self.gssapi.as_mut().ok_or(LdapError::GssapiUnavailable)?;
        let login = GssapiLogin {
            params: &params,
            server_host: self.settings.host(),
            password: bind_pw,
        };
        let mut negotiator = provider.negotiator(&login)?;
        let mut token = negotiator.initial_token()?;
        loop {
            let req = BindRequest::sasl(dn.as_bytes(), GSSAPI, token.as_deref());
            match self.bind_round(req, ctrls.clone()).await? {
                ResponseClass::InProgress { server_creds, .. } => {
                    let challenge = server_creds.as_deref().unwrap_or_default();
                    token = Some(negotiator.evaluate_challenge(challenge)?);
                }
                ResponseClass::Success {
                    result,
                    server_creds,
                } => {
                    if let Some(creds) = server_creds {
                        if !negotiator.is_complete() {
                            negotiator.evaluate_challenge(&creds)?;
                        }
                    }
                    if !negotiator.is_complete() {
                        return Err(LdapError::GssapiIncomplete);
                    }
                    return Ok(BindResult::from_final(result));
                }
                other => return Err(other.into_error()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::digest::{Charset, DigestMd5Input, NonceSource, digest_md5_rspauth};
    use crate::gssapi::fake::{FakeNegotiator, FakeProvider};
    use crate::ldap::BindSettings;
    use crate::mechanism::SaslProperties;
    use crate::prompt::StaticPassword;
    use crate::protocol::{BindAuth, LdapRequest, RequestOp};
    use crate::result::ErrorKind;
    use crate::transport::MessageIdSequence;
    use crate::transport::mock::{
        ScriptedTransport, bind_ok, bind_resp, disconnect, in_progress,
    };

    const RFC2831_CHALLENGE: &[u8] = b"realm=\"elwood.innosoft.com\",nonce=\"OA6MG9tEQGm2hh\",qop=\"auth\",algorithm=md5-sess,charset=utf-8";

    fn handler(t: ScriptedTransport) -> BindHandler<ScriptedTransport> {
        BindHandler::with_settings(
            BindSettings::new().set_host("elwood.innosoft.com"),
            t,
            MessageIdSequence::new(),
        )
    }

    fn props(pairs: &[(&str, &str)]) -> SaslProperties {
        pairs.iter().copied().collect()
    }

    fn sasl_creds(req: &LdapRequest) -> (&str, Option<&[u8]>) {
        match &req.op {
            RequestOp::Bind(bind) => match &bind.auth {
                BindAuth::Sasl {
                    mechanism,
                    credentials,
                } => (mechanism.as_str(), credentials.as_deref()),
                auth => panic!("not a SASL bind: {:?}", auth),
            },
            op => panic!("unexpected request {:?}", op),
        }
    }

    fn control() -> RawControl {
        RawControl::new("2.16.840.1.113730.3.4.16")
    }

    #[tokio::test]
    async fn anonymous_with_and_without_trace() {
        let mut h = handler(
            ScriptedTransport::new()
                .reply(bind_ok(None))
                .reply(bind_ok(None)),
        );
        h.sasl_bind("", None, "anonymous", &props(&[("trace", "nightly job")]))
            .await
            .expect("bind");
        h.sasl_bind("", None, "ANONYMOUS", &SaslProperties::new())
            .await
            .expect("bind");
        let t = h.into_inner();
        assert_eq!(sasl_creds(&t.sent[0]), ("ANONYMOUS", Some(&b"nightly job"[..])));
        assert_eq!(sasl_creds(&t.sent[1]), ("ANONYMOUS", None));
    }

    #[tokio::test]
    async fn external_sends_no_credentials_and_returns_controls() {
        let mut h = handler(
            ScriptedTransport::new().reply_with_ctrls(bind_resp(0, "welcome", None), vec![control()]),
        );
        h.with_controls(RawControl::new("2.16.840.1.113730.3.4.16"));
        let res = h
            .sasl_bind("", None, "EXTERNAL", &SaslProperties::new())
            .await
            .expect("bind");
        assert_eq!(res.message.as_deref(), Some("welcome"));
        assert_eq!(res.ctrls, vec![control()]);
        let t = h.into_inner();
        assert_eq!(sasl_creds(&t.sent[0]), ("EXTERNAL", None));
        assert_eq!(t.sent[0].ctrls, vec![control()]);
    }

    #[tokio::test]
    async fn plain_payload() {
        let mut h = handler(
            ScriptedTransport::new()
                .reply(bind_ok(None))
                .reply(bind_ok(None)),
        );
        h.sasl_bind(
            "",
            Some(&b"pw"[..]),
            "PLAIN",
            &props(&[("authid", "u:jdoe"), ("authzid", "dn:uid=admin")]),
        )
        .await
        .expect("bind");
        h.sasl_bind("", Some(&b"pw"[..]), "PLAIN", &props(&[("authid", "u:jdoe")]))
            .await
            .expect("bind");
        let t = h.into_inner();
        assert_eq!(
            sasl_creds(&t.sent[0]).1,
            Some(&b"dn:uid=admin\0u:jdoe\0pw"[..])
        );
        assert_eq!(sasl_creds(&t.sent[1]).1, Some(&b"\0u:jdoe\0pw"[..]));
    }

    #[tokio::test]
    async fn plain_prompts_for_authid() {
        let asked = Arc::new(Mutex::new(Vec::new()));
        let seen = asked.clone();
        let mut h = handler(ScriptedTransport::new().reply(bind_ok(None))).with_credential_source(
            move |identity: &str| -> Result<Option<crate::prompt::Password>> {
                seen.lock().expect("asked").push(identity.to_owned());
                Ok(Some(Zeroizing::new(b"typed".to_vec())))
            },
        );
        h.sasl_bind("", None, "PLAIN", &props(&[("authid", "jdoe")]))
            .await
            .expect("bind");
        assert_eq!(*asked.lock().expect("asked"), vec![String::from("jdoe")]);
        assert_eq!(
            sasl_creds(&h.into_inner().sent[0]).1,
            Some(&b"\0jdoe\0typed"[..])
        );
    }

    #[tokio::test]
    async fn plain_failure() {
        let mut h = handler(ScriptedTransport::new().reply(bind_resp(49, "", None)));
        let err = h
            .sasl_bind("", Some(&b"pw"[..]), "PLAIN", &props(&[("authid", "jdoe")]))
            .await
            .unwrap_err();
        assert_eq!(err.result_code(), Some(49));
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn cram_md5_exchange() {
        let mut h = handler(
            ScriptedTransport::new()
                .reply(in_progress(Some(&b"<1896.697170952@postoffice.reston.mci.net>"[..])))
                .reply(bind_ok(None)),
        )
        .with_credential_source(StaticPassword::new("tanstaaftanstaaf"));
        h.with_controls(control());
        h.sasl_bind("", None, "cram-md5", &props(&[("authid", "tim")]))
            .await
            .expect("bind");
        assert_eq!(h.last_id(), 2);
        let t = h.into_inner();
        assert_eq!(sasl_creds(&t.sent[0]), ("CRAM-MD5", None));
        assert!(t.sent[0].ctrls.is_empty());
        assert_eq!(
            sasl_creds(&t.sent[1]),
            ("CRAM-MD5", Some(&b"tim b913a602c7eda7a495b4e6e7334d3890"[..]))
        );
        assert_eq!(t.sent[1].ctrls, vec![control()]);
    }

    #[tokio::test]
    async fn cram_md5_first_round_errors() {
        let props = props(&[("authid", "tim")]);
        let pw = Some(&b"tanstaaftanstaaf"[..]);

        let mut h = handler(ScriptedTransport::new().reply(in_progress(None)));
        let err = h.sasl_bind("", pw, "CRAM-MD5", &props).await.unwrap_err();
        assert!(matches!(err, LdapError::MissingServerCredentials { .. }));
        assert_eq!(err.kind(), ErrorKind::Protocol);

        let mut h = handler(ScriptedTransport::new().reply(bind_ok(None)));
        let err = h.sasl_bind("", pw, "CRAM-MD5", &props).await.unwrap_err();
        assert_eq!(err.result_code(), Some(0));

        let mut h = handler(
            ScriptedTransport::new()
                .reply(bind_resp(48, "inappropriate authentication", None))
                .reply(bind_ok(None)),
        );
        let err = h.sasl_bind("", pw, "CRAM-MD5", &props).await.unwrap_err();
        assert_eq!(err.result_code(), Some(48));
        let t = h.into_inner();
        assert_eq!(t.sent.len(), 1);
        assert_eq!(t.pending(), 1);
    }

    #[tokio::test]
    async fn disconnect_at_first_round_stops() {
        let mut h = handler(
            ScriptedTransport::new()
                .reply(disconnect(51, "server busy"))
                .reply(bind_ok(None)),
        );
        let err = h
            .sasl_bind("", Some(&b"pw"[..]), "DIGEST-MD5", &props(&[("authid", "chris")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LdapError::Disconnect { rc: 51, .. }));
        assert_eq!(h.into_inner().sent.len(), 1);
    }

    #[tokio::test]
    async fn disconnect_at_second_round_stops() {
        let challenges: [(&str, &[u8]); 2] = [
            ("CRAM-MD5", b"<1896.697170952@postoffice.reston.mci.net>"),
            ("DIGEST-MD5", RFC2831_CHALLENGE),
        ];
        for (mech, challenge) in challenges {
            let mut h = handler(
                ScriptedTransport::new()
                    .reply(in_progress(Some(challenge)))
                    .reply(disconnect(52, "bye"))
                    .reply(bind_ok(None)),
            );
            let err = h
                .sasl_bind("", Some(&b"secret"[..]), mech, &props(&[("authid", "chris")]))
                .await
                .unwrap_err();
            match err {
                LdapError::Disconnect { rc, ref text } => {
                    assert_eq!(rc, 52, "{}", mech);
                    assert_eq!(text, "bye", "{}", mech);
                }
                e => panic!("{}: expected a disconnect, got {:?}", mech, e),
            }
            let t = h.into_inner();
            assert_eq!(t.sent.len(), 2, "{}", mech);
            assert_eq!(t.pending(), 1, "{}", mech);
        }
    }

    fn rfc2831_input<'a>(cnonce: &'a str, realm: Option<&'a str>) -> DigestMd5Input<'a> {
        DigestMd5Input {
            authid: "chris",
            authzid: None,
            password: b"secret",
            realm,
            nonce: "OA6MG9tEQGm2hh",
            cnonce,
            nonce_count: "00000001",
            digest_uri: "ldap/elwood.innosoft.com",
            qop: "auth",
            charset: Charset::Utf8,
        }
    }

    #[tokio::test]
    async fn digest_md5_exchange() {
        let cnonce = NonceSource::seeded(2831).generate_cnonce();
        let input = rfc2831_input(&cnonce, Some("elwood.innosoft.com"));
        let rspauth = format!("rspauth={}", hex::encode(digest_md5_rspauth(&input)));
        let mut h = handler(
            ScriptedTransport::new()
                .reply(in_progress(Some(RFC2831_CHALLENGE)))
                .reply(bind_ok(Some(rspauth.as_bytes()))),
        );
        h.nonces = NonceSource::seeded(2831);
        h.with_controls(control());
        let res = h
            .sasl_bind("", Some(&b"secret"[..]), "DIGEST-MD5", &props(&[("authid", "chris")]))
            .await
            .expect("bind");
        assert_eq!(res.message, None);
        let t = h.into_inner();
        assert_eq!(sasl_creds(&t.sent[0]), ("DIGEST-MD5", None));
        assert!(t.sent[0].ctrls.is_empty());
        let expected = response_credentials(&input, &digest_md5_response(&input));
        assert_eq!(
            sasl_creds(&t.sent[1]),
            ("DIGEST-MD5", Some(expected.as_bytes()))
        );
        assert_eq!(t.sent[1].ctrls, vec![control()]);
    }

    #[tokio::test]
    async fn digest_md5_rspauth_mismatch() {
        let mut h = handler(
            ScriptedTransport::new()
                .reply(in_progress(Some(RFC2831_CHALLENGE)))
                .reply(bind_ok(Some(&b"rspauth=ea40f60335c427b5527b84dbabcdfffd"[..]))),
        );
        let err = h
            .sasl_bind("", Some(&b"secret"[..]), "DIGEST-MD5", &props(&[("authid", "chris")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LdapError::RspAuthMismatch));
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn digest_md5_success_without_rspauth() {
        let mut h = handler(
            ScriptedTransport::new()
                .reply(in_progress(Some(RFC2831_CHALLENGE)))
                .reply(bind_ok(None)),
        );
        let err = h
            .sasl_bind("", Some(&b"secret"[..]), "DIGEST-MD5", &props(&[("authid", "chris")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LdapError::MissingServerCredentials { .. }));
    }

    #[tokio::test]
    async fn digest_md5_multiple_realms_omit_realm() {
        let cnonce = NonceSource::seeded(1).generate_cnonce();
        let input = rfc2831_input(&cnonce, None);
        let rspauth = format!("rspauth={}", hex::encode(digest_md5_rspauth(&input)));
        let mut h = handler(
            ScriptedTransport::new()
                .reply(in_progress(Some(
                    &b"realm=\"one\",realm=\"two\",nonce=\"OA6MG9tEQGm2hh\",qop=\"auth\",charset=utf-8"[..],
                )))
                .reply(bind_ok(Some(rspauth.as_bytes()))),
        );
        h.nonces = NonceSource::seeded(1);
        h.sasl_bind("", Some(&b"secret"[..]), "DIGEST-MD5", &props(&[("authid", "chris")]))
            .await
            .expect("bind");
        let t = h.into_inner();
        let creds = std::str::from_utf8(sasl_creds(&t.sent[1]).1.expect("creds")).expect("utf-8");
        assert!(!creds.contains("realm="));
    }

    #[tokio::test]
    async fn digest_md5_challenge_errors_send_nothing_more() {
        let cases: [(&[u8], fn(&LdapError) -> bool); 4] = [
            (b"nonce=\"n\",qop=\"auth-int\"", |e| {
                matches!(e, LdapError::RequestedQopNotSupported { .. })
            }),
            (b"realm=\"r\",qop=\"auth\"", |e| {
                matches!(e, LdapError::MissingServerNonce)
            }),
            (b"nonce=\"n\",charset=us-ascii", |e| {
                matches!(e, LdapError::UnsupportedCharset(_))
            }),
            (b"nonce=\"n\"x", |e| {
                matches!(e, LdapError::MalformedServerCredentials { .. })
            }),
        ];
        for (challenge, is_expected) in cases {
            let mut h = handler(
                ScriptedTransport::new()
                    .reply(in_progress(Some(challenge)))
                    .reply(bind_ok(None)),
            );
            let err = h
                .sasl_bind("", Some(&b"pw"[..]), "DIGEST-MD5", &props(&[("authid", "chris")]))
                .await
                .unwrap_err();
            assert!(is_expected(&err), "unexpected error {:?}", err);
            assert_eq!(h.into_inner().sent.len(), 1);
        }
    }

    fn gssapi_handler(
        t: ScriptedTransport,
        negotiator: Option<FakeNegotiator>,
    ) -> (
        BindHandler<ScriptedTransport>,
        Arc<Mutex<Vec<(String, String, String)>>>,
    ) {
        let logins = Arc::new(Mutex::new(Vec::new()));
        let provider = FakeProvider {
            negotiator,
            logins: logins.clone(),
        };
        (handler(t).with_gssapi_provider(provider), logins)
    }

    fn negotiator(complete_after: usize) -> (FakeNegotiator, Arc<Mutex<Vec<Vec<u8>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let n = FakeNegotiator {
            initial: Some(b"t0".to_vec()),
            responses: VecDeque::from(vec![b"t1".to_vec(), b"t2".to_vec()]),
            complete_after,
            seen: seen.clone(),
        };
        (n, seen)
    }

    #[tokio::test]
    async fn gssapi_multi_round() {
        let (n, seen) = negotiator(2);
        let (mut h, logins) = gssapi_handler(
            ScriptedTransport::new()
                .reply(in_progress(Some(&b"c1"[..])))
                .reply(in_progress(Some(&b"c2"[..])))
                .reply(bind_ok(None)),
            Some(n),
        );
        h.with_controls(control());
        h.sasl_bind("", None, "GSSAPI", &props(&[("authid", "jdoe@EXAMPLE.ORG")]))
            .await
            .expect("bind");
        assert_eq!(*seen.lock().expect("seen"), vec![b"c1".to_vec(), b"c2".to_vec()]);
        assert_eq!(
            *logins.lock().expect("logins"),
            vec![(
                String::from("jdoe@EXAMPLE.ORG"),
                String::from("jdoe@EXAMPLE.ORG"),
                String::from("elwood.innosoft.com")
            )]
        );
        let t = h.into_inner();
        let tokens: Vec<_> = t.sent.iter().map(|r| sasl_creds(r).1).collect();
        assert_eq!(
            tokens,
            vec![Some(&b"t0"[..]), Some(&b"t1"[..]), Some(&b"t2"[..])]
        );
        assert!(t.sent.iter().all(|r| r.ctrls == vec![control()]));
    }

    #[tokio::test]
    async fn gssapi_final_token_on_success() {
        let (n, seen) = negotiator(2);
        let (mut h, _) = gssapi_handler(
            ScriptedTransport::new()
                .reply(in_progress(Some(&b"c1"[..])))
                .reply(bind_ok(Some(&b"c2"[..]))),
            Some(n),
        );
        h.sasl_bind("", None, "GSSAPI", &props(&[("authid", "jdoe"), ("authzid", "u:admin")]))
            .await
            .expect("bind");
        assert_eq!(seen.lock().expect("seen").len(), 2);
        assert_eq!(h.into_inner().sent.len(), 2);
    }

    #[tokio::test]
    async fn gssapi_incomplete_on_success() {
        let (n, _) = negotiator(5);
        let (mut h, _) = gssapi_handler(
            ScriptedTransport::new()
                .reply(in_progress(Some(&b"c1"[..])))
                .reply(bind_ok(None)),
            Some(n),
        );
        let err = h
            .sasl_bind("", None, "GSSAPI", &props(&[("authid", "jdoe")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LdapError::GssapiIncomplete));
    }

    #[tokio::test]
    async fn gssapi_server_failure() {
        let (n, _) = negotiator(2);
        let (mut h, _) = gssapi_handler(
            ScriptedTransport::new()
                .reply(in_progress(Some(&b"c1"[..])))
                .reply(bind_resp(49, "bad ticket", None)),
            Some(n),
        );
        let err = h
            .sasl_bind("", None, "GSSAPI", &props(&[("authid", "jdoe")]))
            .await
            .unwrap_err();
        assert_eq!(err.result_code(), Some(49));
    }

    #[tokio::test]
    async fn gssapi_disconnect_mid_negotiation() {
        let (n, seen) = negotiator(3);
        let (mut h, _) = gssapi_handler(
            ScriptedTransport::new()
                .reply(in_progress(Some(&b"c1"[..])))
                .reply(disconnect(52, "bye"))
                .reply(bind_ok(None)),
            Some(n),
        );
        let err = h
            .sasl_bind("", None, "GSSAPI", &props(&[("authid", "jdoe")]))
            .await
            .unwrap_err();
        match err {
            LdapError::Disconnect { rc, ref text } => {
                assert_eq!(rc, 52);
                assert_eq!(text, "bye");
            }
            e => panic!("expected a disconnect, got {:?}", e),
        }
        assert_eq!(seen.lock().expect("seen").len(), 1);
        let t = h.into_inner();
        assert_eq!(t.sent.len(), 2);
        assert_eq!(t.pending(), 1);
    }

    #[tokio::test]
    async fn gssapi_without_provider_or_ticket() {
        let mut h = handler(ScriptedTransport::new().reply(bind_ok(None)));
        h.gssapi = None;
        let err = h
            .sasl_bind("", None, "GSSAPI", &props(&[("authid", "jdoe")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LdapError::GssapiUnavailable));
        assert!(h.into_inner().sent.is_empty());

        let (mut h, _) = gssapi_handler(ScriptedTransport::new().reply(bind_ok(None)), None);
        let err = h
            .sasl_bind("", None, "GSSAPI", &props(&[("authid", "jdoe")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LdapError::GssapiOperationError(_)));
        assert!(h.into_inner().sent.is_empty());
    }
}
