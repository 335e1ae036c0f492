use crate::RequestId;
use crate::controls_impl::IntoRawControlVec;
use crate::ldap::BindHandler;
use crate::mechanism::SaslProperties;
use crate::result::{BindResult, Result};
use crate::transport::Transport;

use tokio::runtime::{self, Runtime};

/// Synchronous Bind driver.
///
/// [`new()`](#method.new) wraps an asynchronous [`BindHandler`] together with a
/// current-thread runtime. All operations are performed through that struct,
/// synchronously: the calling thread waits until the exchange is finished.
///
/// The API mirrors the asynchronous one. The transport must not depend on a
/// runtime other than the one owned by this struct; a [`ChannelTransport`](crate::ChannelTransport)
/// whose connection task runs elsewhere is fine.
#[cfg_attr(docsrs, doc(cfg(feature = "sync")))]
#[derive(Debug)]
pub struct BindConn<T> {
    rt: Runtime,
    handler: BindHandler<T>,
}

impl<T: Transport> BindConn<T> {
    /// Wrap `handler` for synchronous use.
    pub fn new(handler: BindHandler<T>) -> Result<Self> {
        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(BindConn { rt, handler })
    }

    /// See [`BindHandler::with_controls()`](struct.BindHandler.html#method.with_controls).
    pub fn with_controls<V: IntoRawControlVec>(&mut self, ctrls: V) -> &mut Self {
        self.handler.with_controls(ctrls);
        self
    }

    /// See [`BindHandler::simple_bind()`](struct.BindHandler.html#method.simple_bind).
    pub fn simple_bind(&mut self, bind_dn: &str, bind_pw: Option<&[u8]>) -> Result<BindResult> {
        let rt = &mut self.rt;
        let handler = &mut self.handler;
        rt.block_on(async move { handler.simple_bind(bind_dn, bind_pw).await })
    }

    /// See [`BindHandler::sasl_bind()`](struct.BindHandler.html#method.sasl_bind).
    pub fn sasl_bind(
        &mut self,
        bind_dn: &str,
        bind_pw: Option<&[u8]>,
        mechanism: &str,
        props: &SaslProperties,
    ) -> Result<BindResult> {
        let rt = &mut self.rt;
        let handler = &mut self.handler;
        rt.block_on(async move { handler.sasl_bind(bind_dn, bind_pw, mechanism, props).await })
    }

    /// See [`BindHandler::who_am_i()`](struct.BindHandler.html#method.who_am_i).
    pub fn who_am_i(&mut self) -> Result<Option<String>> {
        let rt = &mut self.rt;
        let handler = &mut self.handler;
        rt.block_on(async move { handler.who_am_i().await })
    }

    /// See [`BindHandler::last_id()`](struct.BindHandler.html#method.last_id).
    pub fn last_id(&self) -> RequestId {
        self.handler.last_id()
    }

    /// Release the asynchronous handler.
    pub fn into_inner(self) -> BindHandler<T> {
        self.handler
    }
}
