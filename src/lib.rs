//! LDAP Bind negotiation, simple and SASL, using the Tokio stack.
//!
//! ## Usage
//!
//! In `Cargo.toml`:
//!
//! ```toml
//! [dependencies.ldapbind]
//! version = "0.1.0"
//! ```
//!
//! ## Summary
//!
//! The library runs the client side of the LDAP Bind operation: a simple Bind, or a
//! SASL Bind with one of the ANONYMOUS, CRAM-MD5, DIGEST-MD5, EXTERNAL, GSSAPI and PLAIN
//! mechanisms. It doesn't open connections or encode messages; it exchanges typed
//! requests and responses with a [`Transport`] supplied by the caller, and draws
//! message ids from a [`MessageIdSequence`] shared with the other operations on the
//! same connection.
//!
//! [`BindHandler`] is the asynchronous driver, and [`BindConn`] its synchronous
//! wrapper. In the [struct list](#structs), async-related structs have an asterisk
//! (__*__) after the short description.
//!
//! Mechanism parameters are given as a [`SaslProperties`] bag, validated against the
//! mechanism's rules before anything is sent. [`supported_mechanisms()`] and
//! [`sasl_properties()`] describe the mechanisms and the properties they accept.
//! Passwords which aren't passed to the Bind call can be supplied by a
//! [`CredentialSource`](prompt::CredentialSource).
//!
//! ## Compile-time features
//!
//! * __sync__ (enabled by default): Synchronous API support.
//!
//! * __gssapi__ (disabled by default): Kerberos/GSSAPI support through `cross-krb5`. The
//!   feature needs the Kerberos development libraries, and Clang for `bindgen`. Without
//!   it, the GSSAPI mechanism works only with a provider injected by
//!   [`BindHandler::with_gssapi_provider()`].
//!
//! ## Examples
//!
//! ### Asynchronous DIGEST-MD5 Bind
//!
//! ```rust,no_run
//! use ldapbind::{BindHandler, BindSettings, MessageIdSequence, SaslProperties, channel_transport};
//! use ldapbind::result::Result;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     let (transport, conn_end) = channel_transport();
//!     // `conn_end` goes to the task which owns the socket and the BER codec.
//!     # drop(conn_end);
//!     let settings = BindSettings::new().set_host("ldap.example.org");
//!     let mut handler = BindHandler::with_settings(settings, transport, MessageIdSequence::new());
//!     let mut props = SaslProperties::new();
//!     props.insert("authid", "u:jdoe");
//!     let res = handler
//!         .sasl_bind("", Some(&b"secret"[..]), "DIGEST-MD5", &props)
//!         .await?;
//!     println!("bound: {:?}", res.message);
//!     println!("identity: {:?}", handler.who_am_i().await?);
//!     Ok(())
//! }
//! ```
//!
//! ### Synchronous simple Bind
//!
//! ```rust,no_run
//! use ldapbind::{BindConn, BindHandler, MessageIdSequence, channel_transport};
//! use ldapbind::result::Result;
//!
//! fn main() -> Result<()> {
//!     let (transport, conn_end) = channel_transport();
//!     # drop(conn_end);
//!     let mut conn = BindConn::new(BindHandler::new(transport, MessageIdSequence::new()))?;
//!     conn.simple_bind("cn=Manager,dc=example,dc=org", Some(&b"secret"[..]))?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

#[doc(hidden)]
#[macro_use]
pub extern crate log;
#[doc(hidden)]
pub use tokio;

/// Type alias for the LDAP message ID.
pub type RequestId = i32;

pub mod controls {
    //! Request and response controls.
    //!
    //! Controls are opaque to the Bind engine. A request control is built as a
    //! [`RawControl`](struct.RawControl.html), or converted into one from a
    //! third-party control type, and passed to
    //! [`with_controls()`](../struct.BindHandler.html#method.with_controls).
    //! Response controls of the final Bind response are returned in
    //! [`BindResult`](../result/struct.BindResult.html), or in the
    //! [`LdapResult`](../result/struct.LdapResult.html) of a failed Bind.
    pub use crate::controls_impl::{IntoRawControlVec, RawControl};
}
mod controls_impl;
pub mod digest;
pub mod exop {
    //! Extended operation construction and parsing.
    //!
    //! A generic exop is represented by [`Exop`](struct.Exop.html). The only exop used
    //! here is Who Am I, with the request struct [`WhoAmI`](struct.WhoAmI.html) and the
    //! response struct [`WhoAmIResp`](struct.WhoAmIResp.html).
    pub use crate::exop_impl::{Exop, ExopParser, WHOAMI_OID, WhoAmI, WhoAmIResp};
}
mod exop_impl;
pub mod gssapi;
mod ldap;
pub mod mechanism;
pub mod prompt;
pub mod protocol;
pub mod result;
mod sasl;
#[cfg(feature = "sync")]
mod sync;
mod transport;

pub use ldap::{BindHandler, BindSettings};
pub use mechanism::{Mechanism, SaslProperties, sasl_properties, supported_mechanisms};
pub use result::{BindResult, ErrorKind, LdapError, LdapResult};
#[cfg(feature = "sync")]
pub use sync::BindConn;
pub use transport::{
    ChannelTransport, ConnectionEnd, MessageIdSequence, Transport, TransportError,
    channel_transport,
};
