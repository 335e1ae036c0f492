use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::RequestId;
use crate::protocol::{LdapRequest, LdapResponse};

use thiserror::Error;
use tokio::sync::mpsc;

/// Failure reported by a [`Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The message couldn't be written, or the connection failed while reading.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// A response arrived but couldn't be decoded.
    #[error("decoding error: {0}")]
    Decode(String),
}

/// Message exchange underlying a Bind.
///
/// A transport moves one typed request to the server and hands back the responses
/// in arrival order. It owns the wire encoding and whatever stream sits beneath it;
/// the bind engine only borrows it and never closes it. Each round of a bind sends
/// exactly one request and then reads exactly one response, so an implementation
/// needn't support pipelining.
pub trait Transport {
    /// Send a request.
    fn send(&mut self, req: LdapRequest) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receive the next response, or `None` if the server closed the connection.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<LdapResponse>, TransportError>> + Send;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, req: LdapRequest) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).send(req)
    }

    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<LdapResponse>, TransportError>> + Send {
        (**self).recv()
    }
}

/// Message id allocator shared by all operations on a connection.
///
/// Clones share the same counter. Allocation is lock-free, so other tasks may draw
/// ids for their own operations while a Bind is in progress. Ids start at 1 and
/// increase by one; after `i32::MAX` the sequence wraps around to 1, since message
/// ids must be positive.
#[derive(Clone, Debug, Default)]
pub struct MessageIdSequence(Arc<AtomicI32>);

impl MessageIdSequence {
    /// Create a fresh sequence. The first allocated id will be 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sequence continuing after `last`, for connections which have
    /// already issued requests.
    pub fn starting_after(last: RequestId) -> Self {
        MessageIdSequence(Arc::new(AtomicI32::new(last.max(0))))
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> RequestId {
        fn succ(id: i32) -> i32 {
            if id == i32::MAX { 1 } else { id + 1 }
        }

        match self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |id| Some(succ(id)))
        {
            Ok(prev) | Err(prev) => succ(prev),
        }
    }

    /// The most recently allocated id, or 0 if none was allocated.
    pub fn last_id(&self) -> RequestId {
        self.0.load(Ordering::Acquire)
    }
}

type ResponseResult = Result<LdapResponse, TransportError>;

/// Channel-backed transport.
///
/// Connects a [`BindHandler`](crate::BindHandler) to a connection task which does the
/// actual encoding and socket I/O. The task reads requests from
/// [`ConnectionEnd::requests`] and answers through [`ConnectionEnd::responses`];
/// dropping the response sender signals a closed connection.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<LdapRequest>,
    rx: mpsc::UnboundedReceiver<ResponseResult>,
}

/// Connection task side of a [`ChannelTransport`].
#[derive(Debug)]
pub struct ConnectionEnd {
    /// Requests sent by the bind engine.
    pub requests: mpsc::UnboundedReceiver<LdapRequest>,
    /// Responses (or transport failures) to hand back to the engine.
    pub responses: mpsc::UnboundedSender<ResponseResult>,
}

/// Create a connected [`ChannelTransport`] and [`ConnectionEnd`] pair.
pub fn channel_transport() -> (ChannelTransport, ConnectionEnd) {
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (resp_tx, resp_rx) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            tx: req_tx,
            rx: resp_rx,
        },
        ConnectionEnd {
            requests: req_rx,
            responses: resp_tx,
        },
    )
}

impl Transport for ChannelTransport {
    fn send(&mut self, req: LdapRequest) -> impl Future<Output = Result<(), TransportError>> + Send {
        let res = self.tx.send(req).map_err(|_| TransportError::Io {
            source: io::Error::new(io::ErrorKind::BrokenPipe, "connection task has exited"),
        });
        std::future::ready(res)
    }

    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<LdapResponse>, TransportError>> + Send {
        async move { self.rx.recv().await.transpose() }
    }
}
