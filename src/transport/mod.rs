//! Transport collaborator
//!
//! The registry never touches sockets. It asks a [`Transport`] to open a
//! stream of raw frames from a remote publisher, and to serve a stream of
//! encoded frames to whoever subscribes to a local publication.
//!
//! [`TcpTransport`] is the bundled implementation: length-prefixed frames
//! over TCP with a key/value connection header.

pub mod config;
pub mod frame;
pub mod tcp;

use std::future::Future;

use bytes::Bytes;

use crate::error::Result;
use crate::registry::PeerSet;
use crate::stats::StatsMap;
use crate::stream::TopicStream;

pub use config::TransportConfig;
pub use tcp::TcpTransport;

/// Identity of one side of a topic connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescriptor {
    /// Name of the local node
    pub node: String,
    /// Topic name
    pub topic: String,
    /// Declared message type
    pub type_name: String,
}

impl TopicDescriptor {
    pub fn new(
        node: impl Into<String>,
        topic: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            topic: topic.into(),
            type_name: type_name.into(),
        }
    }
}

/// Everything a transport needs to serve one publication
#[derive(Debug, Clone)]
pub struct ServeContext {
    pub descriptor: TopicDescriptor,
    /// Send statistics, recorded per subscriber address
    pub stats: StatsMap,
    /// Addresses of currently connected subscribers
    pub subscribers: PeerSet,
}

/// A publication being served: its bound port and the action releasing it
pub struct ServeHandle {
    port: u16,
    cleanup: Box<dyn FnOnce() + Send>,
}

impl ServeHandle {
    pub fn new(port: u16, cleanup: impl FnOnce() + Send + 'static) -> Self {
        Self {
            port,
            cleanup: Box::new(cleanup),
        }
    }

    /// Port the publication is served on
    pub fn port(&self) -> u16 {
        self.port
    }

    pub(crate) fn into_parts(self) -> (u16, Box<dyn FnOnce() + Send>) {
        (self.port, self.cleanup)
    }
}

impl std::fmt::Debug for ServeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServeHandle")
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

/// Socket-level transport used by a node
pub trait Transport: Send + Sync + 'static {
    /// Connect to a remote publisher and stream its raw frames
    ///
    /// The stream ends when the connection closes or fails.
    fn open_receive_stream(
        &self,
        address: &str,
        topic: &TopicDescriptor,
    ) -> impl Future<Output = Result<TopicStream<Bytes>>> + Send;

    /// Start serving a publication on an ephemeral port
    fn serve(
        &self,
        ctx: ServeContext,
        frames: TopicStream<Bytes>,
    ) -> impl Future<Output = Result<ServeHandle>> + Send;
}
