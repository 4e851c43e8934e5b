//! Node-side runtime for a topic-based publish/subscribe middleware
//!
//! A node declares input topics (subscriptions) and output topics
//! (publications), then hands its registry to a discovery layer which
//! notifies it of remote publishers for the duration of the process.
//!
//! ```text
//!   NodeBuilder ──subscribe/advertise──► NodeState ──run_node──► Arc<Node>
//!                                                                   │
//!                          Discovery::run ◄─────────────────────────┘
//!                           │  publisher_update / publication_port / shutdown
//!                           ▼
//!              receiver workers ──► bounded queue ──► TopicStream<M>
//! ```
//!
//! # Example
//! ```no_run
//! use rosnode_rs::{NodeBuilder, NodeConfig, TcpTransport, TopicStream};
//!
//! # async fn example() -> rosnode_rs::error::Result<()> {
//! let mut builder = NodeBuilder::new(NodeConfig::new("/talker"), TcpTransport::default());
//! let mut chatter = builder.subscribe::<String>("/chatter")?;
//! builder
//!     .advertise("/counter", TopicStream::from_iter(0i32..))
//!     .await?;
//!
//! tokio::spawn(async move {
//!     while let Some(msg) = chatter.next().await {
//!         println!("heard: {}", msg);
//!     }
//! });
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod message;
pub mod node;
pub mod registry;
pub mod stats;
pub mod stream;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use message::Message;
pub use node::{run_node, Discovery, Node, NodeConfig, NodePhase, TopicInfo};
pub use registry::{NodeBuilder, NodeState, RegistryError};
pub use stats::{PeerStats, StatsMap};
pub use stream::TopicStream;
pub use transport::{
    ServeContext, ServeHandle, TcpTransport, TopicDescriptor, Transport, TransportConfig,
};
