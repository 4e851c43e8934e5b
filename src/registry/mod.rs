//! Node registry
//!
//! The registry holds one entry per declared topic. Entries are created
//! once, when the topic is declared, and live for the rest of the process.
//!
//! # Architecture
//!
//! ```text
//!                              NodeState
//!              ┌──────────────────────────────────────────┐
//!              │ subscriptions: topic ─► SubscriptionEntry │
//!              │   known_publishers, connector, stats      │
//!              │ publications:  topic ─► PublicationEntry  │
//!              │   subscribers, port, cleanup, stats       │
//!              └─────────────────────┬────────────────────┘
//!                                    │ publisher update
//!                                    ▼
//!   publisher ──TCP──► receiver worker ──► mpsc (bounded) ──► TopicStream
//!   publisher ──TCP──► receiver worker ──┘
//! ```
//!
//! The shared sets and statistics maps are the only state mutated after
//! declarations finish; each update to them is a single locked step.

pub mod connection;
pub mod entry;
pub mod error;
pub mod peers;
pub mod store;

pub use connection::PendingConnection;
pub use entry::{PublicationEntry, SubscriptionEntry};
pub use error::RegistryError;
pub use peers::PeerSet;
pub use store::{NodeBuilder, NodeState};
