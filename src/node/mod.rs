//! Running node and its discovery-facing surface
//!
//! After declarations, the registry is wrapped in a [`Node`] and handed to
//! a [`Discovery`] implementation, which drives it for the rest of the
//! process lifetime.

pub mod adapter;
pub mod config;
pub mod runner;
pub mod state;

pub use adapter::{Node, TopicInfo};
pub use config::NodeConfig;
pub use runner::{run_node, Discovery};
pub use state::NodePhase;
