//! Per-peer traffic statistics
//!
//! Each subscription keeps receive statistics and each publication keeps
//! send statistics, keyed by remote peer address.

pub mod metrics;

pub use metrics::{PeerStats, StatsMap};
