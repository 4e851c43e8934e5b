//! Statistics records and the shared per-topic map

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Traffic counters for one remote peer on one topic
#[derive(Debug, Clone)]
pub struct PeerStats {
    /// Messages exchanged with the peer
    pub messages: u64,
    /// Payload bytes exchanged with the peer
    pub bytes: u64,
    /// When the first message was recorded
    pub first_message_at: Instant,
    /// When the most recent message was recorded
    pub last_message_at: Instant,
}

impl PeerStats {
    fn new(now: Instant) -> Self {
        Self {
            messages: 0,
            bytes: 0,
            first_message_at: now,
            last_message_at: now,
        }
    }

    fn record(&mut self, bytes: usize, now: Instant) {
        self.messages += 1;
        self.bytes += bytes as u64;
        self.last_message_at = now;
    }

    /// Time between the first and last recorded message
    pub fn active_for(&self) -> Duration {
        self.last_message_at.duration_since(self.first_message_at)
    }

    /// Bitrate over the active period in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.active_for().as_secs();
        if secs > 0 {
            (self.bytes * 8) / secs
        } else {
            0
        }
    }
}

/// Shared map from peer address to statistics
///
/// Cloning shares the underlying map. Every update and snapshot takes the
/// lock for the whole operation, so a snapshot never observes a half-updated
/// record.
#[derive(Debug, Clone, Default)]
pub struct StatsMap {
    peers: Arc<Mutex<HashMap<String, PeerStats>>>,
}

impl StatsMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message received from `peer`
    pub async fn record_receive(&self, peer: &str, bytes: usize) {
        self.record(peer, bytes).await;
    }

    /// Record a message sent to `peer`
    pub async fn record_send(&self, peer: &str, bytes: usize) {
        self.record(peer, bytes).await;
    }

    async fn record(&self, peer: &str, bytes: usize) {
        let now = Instant::now();
        let mut peers = self.peers.lock().await;
        peers
            .entry(peer.to_string())
            .or_insert_with(|| PeerStats::new(now))
            .record(bytes, now);
    }

    /// Consistent copy of every peer's statistics, ordered by address
    pub async fn snapshot(&self) -> Vec<(String, PeerStats)> {
        let peers = self.peers.lock().await;
        let mut snapshot: Vec<_> = peers
            .iter()
            .map(|(addr, stats)| (addr.clone(), stats.clone()))
            .collect();
        drop(peers);

        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    /// Statistics for a single peer
    pub async fn get(&self, peer: &str) -> Option<PeerStats> {
        self.peers.lock().await.get(peer).cloned()
    }
}
