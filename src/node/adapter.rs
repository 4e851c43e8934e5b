//! Discovery-facing node surface
//!
//! The discovery layer only ever talks to a node through [`Node`]: it reads
//! the topology and statistics, reports newly available publishers, asks
//! for publication ports and finally stops the node.

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::registry::NodeState;
use crate::stats::PeerStats;

use super::state::NodePhase;

/// One declared topic as reported to the discovery layer
#[derive(Debug, Clone)]
pub struct TopicInfo {
    /// Topic name
    pub topic: String,
    /// Declared message type
    pub type_name: String,
    /// Per-peer statistics, ordered by peer address
    pub stats: Vec<(String, PeerStats)>,
}

/// A node whose declarations are final
pub struct Node {
    state: NodeState,
    phase: RwLock<NodePhase>,
}

impl Node {
    /// Wrap a finished registry; the node starts `Idle`
    pub fn new(state: NodeState) -> Self {
        Self {
            state,
            phase: RwLock::new(NodePhase::Idle),
        }
    }

    /// Node name
    pub fn name(&self) -> &str {
        self.state.name()
    }

    /// Discovery service endpoint
    pub fn master_uri(&self) -> &str {
        self.state.master_uri()
    }

    /// Host advertised to peers
    pub fn hostname(&self) -> &str {
        self.state.hostname()
    }

    /// Underlying registry
    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// Current lifecycle phase
    pub async fn phase(&self) -> NodePhase {
        *self.phase.read().await
    }

    /// Move from `Idle` to `Running`
    ///
    /// Returns false if the node was already started or stopped.
    pub async fn start(&self) -> bool {
        let mut phase = self.phase.write().await;
        match phase.start() {
            Some(next) => {
                *phase = next;
                tracing::info!(
                    node = %self.name(),
                    master = %self.master_uri(),
                    subscriptions = self.state.subscriptions().len(),
                    publications = self.state.publications().len(),
                    "Node running"
                );
                true
            }
            None => false,
        }
    }

    /// Snapshot of every subscription, ordered by topic
    pub async fn subscriptions(&self) -> Vec<TopicInfo> {
        let mut infos = Vec::with_capacity(self.state.subscriptions().len());
        for (topic, entry) in self.state.subscriptions() {
            infos.push(TopicInfo {
                topic: topic.clone(),
                type_name: entry.type_name().to_string(),
                stats: entry.stats().snapshot().await,
            });
        }
        infos.sort_by(|a, b| a.topic.cmp(&b.topic));
        infos
    }

    /// Snapshot of every publication, ordered by topic
    pub async fn publications(&self) -> Vec<TopicInfo> {
        let mut infos = Vec::with_capacity(self.state.publications().len());
        for (topic, entry) in self.state.publications() {
            infos.push(TopicInfo {
                topic: topic.clone(),
                type_name: entry.type_name().to_string(),
                stats: entry.stats().snapshot().await,
            });
        }
        infos.sort_by(|a, b| a.topic.cmp(&b.topic));
        infos
    }

    /// Connect `topic` to every publisher in `addresses` not seen before
    ///
    /// The dedup check over the whole list is one atomic step; the new
    /// receiver workers are spawned after it completes. Unknown topics and
    /// stopped nodes are ignored. Returns the handles of the spawned workers.
    ///
    /// The phase stays read-locked until the workers are spawned, so a
    /// concurrent [`shutdown`](Self::shutdown) waits for the update.
    pub async fn publisher_update<I, S>(&self, topic: &str, addresses: I) -> Vec<JoinHandle<()>>
    where
        I: IntoIterator<Item = S> + Send,
        S: AsRef<str>,
    {
        let phase = self.phase.read().await;
        if phase.is_stopped() {
            tracing::warn!(node = %self.name(), topic = %topic, "Publisher update after shutdown");
            return Vec::new();
        }

        let Some(entry) = self.state.subscription(topic) else {
            tracing::debug!(topic = %topic, "Publisher update for unknown topic");
            return Vec::new();
        };

        let pending = entry.connect_publishers(addresses).await;
        if !pending.is_empty() {
            tracing::info!(topic = %topic, new_publishers = pending.len(), "Publisher update");
        }

        let handles = pending.into_iter().map(|conn| conn.start()).collect();
        drop(phase);
        handles
    }

    /// Port a publication is served on
    ///
    /// `None` for topics this node does not publish, and for every topic
    /// once the node has stopped.
    pub async fn publication_port(&self, topic: &str) -> Option<u16> {
        if self.phase().await.is_stopped() {
            return None;
        }
        self.state.publication(topic).map(|entry| entry.port())
    }

    /// Addresses of the subscribers currently connected to a publication
    pub async fn publication_subscribers(&self, topic: &str) -> Option<Vec<String>> {
        match self.state.publication(topic) {
            Some(entry) => Some(entry.subscribers().snapshot().await),
            None => None,
        }
    }

    /// Stop the node, releasing every publication exactly once
    ///
    /// Receiver workers are left to end with their connections.
    pub async fn shutdown(&self) {
        let mut phase = self.phase.write().await;
        let Some(next) = phase.stop() else {
            return;
        };
        *phase = next;

        let mut released = 0;
        for (topic, entry) in self.state.publications() {
            if entry.release().await {
                tracing::debug!(topic = %topic, "Publication released");
                released += 1;
            }
        }

        tracing::info!(node = %self.name(), publications = released, "Node stopped");
    }
}
