//! Subscription and publication entries
//!
//! This module defines the per-topic state stored in the registry.

use tokio::sync::Mutex;

use crate::stats::StatsMap;

use super::connection::{connect_to_publisher, Connector, PendingConnection};
use super::peers::PeerSet;

/// Entry for one declared input topic
pub struct SubscriptionEntry {
    /// Publishers already connected to (only ever grows)
    known_publishers: PeerSet,

    /// Starts a receiver worker feeding this subscription's queue
    connector: Connector,

    /// Declared message type
    type_name: String,

    /// Receive statistics per publisher
    stats: StatsMap,
}

impl SubscriptionEntry {
    pub(super) fn new(type_name: impl Into<String>, connector: Connector, stats: StatsMap) -> Self {
        Self {
            known_publishers: PeerSet::new(),
            connector,
            type_name: type_name.into(),
            stats,
        }
    }

    /// Declared message type
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Receive statistics
    pub fn stats(&self) -> &StatsMap {
        &self.stats
    }

    /// Publishers this subscription has connected to
    pub fn known_publishers(&self) -> &PeerSet {
        &self.known_publishers
    }

    /// Fold the dedup check over `addresses` in one atomic step
    ///
    /// Returns the connections for addresses not seen before. They are not
    /// started here so the caller can start them after the set is released.
    pub async fn connect_publishers<I, S>(&self, addresses: I) -> Vec<PendingConnection>
    where
        I: IntoIterator<Item = S> + Send,
        S: AsRef<str>,
    {
        let connector = &self.connector;
        self.known_publishers
            .update(|known| {
                addresses
                    .into_iter()
                    .filter_map(|address| connect_to_publisher(known, connector, address.as_ref()))
                    .collect()
            })
            .await
    }
}

/// Entry for one declared output topic
pub struct PublicationEntry {
    /// Subscribers currently connected (maintained by the transport)
    subscribers: PeerSet,

    /// Declared message type
    type_name: String,

    /// Port the topic is served on
    port: u16,

    /// Releases the serving resources; taken on first use
    cleanup: Mutex<Option<Box<dyn FnOnce() + Send>>>,

    /// Send statistics per subscriber
    stats: StatsMap,
}

impl PublicationEntry {
    pub(super) fn new(
        type_name: impl Into<String>,
        port: u16,
        cleanup: Box<dyn FnOnce() + Send>,
        stats: StatsMap,
        subscribers: PeerSet,
    ) -> Self {
        Self {
            subscribers,
            type_name: type_name.into(),
            port,
            cleanup: Mutex::new(Some(cleanup)),
            stats,
        }
    }

    /// Declared message type
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Serving port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Send statistics
    pub fn stats(&self) -> &StatsMap {
        &self.stats
    }

    /// Connected subscribers
    pub fn subscribers(&self) -> &PeerSet {
        &self.subscribers
    }

    /// Run the cleanup action if it has not run yet
    ///
    /// Returns whether this call ran it.
    pub async fn release(&self) -> bool {
        let cleanup = self.cleanup.lock().await.take();
        match cleanup {
            Some(cleanup) => {
                cleanup();
                true
            }
            None => false,
        }
    }
}
