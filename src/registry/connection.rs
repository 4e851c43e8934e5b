//! Publisher connection management
//!
//! Each subscription connects to every distinct publisher address it is told
//! about exactly once. A connection is a receiver worker task that pulls
//! frames from the transport, decodes them, records receive statistics and
//! pushes the messages into the subscription's bounded queue. A full queue
//! suspends the worker, which in turn stops reading from the socket.
//!
//! Workers are never restarted: when the transport stream ends or a frame
//! fails to decode, the worker stops and its address stays known.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::message::Message;
use crate::stats::StatsMap;
use crate::transport::{TopicDescriptor, Transport};

/// Starts a receiver worker for one publisher address
pub(crate) type Connector = Arc<dyn Fn(String) -> JoinHandle<()> + Send + Sync>;

/// A connection accepted by the dedup check but not started yet
pub struct PendingConnection {
    address: String,
    connector: Connector,
}

impl PendingConnection {
    /// Publisher address this connection targets
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Spawn the receiver worker
    pub fn start(self) -> JoinHandle<()> {
        (self.connector)(self.address)
    }
}

impl std::fmt::Debug for PendingConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingConnection")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Check-and-insert `address` into the known publisher set
///
/// Takes the set by mutable reference so it can only run while the set is
/// locked; returns the connection to start if the address was new.
pub(crate) fn connect_to_publisher(
    known: &mut HashSet<String>,
    connector: &Connector,
    address: &str,
) -> Option<PendingConnection> {
    if known.insert(address.to_string()) {
        Some(PendingConnection {
            address: address.to_string(),
            connector: Arc::clone(connector),
        })
    } else {
        None
    }
}

/// Spawn a worker feeding `queue` from the publisher at `address`
pub(crate) fn spawn_receiver<M, T>(
    transport: Arc<T>,
    descriptor: TopicDescriptor,
    stats: StatsMap,
    queue: mpsc::Sender<M>,
    address: String,
) -> JoinHandle<()>
where
    M: Message,
    T: Transport,
{
    tokio::spawn(async move {
        let topic = descriptor.topic.as_str();

        let mut frames = match transport.open_receive_stream(&address, &descriptor).await {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!(
                    topic = %topic,
                    peer = %address,
                    error = %e,
                    "Failed to connect to publisher"
                );
                return;
            }
        };

        tracing::info!(topic = %topic, peer = %address, "Receiving from publisher");

        while let Some(frame) = frames.next().await {
            let size = frame.len();
            let message = match M::decode(frame) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(
                        topic = %topic,
                        peer = %address,
                        error = %e,
                        "Undecodable message, dropping publisher"
                    );
                    break;
                }
            };

            stats.record_receive(&address, size).await;

            // Suspends while the queue is full
            if queue.send(message).await.is_err() {
                tracing::debug!(topic = %topic, "Subscription stream dropped");
                break;
            }
        }

        tracing::debug!(topic = %topic, peer = %address, "Receiver worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::testing::MockTransport;

    fn counting_connector(count: Arc<AtomicUsize>) -> Connector {
        Arc::new(move |_address| {
            count.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async {})
        })
    }

    #[tokio::test]
    async fn test_connect_once_per_address() {
        let count = Arc::new(AtomicUsize::new(0));
        let connector = counting_connector(Arc::clone(&count));
        let mut known = HashSet::new();

        let first = connect_to_publisher(&mut known, &connector, "p1:1");
        let second = connect_to_publisher(&mut known, &connector, "p1:1");

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(known.len(), 1);

        // Nothing connects until the pending connection is started
        assert_eq!(count.load(Ordering::SeqCst), 0);
        first.unwrap().start().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_receiver_decodes_and_records() {
        let transport = Arc::new(MockTransport::with_frames(|| {
            crate::stream::TopicStream::from_iter((1..=3).map(|i: i32| i.encode()))
        }));
        let stats = StatsMap::new();
        let (tx, mut rx) = mpsc::channel(10);

        let worker = spawn_receiver::<i32, _>(
            Arc::clone(&transport),
            TopicDescriptor::new("/n", "/nums", i32::type_name()),
            stats.clone(),
            tx,
            "p1:1".to_string(),
        );
        worker.await.unwrap();

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));

        let peer = stats.get("p1:1").await.unwrap();
        assert_eq!(peer.messages, 3);
        assert_eq!(peer.bytes, 12);
        assert_eq!(transport.opened(), vec!["p1:1"]);
    }

    #[tokio::test]
    async fn test_receiver_stops_on_decode_error() {
        let transport = Arc::new(MockTransport::with_frames(|| {
            crate::stream::TopicStream::from_iter(vec![
                5i32.encode(),
                bytes::Bytes::from_static(&[0x01]),
                6i32.encode(),
            ])
        }));
        let stats = StatsMap::new();
        let (tx, mut rx) = mpsc::channel(10);

        spawn_receiver::<i32, _>(
            transport,
            TopicDescriptor::new("/n", "/nums", i32::type_name()),
            stats.clone(),
            tx,
            "p1:1".to_string(),
        )
        .await
        .unwrap();

        assert_eq!(rx.recv().await, Some(5));
        assert_eq!(rx.recv().await, None);
        assert_eq!(stats.get("p1:1").await.unwrap().messages, 1);
    }

    #[tokio::test]
    async fn test_receiver_stops_when_connect_fails() {
        let transport = Arc::new(MockTransport::failing());
        let stats = StatsMap::new();
        let (tx, mut rx) = mpsc::channel::<i32>(10);

        spawn_receiver(
            transport,
            TopicDescriptor::new("/n", "/nums", i32::type_name()),
            stats.clone(),
            tx,
            "p1:1".to_string(),
        )
        .await
        .unwrap();

        assert_eq!(rx.recv().await, None);
        assert!(stats.snapshot().await.is_empty());
    }
}
