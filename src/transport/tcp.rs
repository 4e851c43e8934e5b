//! TCP transport
//!
//! Serving a publication:
//!
//! ```text
//!   TopicStream<Bytes> ──pump──► broadcast::Sender ──┬──► peer task ──► TCP
//!                                                    ├──► peer task ──► TCP
//!   TcpListener ──accept loop── spawns peer tasks ───┘
//! ```
//!
//! The pump realizes one stream element each time a peer task asks for a
//! frame it has not already got, and a peer task only asks while its
//! subscriber has granted credit. Without subscribers nothing is realized,
//! and the publication runs at the pace of its fastest subscriber. Slower
//! subscribers that fall more than `broadcast_capacity` frames behind skip
//! the frames they missed.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, Notify, Semaphore};
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::stats::StatsMap;
use crate::stream::TopicStream;

use super::config::TransportConfig;
use super::frame::{
    encode_header, read_credit, read_frame, read_header, write_credit, write_frame,
};
use super::{ServeContext, ServeHandle, TopicDescriptor, Transport};

/// Accepts any message type in a connection header
const ANY_TYPE: &str = "*";

/// Most credit a subscriber may hold unspent
const MAX_CREDIT: usize = 1 << 20;

/// Length-prefixed framing over TCP
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: TransportConfig,
}

impl TcpTransport {
    /// Create a transport with the given configuration
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Get the transport configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Transport for TcpTransport {
    async fn open_receive_stream(
        &self,
        address: &str,
        topic: &TopicDescriptor,
    ) -> Result<TopicStream<Bytes>> {
        let config = &self.config;
        let mut socket = timeout(config.connect_timeout, TcpStream::connect(address)).await??;
        if config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }

        let request = encode_header(&[
            ("callerid", topic.node.as_str()),
            ("topic", topic.topic.as_str()),
            ("type", topic.type_name.as_str()),
        ]);
        write_frame(&mut socket, &request).await?;

        let response = timeout(
            config.connect_timeout,
            read_header(&mut socket, config.max_frame_size),
        )
        .await??;
        check_response(topic, &response)?;

        tracing::debug!(
            topic = %topic.topic,
            peer = %address,
            publisher = response.get("callerid").map(String::as_str).unwrap_or(""),
            "Connected to publisher"
        );

        let window = config.receive_buffer.max(1);
        let (tx, rx) = mpsc::channel(window);
        let (reader, writer) = socket.into_split();
        tokio::spawn(read_frames(
            reader,
            writer,
            address.to_string(),
            config.max_frame_size,
            u32::try_from(window).unwrap_or(u32::MAX),
            tx,
        ));

        Ok(TopicStream::from_receiver(rx))
    }

    async fn serve(&self, ctx: ServeContext, frames: TopicStream<Bytes>) -> Result<ServeHandle> {
        let listener = TcpListener::bind((self.config.bind_host.as_str(), 0)).await?;
        let port = listener.local_addr()?.port();

        let (tx, _) = broadcast::channel(self.config.broadcast_capacity.max(1));
        let demand = Arc::new(Notify::new());

        tracing::info!(
            topic = %ctx.descriptor.topic,
            port = port,
            "Serving publication"
        );

        let pump = tokio::spawn(pump_frames(
            ctx.descriptor.topic.clone(),
            frames,
            tx.clone(),
            Arc::clone(&demand),
        ));
        let accept = tokio::spawn(accept_loop(
            listener,
            self.config.clone(),
            ctx,
            tx,
            demand,
        ));

        // Peer tasks end once both senders are gone
        Ok(ServeHandle::new(port, move || {
            accept.abort();
            pump.abort();
        }))
    }
}

fn check_response(topic: &TopicDescriptor, response: &HashMap<String, String>) -> Result<()> {
    if let Some(reason) = response.get("error") {
        return Err(Error::Protocol(format!(
            "Publisher rejected connection: {}",
            reason
        )));
    }

    match response.get("type") {
        Some(ty) if ty == &topic.type_name || ty == ANY_TYPE || topic.type_name == ANY_TYPE => Ok(()),
        Some(ty) => Err(Error::Protocol(format!(
            "Publisher type {} does not match {}",
            ty, topic.type_name
        ))),
        None => Err(Error::Protocol("Publisher header missing type".into())),
    }
}

/// Validate a subscriber's header, returning the rejection reason on mismatch
fn check_request(
    descriptor: &TopicDescriptor,
    request: &HashMap<String, String>,
) -> std::result::Result<(), String> {
    match request.get("topic") {
        Some(topic) if topic == &descriptor.topic => {}
        Some(topic) => return Err(format!("topic {} is not served here", topic)),
        None => return Err("header missing topic".to_string()),
    }

    match request.get("type") {
        Some(ty) if ty == &descriptor.type_name || ty == ANY_TYPE => Ok(()),
        Some(ty) => Err(format!(
            "type {} does not match {}",
            ty, descriptor.type_name
        )),
        None => Err("header missing type".to_string()),
    }
}

/// Receive frames from a publisher, granting one credit per buffered frame
async fn read_frames(
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    peer: String,
    max_frame_size: usize,
    window: u32,
    tx: mpsc::Sender<Bytes>,
) {
    if let Err(e) = write_credit(&mut writer, window).await {
        tracing::debug!(peer = %peer, error = %e, "Failed to grant credit");
        return;
    }

    loop {
        match read_frame(&mut reader, max_frame_size).await {
            Ok(Some(frame)) => {
                if tx.send(frame).await.is_err() {
                    break;
                }
                if let Err(e) = write_credit(&mut writer, 1).await {
                    tracing::debug!(peer = %peer, error = %e, "Failed to grant credit");
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!(peer = %peer, "Publisher closed connection");
                break;
            }
            Err(e) => {
                tracing::debug!(peer = %peer, error = %e, "Publisher connection failed");
                break;
            }
        }
    }
}

/// Realize one element per demand signal and fan it out
async fn pump_frames(
    topic: String,
    mut frames: TopicStream<Bytes>,
    tx: broadcast::Sender<Bytes>,
    demand: Arc<Notify>,
) {
    loop {
        demand.notified().await;

        let Some(frame) = frames.next().await else {
            tracing::debug!(topic = %topic, "Publication stream ended");
            return;
        };

        // Fails only if every subscriber left in the meantime
        let _ = tx.send(frame);
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: TransportConfig,
    ctx: ServeContext,
    tx: broadcast::Sender<Bytes>,
    demand: Arc<Notify>,
) {
    loop {
        match listener.accept().await {
            Ok((socket, peer_addr)) => {
                if config.tcp_nodelay {
                    if let Err(e) = socket.set_nodelay(true) {
                        tracing::error!(error = %e, "Failed to configure socket");
                        continue;
                    }
                }

                let rx = tx.subscribe();
                let config = config.clone();
                let ctx = ctx.clone();
                let demand = Arc::clone(&demand);
                tokio::spawn(async move {
                    let topic = ctx.descriptor.topic.clone();
                    let result = serve_peer(socket, peer_addr, &config, ctx, rx, &demand).await;
                    if let Err(e) = result {
                        tracing::debug!(
                            topic = %topic,
                            peer = %peer_addr,
                            error = %e,
                            "Subscriber connection error"
                        );
                    }
                    tracing::debug!(topic = %topic, peer = %peer_addr, "Subscriber disconnected");
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

async fn serve_peer(
    mut socket: TcpStream,
    peer_addr: SocketAddr,
    config: &TransportConfig,
    ctx: ServeContext,
    mut rx: broadcast::Receiver<Bytes>,
    demand: &Notify,
) -> Result<()> {
    let request = timeout(
        config.connect_timeout,
        read_header(&mut socket, config.max_frame_size),
    )
    .await??;

    if let Err(reason) = check_request(&ctx.descriptor, &request) {
        tracing::warn!(
            topic = %ctx.descriptor.topic,
            peer = %peer_addr,
            reason = %reason,
            "Rejected subscriber"
        );
        write_frame(&mut socket, &encode_header(&[("error", reason.as_str())])).await?;
        return Err(Error::Protocol(reason));
    }

    let response = encode_header(&[
        ("callerid", ctx.descriptor.node.as_str()),
        ("type", ctx.descriptor.type_name.as_str()),
    ]);
    write_frame(&mut socket, &response).await?;

    let peer = peer_addr.to_string();
    let (reader, mut writer) = socket.into_split();
    let credits = Arc::new(Semaphore::new(0));
    let grants = tokio::spawn(read_credits(reader, Arc::clone(&credits), peer.clone()));

    ctx.subscribers.insert(&peer).await;
    tracing::debug!(
        topic = %ctx.descriptor.topic,
        peer = %peer,
        subscriber = request.get("callerid").map(String::as_str).unwrap_or(""),
        "Subscriber connected"
    );

    let result =
        forward_frames(&mut writer, &mut rx, &credits, demand, &ctx.stats, &peer).await;
    grants.abort();
    ctx.subscribers.remove(&peer).await;
    result
}

/// Collect credit grants until the subscriber goes away
async fn read_credits(mut reader: OwnedReadHalf, credits: Arc<Semaphore>, peer: String) {
    loop {
        match read_credit(&mut reader).await {
            Ok(Some(count)) => {
                let count = count as usize;
                if credits.available_permits() + count > MAX_CREDIT {
                    tracing::warn!(peer = %peer, credit = count, "Subscriber credit overflow");
                    break;
                }
                credits.add_permits(count);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(peer = %peer, error = %e, "Invalid credit from subscriber");
                break;
            }
        }
    }
    credits.close();
}

/// Write one frame per unit of credit until either side closes
async fn forward_frames(
    writer: &mut OwnedWriteHalf,
    rx: &mut broadcast::Receiver<Bytes>,
    credits: &Semaphore,
    demand: &Notify,
    stats: &StatsMap,
    peer: &str,
) -> Result<()> {
    loop {
        let Ok(permit) = credits.acquire().await else {
            return Ok(());
        };
        permit.forget();

        let Some(frame) = next_frame(rx, demand, peer).await else {
            return Ok(());
        };
        write_frame(writer, &frame).await?;
        stats.record_send(peer, frame.len()).await;
    }
}

/// Take the next broadcast frame, asking the pump for one if none is queued
async fn next_frame(
    rx: &mut broadcast::Receiver<Bytes>,
    demand: &Notify,
    peer: &str,
) -> Option<Bytes> {
    loop {
        match rx.try_recv() {
            Ok(frame) => return Some(frame),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::debug!(peer = %peer, skipped = skipped, "Subscriber lagging, frames skipped");
            }
            Err(TryRecvError::Closed) => return None,
        }
    }

    demand.notify_one();
    loop {
        match rx.recv().await {
            Ok(frame) => return Some(frame),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(peer = %peer, skipped = skipped, "Subscriber lagging, frames skipped");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}
