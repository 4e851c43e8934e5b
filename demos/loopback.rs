//! Loopback node: publishes on a topic and subscribes to it over TCP
//!
//! Run with: cargo run --example loopback
//!
//! Set `RUST_LOG=rosnode_rs=debug` for connection-level logging. The node
//! reports itself connected to its own publication; stop it with Ctrl-C to
//! print the per-peer statistics.

use std::sync::Arc;
use std::time::Duration;

use rosnode_rs::error::Error;
use rosnode_rs::{run_node, Node, NodeBuilder, NodeConfig, TcpTransport, TransportConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("rosnode_rs=info".parse()?),
        )
        .init();

    let transport = TcpTransport::new(TransportConfig::default().bind_host("127.0.0.1"));
    let mut builder = NodeBuilder::new(NodeConfig::new("/loopback"), transport);

    let mut chatter = builder.subscribe::<String>("/chatter")?;
    builder
        .advertise_effectful(
            "/chatter",
            (0u64..).map(|i| async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                format!("hello world {}", i)
            }),
        )
        .await?;

    let listener = tokio::spawn(async move {
        while let Some(msg) = chatter.next().await {
            println!("I heard: {}", msg);
        }
    });

    run_node(builder, |node: Arc<Node>| async move {
        let port = node
            .publication_port("/chatter")
            .await
            .ok_or_else(|| Error::Protocol("/chatter is not published".into()))?;

        // Stand-in for the discovery service announcing our own publisher
        node.publisher_update("/chatter", [format!("127.0.0.1:{}", port)])
            .await;

        tokio::signal::ctrl_c().await?;

        for info in node.subscriptions().await {
            for (peer, stats) in info.stats {
                println!(
                    "{} <- {}: {} messages, {} bytes",
                    info.topic, peer, stats.messages, stats.bytes
                );
            }
        }
        for info in node.publications().await {
            for (peer, stats) in info.stats {
                println!(
                    "{} -> {}: {} messages, {} bytes",
                    info.topic, peer, stats.messages, stats.bytes
                );
            }
        }

        Ok::<(), Error>(())
    })
    .await?;

    listener.abort();
    Ok(())
}
