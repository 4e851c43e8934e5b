//! Node entry point

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::registry::NodeBuilder;
use crate::transport::Transport;

use super::adapter::Node;

/// Registration/discovery layer driving a running node
///
/// `run` owns the node's operational lifetime: it registers the node's
/// topics with the discovery service, forwards publisher updates and port
/// queries, and returns when the node should stop.
///
/// Any `FnOnce(Arc<Node>) -> impl Future<Output = Result<()>>` is a
/// `Discovery`, which is convenient for tests and static topologies.
pub trait Discovery: Send + 'static {
    fn run(self, node: Arc<Node>) -> impl Future<Output = Result<()>> + Send;
}

impl<F, Fut> Discovery for F
where
    F: FnOnce(Arc<Node>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send,
{
    fn run(self, node: Arc<Node>) -> impl Future<Output = Result<()>> + Send {
        self(node)
    }
}

/// Finish declarations and run the node under `discovery`
///
/// Resolves the discovery endpoint, freezes the registry, marks the node
/// running and awaits the discovery loop. The node is shut down when the
/// loop returns, whether it succeeded or not.
pub async fn run_node<T, D>(builder: NodeBuilder<T>, discovery: D) -> Result<()>
where
    T: Transport,
    D: Discovery,
{
    let node = Arc::new(Node::new(builder.build()));
    node.start().await;

    let result = discovery.run(Arc::clone(&node)).await;
    if let Err(ref e) = result {
        tracing::error!(node = %node.name(), error = %e, "Discovery loop failed");
    }

    node.shutdown().await;
    result
}
