//! Node registry and the builder that populates it
//!
//! Declarations happen on a [`NodeBuilder`] owned by the application. Once
//! every topic is declared, [`NodeBuilder::build`] resolves the node's
//! endpoints and yields the finished [`NodeState`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::message::Message;
use crate::node::NodeConfig;
use crate::stats::StatsMap;
use crate::stream::TopicStream;
use crate::transport::{ServeContext, TopicDescriptor, Transport};

use super::connection::{spawn_receiver, Connector};
use super::entry::{PublicationEntry, SubscriptionEntry};
use super::error::RegistryError;
use super::peers::PeerSet;

/// The node's registry of declared topics
pub struct NodeState {
    name: String,
    master_uri: String,
    hostname: String,
    subscriptions: HashMap<String, SubscriptionEntry>,
    publications: HashMap<String, PublicationEntry>,
}

impl NodeState {
    /// Node name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Discovery service endpoint
    pub fn master_uri(&self) -> &str {
        &self.master_uri
    }

    /// Host this node advertises to peers
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// All subscriptions keyed by topic
    pub fn subscriptions(&self) -> &HashMap<String, SubscriptionEntry> {
        &self.subscriptions
    }

    /// All publications keyed by topic
    pub fn publications(&self) -> &HashMap<String, PublicationEntry> {
        &self.publications
    }

    /// Look up a subscription
    pub fn subscription(&self, topic: &str) -> Option<&SubscriptionEntry> {
        self.subscriptions.get(topic)
    }

    /// Look up a publication
    pub fn publication(&self, topic: &str) -> Option<&PublicationEntry> {
        self.publications.get(topic)
    }
}

/// Sequencing context for topic declarations
///
/// # Example
/// ```no_run
/// use rosnode_rs::{NodeBuilder, NodeConfig, TcpTransport, TopicStream};
///
/// # async fn example() -> rosnode_rs::error::Result<()> {
/// let mut builder = NodeBuilder::new(NodeConfig::new("/relay"), TcpTransport::default());
/// let input = builder.subscribe::<String>("/in")?;
/// builder.advertise("/count", TopicStream::from_iter(0i32..)).await?;
/// let state = builder.build();
/// # Ok(())
/// # }
/// ```
pub struct NodeBuilder<T: Transport> {
    config: NodeConfig,
    transport: Arc<T>,
    subscriptions: HashMap<String, SubscriptionEntry>,
    publications: HashMap<String, PublicationEntry>,
}

impl<T: Transport> NodeBuilder<T> {
    /// Create a builder for a node using `transport`
    pub fn new(config: NodeConfig, transport: T) -> Self {
        Self::with_shared_transport(config, Arc::new(transport))
    }

    /// Create a builder sharing an existing transport
    pub fn with_shared_transport(config: NodeConfig, transport: Arc<T>) -> Self {
        Self {
            config,
            transport,
            subscriptions: HashMap::new(),
            publications: HashMap::new(),
        }
    }

    /// Node configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Declare an input topic and return the stream of its messages
    ///
    /// Messages are buffered in a queue of `queue_capacity` elements; when it
    /// is full, receiver workers wait instead of dropping messages.
    pub fn subscribe<M: Message>(
        &mut self,
        topic: impl Into<String>,
    ) -> std::result::Result<TopicStream<M>, RegistryError> {
        let topic = topic.into();
        if self.subscriptions.contains_key(&topic) {
            return Err(RegistryError::DuplicateSubscription(topic));
        }

        let (tx, rx) = mpsc::channel::<M>(self.config.queue_capacity);
        let stats = StatsMap::new();
        let descriptor = TopicDescriptor::new(&self.config.name, &topic, M::type_name());

        let connector: Connector = {
            let transport = Arc::clone(&self.transport);
            let stats = stats.clone();
            Arc::new(move |address| {
                spawn_receiver(
                    Arc::clone(&transport),
                    descriptor.clone(),
                    stats.clone(),
                    tx.clone(),
                    address,
                )
            })
        };

        tracing::info!(
            node = %self.config.name,
            topic = %topic,
            type_name = M::type_name(),
            queue_capacity = self.config.queue_capacity,
            "Subscribed"
        );

        self.subscriptions
            .insert(topic, SubscriptionEntry::new(M::type_name(), connector, stats));

        Ok(TopicStream::from_receiver(rx))
    }

    /// Declare an output topic publishing the values of `stream`
    pub async fn advertise<M: Message>(
        &mut self,
        topic: impl Into<String>,
        stream: TopicStream<M>,
    ) -> Result<()> {
        let topic = topic.into();
        if self.publications.contains_key(&topic) {
            return Err(RegistryError::DuplicatePublication(topic).into());
        }

        let stats = StatsMap::new();
        let subscribers = PeerSet::new();
        let ctx = ServeContext {
            descriptor: TopicDescriptor::new(&self.config.name, &topic, M::type_name()),
            stats: stats.clone(),
            subscribers: subscribers.clone(),
        };

        let handle = self
            .transport
            .serve(ctx, stream.map(|message| message.encode()))
            .await?;
        let (port, cleanup) = handle.into_parts();

        tracing::info!(
            node = %self.config.name,
            topic = %topic,
            type_name = M::type_name(),
            port = port,
            "Advertised"
        );

        self.publications.insert(
            topic,
            PublicationEntry::new(M::type_name(), port, cleanup, stats, subscribers),
        );

        Ok(())
    }

    /// Declare an output topic publishing the results of `effects`
    ///
    /// Each effect runs when the transport demands its element.
    pub async fn advertise_effectful<M, I, F>(
        &mut self,
        topic: impl Into<String>,
        effects: I,
    ) -> Result<()>
    where
        M: Message,
        I: IntoIterator<Item = F>,
        I::IntoIter: Send + 'static,
        F: std::future::Future<Output = M> + Send + 'static,
    {
        self.advertise(topic, TopicStream::from_effects(effects))
            .await
    }

    /// Finish declarations, resolving the node's endpoints from configuration
    pub fn build(self) -> NodeState {
        let master_uri = self.config.resolve_master_uri();
        let hostname = self.config.resolve_hostname();

        NodeState {
            name: self.config.name,
            master_uri,
            hostname,
            subscriptions: self.subscriptions,
            publications: self.publications,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::Error;
    use crate::testing::MockTransport;

    fn builder() -> NodeBuilder<MockTransport> {
        NodeBuilder::new(
            NodeConfig::new("/test_node").master_uri("http://master:11311"),
            MockTransport::default(),
        )
    }

    #[tokio::test]
    async fn test_duplicate_subscription_any_type() {
        let mut builder = builder();
        builder.subscribe::<String>("/a").unwrap();

        let same_type = builder.subscribe::<String>("/a");
        assert_eq!(
            same_type.err(),
            Some(RegistryError::DuplicateSubscription("/a".into()))
        );

        let other_type = builder.subscribe::<i32>("/a");
        assert_eq!(
            other_type.err(),
            Some(RegistryError::DuplicateSubscription("/a".into()))
        );
    }

    #[tokio::test]
    async fn test_duplicate_publication() {
        let mut builder = builder();
        builder
            .advertise("/out", TopicStream::from_iter(0i32..))
            .await
            .unwrap();

        let result = builder
            .advertise("/out", TopicStream::from_iter(vec!["x".to_string()]))
            .await;
        assert!(matches!(
            result,
            Err(Error::Registry(RegistryError::DuplicatePublication(_)))
        ));
    }

    #[tokio::test]
    async fn test_same_topic_may_be_subscribed_and_advertised() {
        let mut builder = builder();
        builder.subscribe::<i32>("/loop").unwrap();
        builder
            .advertise("/loop", TopicStream::from_iter(0i32..))
            .await
            .unwrap();

        let state = builder.build();
        assert!(state.subscription("/loop").is_some());
        assert!(state.publication("/loop").is_some());
    }

    #[tokio::test]
    async fn test_advertise_serves_encoded_stream() {
        let transport = Arc::new(MockTransport::default());
        let mut builder = NodeBuilder::with_shared_transport(
            NodeConfig::new("/talker"),
            Arc::clone(&transport),
        );
        builder
            .advertise("/chatter", TopicStream::from_iter(vec!["hi".to_string()]))
            .await
            .unwrap();

        let mut served = transport.take_served("/chatter").unwrap();
        assert_eq!(
            String::decode(served.next().await.unwrap()).unwrap(),
            "hi"
        );
        assert!(served.next().await.is_none());
    }

    #[tokio::test]
    async fn test_advertise_effectful_runs_effects_on_demand() {
        let transport = Arc::new(MockTransport::default());
        let mut builder = NodeBuilder::with_shared_transport(
            NodeConfig::new("/talker"),
            Arc::clone(&transport),
        );
        let runs = Arc::new(AtomicUsize::new(0));

        let effects = (0..).map({
            let runs = Arc::clone(&runs);
            move |i: i32| {
                let runs = Arc::clone(&runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    i
                }
            }
        });
        builder.advertise_effectful("/count", effects).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        let mut served = transport.take_served("/count").unwrap();
        assert_eq!(i32::decode(served.next().await.unwrap()).unwrap(), 0);
        assert_eq!(i32::decode(served.next().await.unwrap()).unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_build_records_declarations() {
        let mut builder = builder();
        builder.subscribe::<String>("/in").unwrap();
        builder
            .advertise("/out", TopicStream::from_iter(0i32..))
            .await
            .unwrap();

        let state = builder.build();
        assert_eq!(state.name(), "/test_node");
        assert_eq!(state.master_uri(), "http://master:11311");
        assert_eq!(state.subscriptions().len(), 1);
        assert_eq!(state.publications().len(), 1);
        assert_eq!(state.subscription("/in").unwrap().type_name(), "std_msgs/String");
        assert_eq!(state.publication("/out").unwrap().type_name(), "std_msgs/Int32");
    }
}
