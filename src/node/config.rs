//! Node configuration

/// Environment variable naming the discovery service endpoint
pub const MASTER_URI_ENV: &str = "ROS_MASTER_URI";

/// Endpoint used when no override is configured
pub const DEFAULT_MASTER_URI: &str = "http://localhost:11311";

/// Environment variable naming the host advertised to peers
pub const HOSTNAME_ENV: &str = "ROS_HOSTNAME";

/// Environment variable giving an IP to advertise when no hostname is set
pub const IP_ENV: &str = "ROS_IP";

/// Host advertised when nothing else is configured
pub const DEFAULT_HOSTNAME: &str = "localhost";

/// Messages buffered per subscription before receivers are held back
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Node configuration options
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Node name, fixed for the node's lifetime
    pub name: String,

    /// Discovery endpoint override (falls back to the environment)
    pub master_uri: Option<String>,

    /// Advertised host override (falls back to the environment)
    pub hostname: Option<String>,

    /// Capacity of each subscription's message queue
    pub queue_capacity: usize,
}

impl NodeConfig {
    /// Create a config for a node called `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            master_uri: None,
            hostname: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Set the discovery endpoint, ignoring the environment
    pub fn master_uri(mut self, uri: impl Into<String>) -> Self {
        self.master_uri = Some(uri.into());
        self
    }

    /// Set the advertised host, ignoring the environment
    pub fn hostname(mut self, host: impl Into<String>) -> Self {
        self.hostname = Some(host.into());
        self
    }

    /// Set the subscription queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Discovery endpoint: override, then `ROS_MASTER_URI`, then the default
    pub fn resolve_master_uri(&self) -> String {
        self.resolve_master_uri_with(|key| std::env::var(key).ok())
    }

    /// Advertised host: override, then `ROS_HOSTNAME`, then `ROS_IP`, then `localhost`
    pub fn resolve_hostname(&self) -> String {
        self.resolve_hostname_with(|key| std::env::var(key).ok())
    }

    fn resolve_master_uri_with(&self, lookup: impl Fn(&str) -> Option<String>) -> String {
        self.master_uri
            .clone()
            .or_else(|| non_empty(lookup(MASTER_URI_ENV)))
            .unwrap_or_else(|| DEFAULT_MASTER_URI.to_string())
    }

    fn resolve_hostname_with(&self, lookup: impl Fn(&str) -> Option<String>) -> String {
        self.hostname
            .clone()
            .or_else(|| non_empty(lookup(HOSTNAME_ENV)))
            .or_else(|| non_empty(lookup(IP_ENV)))
            .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
