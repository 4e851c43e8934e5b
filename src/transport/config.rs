//! Transport configuration

use std::time::Duration;

/// TCP transport configuration options
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Host publications bind to
    pub bind_host: String,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Frames buffered per publication before slow subscribers start skipping
    pub broadcast_capacity: usize,

    /// Largest frame accepted from a peer
    pub max_frame_size: usize,

    /// Time allowed to connect to a publisher and exchange headers
    pub connect_timeout: Duration,

    /// Frames read ahead from a publisher connection, and the credit
    /// window granted to it
    pub receive_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            tcp_nodelay: true,
            broadcast_capacity: 64,
            max_frame_size: 16 * 1024 * 1024, // 16MB
            connect_timeout: Duration::from_secs(5),
            receive_buffer: 16,
        }
    }
}

impl TransportConfig {
    /// Set the bind host
    pub fn bind_host(mut self, host: impl Into<String>) -> Self {
        self.bind_host = host.into();
        self
    }

    /// Set the fan-out buffer size
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }

    /// Set the maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Disable TCP_NODELAY
    pub fn disable_nodelay(mut self) -> Self {
        self.tcp_nodelay = false;
        self
    }
}
