//! Server configuration.

use std::net::SocketAddr;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3333;

/// Configuration for the pagelog server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Frames kept per session while the client cannot receive them.
    pub max_pending_frames: usize,
    /// Request ids remembered per session for duplicate detection.
    pub dedup_window: usize,
    /// Upper bound on `limit` for listing requests.
    pub max_page_size: u64,
    /// Capacity of each connection's outbound channel.
    pub outbound_buffer: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_connections: 1000,
            max_pending_frames: 1024,
            dedup_window: 4096,
            max_page_size: 1000,
            outbound_buffer: 256,
        }
    }

    /// Sets the maximum concurrent connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the per-session pending frame cap.
    pub fn with_max_pending_frames(mut self, max: usize) -> Self {
        self.max_pending_frames = max;
        self
    }

    /// Sets the per-session duplicate detection window.
    pub fn with_dedup_window(mut self, size: usize) -> Self {
        self.dedup_window = size;
        self
    }

    /// Sets the largest page a listing request may return.
    pub fn with_max_page_size(mut self, size: u64) -> Self {
        self.max_page_size = size;
        self
    }

    /// Sets the outbound channel capacity.
    pub fn with_outbound_buffer(mut self, size: usize) -> Self {
        self.outbound_buffer = size;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 3333);
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.max_pending_frames, 1024);
        assert_eq!(config.dedup_window, 4096);
        assert_eq!(config.max_page_size, 1000);
        assert_eq!(config.outbound_buffer, 256);
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("127.0.0.1:9000".parse().unwrap())
            .with_max_connections(5)
            .with_max_pending_frames(8)
            .with_dedup_window(16)
            .with_max_page_size(10)
            .with_outbound_buffer(2);

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.max_pending_frames, 8);
        assert_eq!(config.dedup_window, 16);
        assert_eq!(config.max_page_size, 10);
        assert_eq!(config.outbound_buffer, 2);
    }
}
