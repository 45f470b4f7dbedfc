//! Stream configuration
//!
//! This module provides the configuration builder for socket streams.

use super::DEFAULT_BUFFER_SIZE;
use std::time::Duration;

/// Socket stream configuration (immutable after building)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub(crate) buffer_size: usize,
    pub(crate) io_timeout: Option<Duration>,
    pub(crate) nodelay: bool,
}

impl StreamConfig {
    /// Create a new configuration builder
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::new()
    }

    /// Capacity of each of the read and write buffers
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Timeout applied before every transfer, `None` blocks indefinitely
    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout
    }

    /// Whether TCP_NODELAY is set on connect
    pub fn nodelay(&self) -> bool {
        self.nodelay
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            buffer_size: DEFAULT_BUFFER_SIZE,
            io_timeout: None,
            nodelay: false,
        }
    }
}

/// Builder for `StreamConfig`
#[derive(Debug, Clone)]
pub struct StreamConfigBuilder {
    config: StreamConfig,
}

impl StreamConfigBuilder {
    pub fn new() -> Self {
        StreamConfigBuilder {
            config: StreamConfig::default(),
        }
    }

    /// Set the buffer capacity (zero falls back to the default)
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Set the per-transfer timeout
    ///
    /// A zero timeout falls back to fully blocking I/O. Sub-millisecond
    /// timeouts are rounded up to one millisecond when polling.
    pub fn io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.config.nodelay = enabled;
        self
    }

    pub fn build(self) -> StreamConfig {
        let mut config = self.config;
        if config.buffer_size == 0 {
            tracing::warn!("buffer size 0 requested, using {}", DEFAULT_BUFFER_SIZE);
            config.buffer_size = DEFAULT_BUFFER_SIZE;
        }
        if config.io_timeout == Some(Duration::ZERO) {
            tracing::warn!("zero io timeout requested, blocking instead");
            config.io_timeout = None;
        }
        config
    }
}

impl Default for StreamConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.buffer_size(), DEFAULT_BUFFER_SIZE);
        assert_eq!(config.io_timeout(), None);
        assert!(!config.nodelay());
    }

    #[test]
    fn test_builder() {
        let config = StreamConfig::builder()
            .buffer_size(64)
            .io_timeout(Some(Duration::from_millis(250)))
            .nodelay(true)
            .build();

        assert_eq!(config.buffer_size(), 64);
        assert_eq!(config.io_timeout(), Some(Duration::from_millis(250)));
        assert!(config.nodelay());
    }

    #[test]
    fn test_zero_buffer_size_rejected() {
        let config = StreamConfig::builder().buffer_size(0).build();
        assert_eq!(config.buffer_size(), DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_zero_timeout_blocks() {
        let config = StreamConfig::builder()
            .io_timeout(Some(Duration::ZERO))
            .build();
        assert_eq!(config.io_timeout(), None);

        let config = StreamConfig::builder()
            .io_timeout(Some(Duration::from_micros(900)))
            .build();
        assert_eq!(config.io_timeout(), Some(Duration::from_micros(900)));
    }
}
