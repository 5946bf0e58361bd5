//! Client configuration.

use std::time::Duration;

use dbxdebug_protocol::exchange::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT};
use dbxdebug_protocol::RetryPolicy;

use crate::types::SegmentWidth;

/// Host DOSBox-X's GDB server listens on by default.
pub const DEFAULT_HOST: &str = "localhost";

/// Port DOSBox-X's GDB server listens on by default.
pub const DEFAULT_PORT: u16 = 2159;

/// Largest memory transfer sent in one `m`/`M` packet.
pub const DEFAULT_MAX_CHUNK: usize = 1024;

/// Everything a [`crate::Client`] needs to reach and talk to a stub
///
/// ## Example
///
/// ```rust
/// use std::time::Duration;
///
/// use dbxdebug_core::config::ClientConfig;
///
/// let config = ClientConfig::new("127.0.0.1", 2159)
///     .with_timeout(Duration::from_millis(500))
///     .with_max_attempts(5);
/// assert_eq!(config.address(), "127.0.0.1:2159");
/// assert_eq!(config.retry_policy().max_attempts, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig
{
    /// Stub host name or IP address.
    pub host: String,
    /// Stub TCP port.
    pub port: u16,
    /// Bound on connecting, and on each wait for an ack or reply.
    pub timeout: Duration,
    /// Transmissions allowed per request, including the first.
    pub max_attempts: u32,
    /// Largest number of bytes moved by one memory packet.
    pub max_chunk: usize,
    /// Width of segment registers in the `g`/`G` blob.
    pub segment_width: SegmentWidth,
    /// Log every raw frame at `trace` level.
    pub trace_packets: bool,
}

impl Default for ClientConfig
{
    fn default() -> Self
    {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_chunk: DEFAULT_MAX_CHUNK,
            segment_width: SegmentWidth::default(),
            trace_packets: false,
        }
    }
}

impl ClientConfig
{
    /// Default settings for the given endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self
    {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self
    {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self
    {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the memory chunk size. Zero is treated as one byte per packet.
    #[must_use]
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self
    {
        self.max_chunk = max_chunk;
        self
    }

    #[must_use]
    pub fn with_segment_width(mut self, segment_width: SegmentWidth) -> Self
    {
        self.segment_width = segment_width;
        self
    }

    #[must_use]
    pub fn with_trace_packets(mut self, trace_packets: bool) -> Self
    {
        self.trace_packets = trace_packets;
        self
    }

    /// Retry settings handed to the exchange engine.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy
    {
        RetryPolicy {
            max_attempts: self.max_attempts,
            timeout: self.timeout,
        }
    }

    /// `host:port`, for logs and error messages.
    #[must_use]
    pub fn address(&self) -> String
    {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) const fn chunk_size(&self) -> usize
    {
        if self.max_chunk == 0 {
            1
        } else {
            self.max_chunk
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn defaults_match_dosbox_x()
    {
        let config = ClientConfig::default();
        assert_eq!(config.address(), "localhost:2159");
        assert_eq!(config.max_chunk, 1024);
        assert_eq!(config.segment_width, SegmentWidth::Bits16);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(!config.trace_packets);
    }

    #[test]
    fn zero_chunk_still_makes_progress()
    {
        assert_eq!(ClientConfig::default().with_max_chunk(0).chunk_size(), 1);
    }
}
