//! Cross-cutting tuning knobs surfaced as a flat flags struct, the way the
//! original implementation exposed them as a single `DEFINE_*` flag file
//! rather than scattering them across each layer's own config struct.
//!
//! [`ServerConfig`](crate::server::ServerConfig), [`RegistryConfig`](crate::registry::RegistryConfig),
//! and [`ClientConfig`](crate::client::ClientConfig) remain the authoritative,
//! per-layer settings; `ProtocolFlags` is a read-only summary view over the
//! values an operator most commonly wants to see or tune in one place.

use std::time::Duration;

/// A flat summary of the knobs named at the crate's external boundary.
#[derive(Debug, Clone)]
pub struct ProtocolFlags {
    pub max_connections: usize,
    pub max_streams_per_connection: usize,
    pub outbuf_ceiling: usize,
    pub outbuf_watermark: usize,
    pub default_write_ahead_ms: u32,
    pub max_write_ahead_ms: u32,
    pub pause_timeout: Duration,
    pub send_buffer: usize,
    pub write_timeout: Duration,
    pub decoder_memory_limit: usize,
    pub chunk_size: u32,
    pub media_chunk_ms: u32,
    pub seek_processing_delay: Duration,
    pub missing_stream_cache_ttl: Duration,
    pub reject_delay: Duration,
}

impl Default for ProtocolFlags {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            max_streams_per_connection: 16,
            outbuf_ceiling: 4 * 1024 * 1024,
            outbuf_watermark: 1024 * 1024,
            default_write_ahead_ms: 1000,
            max_write_ahead_ms: 10_000,
            pause_timeout: Duration::from_secs(60),
            send_buffer: 256 * 1024,
            write_timeout: Duration::from_secs(10),
            decoder_memory_limit: 16 * 1024 * 1024,
            chunk_size: 4096,
            media_chunk_ms: 20,
            seek_processing_delay: Duration::from_millis(100),
            missing_stream_cache_ttl: Duration::from_secs(5),
            reject_delay: Duration::from_millis(200),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_keep_watermark_below_ceiling() {
        let flags = ProtocolFlags::default();
        assert!(flags.outbuf_watermark < flags.outbuf_ceiling);
        assert!(flags.default_write_ahead_ms <= flags.max_write_ahead_ms);
    }
}
