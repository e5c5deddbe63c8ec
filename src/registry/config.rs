//! Registry tuning knobs.

use std::time::Duration;

/// Configuration for a [`StreamRegistry`](super::StreamRegistry).
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each stream's broadcast channel. Subscribers that fall
    /// behind by more than this many frames start missing messages
    /// (`broadcast::error::RecvError::Lagged`).
    pub broadcast_capacity: usize,

    /// Maximum size in bytes the GOP buffer is allowed to hold per stream.
    pub max_gop_size: usize,

    /// How long a stream stays in `GracePeriod` after its publisher
    /// disconnects before it is reclaimed by cleanup.
    pub publisher_grace_period: Duration,

    /// How long an idle stream (no publisher, created but never reclaimed,
    /// or long past its grace period) is kept before cleanup removes it.
    pub idle_stream_timeout: Duration,

    /// How often the background cleanup task runs.
    pub cleanup_interval: Duration,

    /// How many recently-failed stream lookups to remember, to short-circuit
    /// a reconnect storm against a path that doesn't exist.
    pub missing_stream_cache_size: usize,

    /// How long a failed lookup stays cached before it is retried for real.
    pub missing_stream_ttl: Duration,

    /// Delay applied to a `subscribe` that is rejected from the missing-stream
    /// cache, so a tight reconnect loop can't spin at full speed.
    pub reject_delay: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 1024,
            max_gop_size: 4 * 1024 * 1024,
            publisher_grace_period: Duration::from_secs(30),
            idle_stream_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(10),
            missing_stream_cache_size: 1024,
            missing_stream_ttl: Duration::from_secs(5),
            reject_delay: Duration::from_millis(200),
        }
    }
}

impl RegistryConfig {
    /// Set the broadcast channel capacity.
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Set the maximum GOP buffer size in bytes.
    pub fn max_gop_size(mut self, size: usize) -> Self {
        self.max_gop_size = size;
        self
    }

    /// Set how long a stream may sit in grace period.
    pub fn publisher_grace_period(mut self, period: Duration) -> Self {
        self.publisher_grace_period = period;
        self
    }

    /// Set how long an idle stream is kept before cleanup.
    pub fn idle_stream_timeout(mut self, timeout: Duration) -> Self {
        self.idle_stream_timeout = timeout;
        self
    }

    /// Set the cleanup task's polling interval.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set how long a failed stream lookup is remembered.
    pub fn missing_stream_ttl(mut self, ttl: Duration) -> Self {
        self.missing_stream_ttl = ttl;
        self
    }

    /// Set the delay applied to a subscribe rejected from the missing-stream cache.
    pub fn reject_delay(mut self, delay: Duration) -> Self {
        self.reject_delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = RegistryConfig::default();
        assert!(config.broadcast_capacity > 0);
        assert!(config.max_gop_size > 0);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = RegistryConfig::default()
            .broadcast_capacity(16)
            .publisher_grace_period(Duration::from_secs(5));
        assert_eq!(config.broadcast_capacity, 16);
        assert_eq!(config.publisher_grace_period, Duration::from_secs(5));
    }
}
