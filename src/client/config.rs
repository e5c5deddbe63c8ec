//! RTMP client configuration and URL parsing.

use std::time::Duration;

/// The pieces of an `rtmp://host[:port]/app/stream_key` URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedUrl {
    pub host: String,
    pub port: u16,
    pub app: String,
    pub stream_key: Option<String>,
}

/// Configuration for an outgoing RTMP connection (publisher or puller).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full `rtmp://` URL, e.g. `rtmp://localhost/live/stream_key`.
    pub url: String,
    /// `flashVer` advertised in the `connect` command.
    pub flash_ver: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Chunk size to request from the remote peer.
    pub chunk_size: u32,
}

impl ClientConfig {
    /// Create a config from a full RTMP URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            flash_ver: "FMLE/3.0 (compatible; streamcore)".to_string(),
            connect_timeout: Duration::from_secs(10),
            chunk_size: crate::protocol::constants::RECOMMENDED_CHUNK_SIZE,
        }
    }

    pub fn flash_ver(mut self, flash_ver: impl Into<String>) -> Self {
        self.flash_ver = flash_ver.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Split `self.url` into host/port/app/stream_key.
    ///
    /// Returns `None` if the URL isn't a well-formed `rtmp://` URL.
    pub fn parse_url(&self) -> Option<ParsedUrl> {
        let rest = self.url.strip_prefix("rtmp://")?;
        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));

        let (host, port) = match authority.split_once(':') {
            Some((h, p)) => (h.to_string(), p.parse().ok()?),
            None => (authority.to_string(), 1935),
        };
        if host.is_empty() {
            return None;
        }

        let mut segments = path.splitn(2, '/');
        let app = segments.next().unwrap_or("").to_string();
        let stream_key = segments.next().filter(|s| !s.is_empty()).map(|s| s.to_string());

        Some(ParsedUrl {
            host,
            port,
            app,
            stream_key,
        })
    }
}
