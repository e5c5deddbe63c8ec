//! RTMP client implementation
//!
//! Provides client-side RTMP for:
//! - Pulling streams from remote RTMP servers
//! - Connecting to any RTMP server for transcoding, relaying, etc.

pub mod config;
pub mod connector;
pub mod failsafe;
pub mod publisher;
pub mod puller;

pub use config::ClientConfig;
pub use connector::RtmpConnector;
pub use failsafe::FailsafeClient;
pub use publisher::{PublishEvent, RtmpPublisher};
pub use puller::{ClientEvent, RtmpPuller};
