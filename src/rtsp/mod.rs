//! RTSP/RTP engine: message codec, session/watchdog bookkeeping, SDP
//! generation, per-codec RTP packetizers, and the broadcaster that ties
//! them together.

pub mod broadcaster;
pub mod error;
pub mod message;
pub mod mount;
pub mod packetizer;
pub mod rtp;
pub mod sdp;
pub mod server;
pub mod session;

pub use error::RtspError;
