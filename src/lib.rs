//! streamcore: live-streaming media server core.
//!
//! A codec-agnostic tag pipeline ([`tag`], [`container`], [`distributor`],
//! [`flowctl`]) feeds a tree of resolvable [`element`]s, served over both
//! an RTMP engine and an RTSP/RTP engine.
//!
//! The RTMP engine is the [`protocol`] (handshake, chunk framing, message
//! types), [`amf`], [`session`], [`server`], [`client`], [`registry`] and
//! [`stats`] modules together; there is no `rtmp` module because each piece
//! is independently useful (the chunk codec, the AMF codec, the client and
//! server drivers all have callers that need only one of them).
//!
//! [`rtsp`] is the RTSP/RTP counterpart, sharing the same [`element`] graph
//! as its source of media. [`cache`] and [`util`] are small supporting
//! utilities used by the element graph and its standard elements.

pub mod amf;
pub mod cache;
pub mod client;
pub mod container;
pub mod distributor;
pub mod element;
pub mod error;
pub mod flowctl;
pub mod media;
pub mod protocol;
pub mod registry;
pub mod rtsp;
pub mod server;
pub mod session;
pub mod stats;
pub mod tag;
pub mod util;

pub use error::{Error, Result};
pub use server::{RtmpServer, ServerConfig};
