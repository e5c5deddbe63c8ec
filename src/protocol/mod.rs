//! RTMP wire protocol: handshake, chunk framing, message types, constants,
//! and encoder-compatibility quirks.

pub mod chunk;
pub mod constants;
pub mod enhanced;
pub mod flags;
pub mod handshake;
pub mod message;
pub mod quirks;

pub use chunk::{ChunkReader, ChunkWriter, Message};
pub use flags::ProtocolFlags;
pub use handshake::{Handshake, HandshakeRole};
pub use message::{Command, ConnectParams};
