//! Crate-wide error types.
//!
//! Each subsystem defines its own error enum; this module composes them into
//! one `Error` so callers crossing layers (e.g. a server accepting a
//! connection that then fails AMF decoding) only need one `Result` alias.

use thiserror::Error;

use crate::registry::RegistryError;

/// Top-level crate error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Amf(#[from] AmfError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Tag(#[from] crate::tag::TagError),

    #[error(transparent)]
    Container(#[from] crate::container::ContainerError),

    #[error(transparent)]
    Element(#[from] crate::element::ElementError),

    #[error(transparent)]
    Rtsp(#[from] crate::rtsp::RtspError),

    #[error(transparent)]
    Cache(#[from] crate::cache::CacheError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Errors from AMF0/AMF3 decoding and encoding.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AmfError {
    #[error("unexpected end of AMF buffer")]
    UnexpectedEof,
    #[error("unknown AMF0 marker: 0x{0:02x}")]
    UnknownMarker(u8),
    #[error("invalid UTF-8 string in AMF payload")]
    InvalidUtf8,
    #[error("AMF nesting depth exceeded the maximum")]
    NestingTooDeep,
    #[error("AMF reference index {0} out of range")]
    InvalidReference(u16),
    #[error("AMF object missing terminating object-end marker")]
    InvalidObjectEnd,
    #[error("AMF3 U29 integer out of range")]
    U29OutOfRange,
    #[error("unknown AMF3 trait for typed object")]
    UnknownTrait,
}

/// Errors during the RTMP handshake.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HandshakeError {
    #[error("unsupported RTMP version: {0}")]
    InvalidVersion(u8),
    #[error("handshake signature mismatch")]
    SignatureMismatch,
    #[error("handshake timed out")]
    TimedOut,
    #[error("connection closed during handshake")]
    ConnectionClosed,
}

/// Errors in chunk-stream / message-level protocol handling.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("invalid chunk basic header")]
    InvalidBasicHeader,
    #[error("unknown chunk stream id {0}")]
    UnknownChunkStream(u32),
    #[error("message exceeds maximum size ({0} bytes)")]
    MessageTooLarge(usize),
    #[error("missing previous chunk header for delta timestamp")]
    MissingPreviousHeader,
    #[error("unexpected message type {0} for this context")]
    UnexpectedMessageType(u8),
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),
    #[error("command {0} missing required argument")]
    MissingArgument(&'static str),
    #[error("too many streams open for this connection")]
    TooManyStreams,
}

/// Errors from media/codec parsing (FLV, H.264, AAC framing at the byte
/// level, as distinct from the container-level `ContainerError`).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MediaError {
    #[error("truncated FLV tag header")]
    TruncatedFlvTag,
    #[error("FLV signature mismatch")]
    BadFlvSignature,
    #[error("malformed AVC NALU packet")]
    InvalidAvcPacket,
    #[error("malformed AAC packet")]
    InvalidAacPacket,
    #[error("unsupported codec identifier {0}")]
    UnsupportedCodec(u8),
}
