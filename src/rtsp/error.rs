use thiserror::Error;

/// Errors raised by the RTSP/RTP engine.
#[derive(Debug, Error)]
pub enum RtspError {
    #[error("malformed RTSP request line")]
    InvalidRequestLine,
    #[error("malformed RTSP header")]
    InvalidHeader,
    #[error("empty request")]
    EmptyRequest,
    #[error("unsupported RTSP method {0:?}")]
    UnsupportedMethod(String),
    #[error("no session with id {0:?}")]
    NoSuchSession(String),
    #[error("SETUP deadline elapsed before PLAY")]
    SetupDeadlineElapsed,
    #[error("no packetizer available for this media")]
    NoPacketizer,
    #[error("rtp payload for a single media frame exceeded the MTU and could not be fragmented")]
    PacketizationFailed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
