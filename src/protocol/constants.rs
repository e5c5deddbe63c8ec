//! RTMP wire-level constants.

/// RTMP handshake version byte sent in C0/S0.
pub const RTMP_VERSION: u8 = 3;

/// Size in bytes of each handshake block (C1/S1, C2/S2).
pub const HANDSHAKE_SIZE: usize = 1536;

/// Chunk size assumed before any `Set Chunk Size` message is received.
pub const DEFAULT_CHUNK_SIZE: u32 = 128;

/// Chunk size this implementation requests once a session is established.
pub const RECOMMENDED_CHUNK_SIZE: u32 = 4096;

/// Largest chunk size a peer is allowed to negotiate.
pub const MAX_CHUNK_SIZE: u32 = 1 << 24;

/// Default window acknowledgement size advertised to peers (2.5 MB).
pub const DEFAULT_WINDOW_ACK_SIZE: u32 = 2_500_000;

/// Default peer bandwidth advertised to peers.
pub const DEFAULT_PEER_BANDWIDTH: u32 = 2_500_000;

/// Peer bandwidth limit type: hard.
pub const LIMIT_TYPE_HARD: u8 = 0;
/// Peer bandwidth limit type: soft.
pub const LIMIT_TYPE_SOFT: u8 = 1;
/// Peer bandwidth limit type: dynamic.
pub const LIMIT_TYPE_DYNAMIC: u8 = 2;

/// Protocol control message type IDs.
pub const MSG_SET_CHUNK_SIZE: u8 = 1;
pub const MSG_ABORT: u8 = 2;
pub const MSG_ACKNOWLEDGEMENT: u8 = 3;
pub const MSG_USER_CONTROL: u8 = 4;
pub const MSG_WINDOW_ACK_SIZE: u8 = 5;
pub const MSG_SET_PEER_BANDWIDTH: u8 = 6;
pub const MSG_AUDIO: u8 = 8;
pub const MSG_VIDEO: u8 = 9;
pub const MSG_DATA_AMF3: u8 = 15;
pub const MSG_SHARED_OBJECT_AMF3: u8 = 16;
pub const MSG_COMMAND_AMF3: u8 = 17;
pub const MSG_DATA_AMF0: u8 = 18;
pub const MSG_SHARED_OBJECT_AMF0: u8 = 19;
pub const MSG_COMMAND_AMF0: u8 = 20;
pub const MSG_AGGREGATE: u8 = 22;

/// Network/connection-control channel ids used for protocol messages.
pub const CHUNK_STREAM_CONTROL: u32 = 2;
pub const CHUNK_STREAM_COMMAND: u32 = 3;
pub const CHUNK_STREAM_AUDIO: u32 = 4;
pub const CHUNK_STREAM_VIDEO: u32 = 6;

/// `NetConnection` always uses message stream id 0.
pub const STREAM_ID_CONNECTION: u32 = 0;

/// Maximum number of streams a single connection may open, absent an
/// explicit server configuration override.
pub const DEFAULT_MAX_STREAMS_PER_CONNECTION: usize = 8;

/// `AMF` extended-timestamp marker: a 24-bit chunk timestamp field holding
/// this value means the real timestamp follows as an extra 32-bit field.
pub const EXTENDED_TIMESTAMP_MARKER: u32 = 0x00FF_FFFF;

/// User control event types (carried in `MSG_USER_CONTROL` payloads).
pub const USER_CONTROL_STREAM_BEGIN: u16 = 0;
pub const USER_CONTROL_STREAM_EOF: u16 = 1;
pub const USER_CONTROL_STREAM_DRY: u16 = 2;
pub const USER_CONTROL_SET_BUFFER_LENGTH: u16 = 3;
pub const USER_CONTROL_STREAM_IS_RECORDED: u16 = 4;
pub const USER_CONTROL_PING_REQUEST: u16 = 6;
pub const USER_CONTROL_PING_RESPONSE: u16 = 7;
