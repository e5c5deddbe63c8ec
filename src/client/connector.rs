//! Low-level outgoing RTMP connection: handshake, `connect`/`createStream`,
//! and raw audio/video message sends. [`RtmpPublisher`](super::publisher::RtmpPublisher)
//! and [`RtmpPuller`](super::puller::RtmpPuller) build on top of this.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::amf::{self, AmfValue};
use crate::error::{Error, ProtocolError, Result};
use crate::protocol::chunk::{ChunkReader, ChunkWriter, Message};
use crate::protocol::constants::*;
use crate::protocol::handshake::{Handshake, HandshakeRole};

use super::config::ClientConfig;

/// A connected, `connect`-acknowledged RTMP session ready to create streams
/// and send media.
pub struct RtmpConnector {
    socket: TcpStream,
    reader: ChunkReader,
    writer: ChunkWriter,
    transaction_id: f64,
    stream_id: u32,
    read_buf: [u8; 64 * 1024],
}

impl RtmpConnector {
    /// Dial the server named in `config.url`, perform the handshake, and
    /// send/await `connect`.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let parsed = config.parse_url().ok_or_else(|| {
            Error::Protocol(ProtocolError::UnexpectedMessage("invalid rtmp url".into()))
        })?;

        let socket = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect((parsed.host.as_str(), parsed.port)),
        )
        .await
        .map_err(|_| crate::error::HandshakeError::TimedOut)??;
        socket.set_nodelay(true).ok();

        let mut connector = Self {
            socket,
            reader: ChunkReader::new(DEFAULT_CHUNK_SIZE),
            writer: ChunkWriter::new(config.chunk_size),
            transaction_id: 1.0,
            stream_id: 0,
            read_buf: [0u8; 64 * 1024],
        };

        connector.do_handshake(config.connect_timeout).await?;
        connector.send_connect(&parsed.app, &config).await?;
        connector.await_command_result().await?;
        connector.send_create_stream().await?;
        let stream_id = connector.await_create_stream_result().await?;
        connector.stream_id = stream_id;

        Ok(connector)
    }

    async fn do_handshake(&mut self, timeout: std::time::Duration) -> Result<()> {
        let mut handshake = Handshake::new(HandshakeRole::Client);
        let deadline = tokio::time::Instant::now() + timeout;

        let initial = handshake.generate_initial().expect("client always has an initial packet");
        self.socket.write_all(&initial).await?;

        let mut pending = BytesMut::new();
        while !handshake.is_done() {
            let n = tokio::time::timeout_at(deadline, self.socket.read(&mut self.read_buf))
                .await
                .map_err(|_| crate::error::HandshakeError::TimedOut)??;
            if n == 0 {
                return Err(crate::error::HandshakeError::ConnectionClosed.into());
            }
            pending.extend_from_slice(&self.read_buf[..n]);

            let mut bytes: Bytes = pending.clone().freeze();
            let before = bytes.len();
            if let Some(response) = handshake.process(&mut bytes)? {
                self.socket.write_all(&response).await?;
            }
            let consumed = before - bytes.len();
            let _ = pending.split_to(consumed);
        }
        Ok(())
    }

    async fn send_connect(&mut self, app: &str, config: &ClientConfig) -> Result<()> {
        let mut object = HashMap::new();
        object.insert("app".to_string(), AmfValue::String(app.to_string()));
        object.insert("flashVer".to_string(), AmfValue::String(config.flash_ver.clone()));
        object.insert("tcUrl".to_string(), AmfValue::String(config.url.clone()));
        object.insert("objectEncoding".to_string(), AmfValue::Number(0.0));

        let values = vec![
            AmfValue::String("connect".into()),
            AmfValue::Number(self.transaction_id),
            AmfValue::Object(object),
        ];
        self.transaction_id += 1.0;
        self.send_command(STREAM_ID_CONNECTION, values).await
    }

    async fn send_create_stream(&mut self) -> Result<()> {
        let values = vec![
            AmfValue::String("createStream".into()),
            AmfValue::Number(self.transaction_id),
            AmfValue::Null,
        ];
        self.transaction_id += 1.0;
        self.send_command(STREAM_ID_CONNECTION, values).await
    }

    /// Send `publish` for `stream_name` on the stream id allocated at connect time.
    pub async fn publish(&mut self, stream_name: &str) -> Result<()> {
        let values = vec![
            AmfValue::String("publish".into()),
            AmfValue::Number(self.transaction_id),
            AmfValue::Null,
            AmfValue::String(stream_name.to_string()),
            AmfValue::String("live".into()),
        ];
        self.transaction_id += 1.0;
        self.send_command(self.stream_id, values).await
    }

    /// Send `play` for `stream_name` on the stream id allocated at connect time.
    pub async fn play(&mut self, stream_name: &str) -> Result<()> {
        let values = vec![
            AmfValue::String("play".into()),
            AmfValue::Number(self.transaction_id),
            AmfValue::Null,
            AmfValue::String(stream_name.to_string()),
        ];
        self.transaction_id += 1.0;
        self.send_command(self.stream_id, values).await
    }

    /// Send a raw audio (FLV `AudioTagHeader` + payload) message.
    pub async fn send_audio_data(&mut self, data: Bytes, timestamp: u32) -> Result<()> {
        self.send_media(CHUNK_STREAM_AUDIO, MSG_AUDIO, timestamp, data).await
    }

    /// Send a raw video (FLV `VideoTagHeader` + payload) message.
    pub async fn send_video_data(&mut self, data: Bytes, timestamp: u32) -> Result<()> {
        self.send_media(CHUNK_STREAM_VIDEO, MSG_VIDEO, timestamp, data).await
    }

    /// Read and decode the next reassembled message, blocking on the socket
    /// as needed. Used by [`RtmpPuller`](super::puller::RtmpPuller) to drive
    /// its own event loop on top of this connector.
    pub async fn read_message(&mut self) -> Result<Message> {
        loop {
            let n = self.socket.read(&mut self.read_buf).await?;
            if n == 0 {
                return Err(crate::error::HandshakeError::ConnectionClosed.into());
            }
            let mut messages = self.reader.feed(&self.read_buf[..n])?;
            if !messages.is_empty() {
                return Ok(messages.remove(0));
            }
        }
    }

    async fn send_media(&mut self, csid: u32, type_id: u8, timestamp: u32, payload: Bytes) -> Result<()> {
        let message = Message {
            chunk_stream_id: csid,
            timestamp,
            type_id,
            stream_id: self.stream_id,
            payload,
        };
        let mut out = BytesMut::new();
        self.writer.write(csid, &message, &mut out)?;
        self.socket.write_all(&out).await?;
        Ok(())
    }

    async fn send_command(&mut self, stream_id: u32, values: Vec<AmfValue>) -> Result<()> {
        let payload = amf::encode_all(&values);
        let message = Message {
            chunk_stream_id: CHUNK_STREAM_COMMAND,
            timestamp: 0,
            type_id: MSG_COMMAND_AMF0,
            stream_id,
            payload,
        };
        let mut out = BytesMut::new();
        self.writer.write(CHUNK_STREAM_COMMAND, &message, &mut out)?;
        self.socket.write_all(&out).await?;
        Ok(())
    }

    async fn await_command_result(&mut self) -> Result<Vec<AmfValue>> {
        loop {
            let message = self.read_message().await?;
            if message.type_id == MSG_COMMAND_AMF0 || message.type_id == MSG_COMMAND_AMF3 {
                let values = amf::decode_all(&message.payload)?;
                if values.first().and_then(|v| v.as_str()) == Some("_result") {
                    return Ok(values);
                }
            }
        }
    }

    async fn await_create_stream_result(&mut self) -> Result<u32> {
        let values = self.await_command_result().await?;
        values
            .get(3)
            .and_then(|v| v.as_number())
            .map(|n| n as u32)
            .ok_or_else(|| ProtocolError::MissingArgument("createStream result stream id").into())
    }
}
