//! Per-connection driver
//!
//! Runs one accepted TCP connection through the handshake, then loops
//! reading chunks, reassembling messages, and dispatching them to either
//! protocol-control handling (chunk size, window ack, user control) or
//! application-level command/media handling via an [`RtmpHandler`].

use std::collections::HashMap;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::amf::{self, AmfValue};
use crate::error::{Error, ProtocolError, Result};
use crate::media::flv::{FlvTag, FlvTagType};
use crate::protocol::chunk::{ChunkReader, ChunkWriter, Message};
use crate::protocol::constants::*;
use crate::protocol::handshake::{Handshake, HandshakeRole};
use crate::protocol::message::{status, Command, ConnectParams};
use crate::protocol::quirks::{CommandSequence, EncoderType};
use crate::registry::{BroadcastFrame, RegistryError, StreamKey, StreamRegistry};
use crate::server::config::ServerConfig;
use crate::server::handler::{Authorization, RtmpHandler};
use crate::session::context::{SessionContext, StreamContext};
use crate::session::state::{SessionPhase, SessionState};
use crate::session::stream::StreamMode;

/// A single accepted RTMP connection, owned by the task spawned for it.
///
/// Generic over the transport so a caller can hand it a plain
/// `tokio::net::TcpStream` or one already wrapped in a TLS stream (e.g.
/// `tokio_rustls::server::TlsStream<TcpStream>`) — this struct only ever
/// reads and writes through the `AsyncRead`/`AsyncWrite` bound, it never
/// assumes the concrete transport.
pub struct Connection<H: RtmpHandler, S> {
    session_id: u64,
    socket: S,
    config: ServerConfig,
    handler: Arc<H>,
    registry: Arc<StreamRegistry>,
    state: SessionState,
    context: SessionContext,
    sequence: CommandSequence,
    reader: ChunkReader,
    writer: ChunkWriter,
    read_buf: [u8; 64 * 1024],
}

impl<H: RtmpHandler, S: AsyncRead + AsyncWrite + Unpin + Send> Connection<H, S> {
    pub fn new(
        session_id: u64,
        socket: S,
        peer_addr: std::net::SocketAddr,
        config: ServerConfig,
        handler: Arc<H>,
        registry: Arc<StreamRegistry>,
    ) -> Self {
        let chunk_size = config.chunk_size;
        Self {
            session_id,
            socket,
            config,
            handler,
            registry,
            state: SessionState::new(session_id, peer_addr),
            context: SessionContext::new(session_id, peer_addr),
            sequence: CommandSequence::new(),
            reader: ChunkReader::new(DEFAULT_CHUNK_SIZE),
            writer: ChunkWriter::new(chunk_size),
            read_buf: [0u8; 64 * 1024],
        }
    }

    /// Drive the connection to completion: handshake, then the message loop.
    pub async fn run(&mut self) -> Result<()> {
        self.do_handshake().await?;
        self.negotiate().await?;

        let result = self.message_loop().await;

        self.teardown().await;
        result
    }

    async fn do_handshake(&mut self) -> Result<()> {
        self.state.start_handshake();
        let mut handshake = Handshake::new(HandshakeRole::Server);
        let mut pending = BytesMut::new();

        let deadline = tokio::time::Instant::now() + self.config.connection_timeout;

        while !handshake.is_done() {
            if let Some(out) = handshake.generate_initial() {
                self.socket.write_all(&out).await?;
            }

            let n = tokio::time::timeout_at(deadline, self.socket.read(&mut self.read_buf))
                .await
                .map_err(|_| crate::error::HandshakeError::TimedOut)??;
            if n == 0 {
                return Err(crate::error::HandshakeError::ConnectionClosed.into());
            }
            pending.extend_from_slice(&self.read_buf[..n]);

            loop {
                let mut bytes: Bytes = pending.clone().freeze();
                let before = bytes.len();
                let response = handshake.process(&mut bytes)?;
                let consumed = before - bytes.len();
                if consumed == 0 && response.is_none() {
                    break;
                }
                pending.advance_to(consumed);

                if let Some(out) = response {
                    self.socket.write_all(&out).await?;
                }
                if handshake.is_done() {
                    break;
                }
            }
        }

        // Anything left over after the handshake is already-buffered chunk data.
        if !pending.is_empty() {
            let leftover = self.reader.feed(&pending)?;
            self.dispatch_messages(leftover).await?;
        }

        self.state.complete_handshake();
        tracing::debug!(session_id = self.session_id, "handshake complete");
        Ok(())
    }

    /// Send the protocol-control handshake tail: window ack size and peer
    /// bandwidth, matching what most encoders expect immediately after the
    /// handshake completes.
    async fn negotiate(&mut self) -> Result<()> {
        self.send_window_ack_size(self.config.window_ack_size).await?;
        self.send_set_peer_bandwidth(self.config.peer_bandwidth, LIMIT_TYPE_DYNAMIC)
            .await?;
        self.send_set_chunk_size(self.config.chunk_size).await?;
        self.state.out_chunk_size = self.config.chunk_size;
        self.writer.set_chunk_size(self.config.chunk_size);
        self.state.phase = SessionPhase::WaitingConnect;
        Ok(())
    }

    async fn message_loop(&mut self) -> Result<()> {
        let mut forwarders: HashMap<u32, JoinHandle<()>> = HashMap::new();
        let (frame_tx, mut frame_rx) = mpsc::channel::<(u32, BroadcastFrame)>(256);

        loop {
            tokio::select! {
                biased;

                read = tokio::time::timeout(self.config.idle_timeout, self.socket.read(&mut self.read_buf)) => {
                    let n = read.map_err(|_| Error::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "idle timeout")))??;
                    if n == 0 {
                        break;
                    }
                    self.state.add_bytes_received(n as u64);
                    let messages = self.reader.feed(&self.read_buf[..n])?;
                    self.dispatch_messages(messages).await?;
                }

                Some((stream_id, frame)) = frame_rx.recv() => {
                    self.send_media_frame(stream_id, frame).await?;
                }
            }

            if self.state.phase == SessionPhase::Closing {
                break;
            }

            // Spawn a forwarder for any stream that just entered Playing mode.
            for (stream_id, stream) in self.state.streams.iter() {
                if stream.mode == StreamMode::Playing && !forwarders.contains_key(stream_id) {
                    let Some(stream_key) = stream.stream_key.as_ref() else {
                        continue;
                    };
                    let key = self.stream_key(stream_key);
                    if let Ok((rx, catchup)) = self.registry.subscribe(&key).await {
                        for frame in catchup {
                            self.send_media_frame(*stream_id, frame).await?;
                        }
                        forwarders.insert(*stream_id, spawn_forwarder(*stream_id, rx, frame_tx.clone()));
                    }
                }
            }

            // Drop forwarders for streams that stopped playing or closed.
            forwarders.retain(|stream_id, handle| {
                let still_playing = self
                    .state
                    .get_stream(*stream_id)
                    .map(|s| s.mode == StreamMode::Playing)
                    .unwrap_or(false);
                if !still_playing {
                    handle.abort();
                }
                still_playing
            });
        }

        for (_, handle) in forwarders {
            handle.abort();
        }
        Ok(())
    }

    async fn dispatch_messages(&mut self, messages: Vec<Message>) -> Result<()> {
        for message in messages {
            self.dispatch_message(message).await?;
        }
        Ok(())
    }

    async fn dispatch_message(&mut self, message: Message) -> Result<()> {
        match message.type_id {
            MSG_SET_CHUNK_SIZE => {
                if message.payload.len() < 4 {
                    return Err(ProtocolError::MessageTooLarge(0).into());
                }
                let size = u32::from_be_bytes(message.payload[..4].try_into().unwrap()) & 0x7FFF_FFFF;
                self.state.in_chunk_size = size.max(1);
                self.reader.set_chunk_size(self.state.in_chunk_size);
            }
            MSG_ACKNOWLEDGEMENT | MSG_ABORT | MSG_WINDOW_ACK_SIZE | MSG_USER_CONTROL => {
                // Peer-originated protocol control; nothing to do for a
                // leniently-configured server beyond having parsed it.
            }
            MSG_COMMAND_AMF0 | MSG_COMMAND_AMF3 => {
                self.handle_command(message).await?;
            }
            MSG_DATA_AMF0 | MSG_DATA_AMF3 => {
                self.handle_data(message).await?;
            }
            MSG_AUDIO => {
                self.handle_media(message, FlvTagType::Audio).await?;
            }
            MSG_VIDEO => {
                self.handle_media(message, FlvTagType::Video).await?;
            }
            other => {
                tracing::trace!(session_id = self.session_id, type_id = other, "ignoring message type");
            }
        }

        if self.state.add_bytes_received(0) {
            self.send_acknowledgement().await?;
        }
        Ok(())
    }

    async fn handle_command(&mut self, message: Message) -> Result<()> {
        let values = amf::decode_all(&message.payload)?;
        let mut iter = values.into_iter();

        let name = iter
            .next()
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .ok_or(ProtocolError::MissingArgument("command name"))?;
        let transaction_id = iter.next().and_then(|v| v.as_number()).unwrap_or(0.0);
        let command_object = iter.next().unwrap_or(AmfValue::Null);
        let arguments: Vec<AmfValue> = iter.collect();

        let cmd = Command {
            name: name.clone(),
            transaction_id,
            command_object,
            arguments,
            stream_id: message.stream_id,
        };

        if !self.config_allows(&cmd) {
            tracing::warn!(session_id = self.session_id, command = %name, "command rejected by quirks policy");
            return Ok(());
        }
        self.sequence.on_command(&name);

        match name.as_str() {
            "connect" => self.handle_connect(cmd).await,
            "createStream" => self.handle_create_stream(cmd).await,
            "publish" => self.handle_publish(cmd).await,
            "play" => self.handle_play(cmd).await,
            "deleteStream" | "closeStream" | "FCUnpublish" => self.handle_close_stream(cmd).await,
            "pause" => self.handle_pause(cmd).await,
            "releaseStream" | "FCPublish" => Ok(()), // acknowledged implicitly
            _ => {
                tracing::trace!(session_id = self.session_id, command = %name, "unhandled command");
                Ok(())
            }
        }
    }

    fn config_allows(&self, cmd: &Command) -> bool {
        self.sequence.is_valid_command(cmd) || self.config.quirks.allow_early_commands
    }

    async fn handle_connect(&mut self, cmd: Command) -> Result<()> {
        let params = ConnectParams::from_command_object(&cmd.command_object);
        let encoder_type = params
            .flash_ver
            .as_deref()
            .map(EncoderType::from_flash_ver)
            .unwrap_or(EncoderType::Unknown);

        self.context.with_connect(params.clone(), encoder_type);
        self.state.on_connect(params, encoder_type);

        let authorized = self.handler.on_connect(&self.context).await?;
        if authorized != Authorization::Allow {
            self.send_connect_result(cmd.transaction_id, false).await?;
            self.state.close();
            return Ok(());
        }

        self.send_connect_result(cmd.transaction_id, true).await
    }

    async fn handle_create_stream(&mut self, cmd: Command) -> Result<()> {
        let stream_id = self.state.allocate_stream_id();
        self.send_command_result(
            STREAM_ID_CONNECTION,
            cmd.transaction_id,
            vec![AmfValue::Number(stream_id as f64)],
        )
        .await
    }

    async fn handle_publish(&mut self, cmd: Command) -> Result<()> {
        let Some(stream_name) = cmd.stream_name().map(|s| s.to_string()) else {
            return Err(ProtocolError::MissingArgument("publish stream name").into());
        };
        let publish_type = cmd
            .arg(1)
            .and_then(|v| v.as_str())
            .unwrap_or("live")
            .to_string();

        let stream_id = cmd.stream_id;
        if let Some(stream) = self.state.get_stream_mut(stream_id) {
            stream.start_publish(stream_name.clone(), publish_type);
        }

        let key = self.stream_key(&stream_name);
        let stream_ctx = self.stream_context(stream_id, stream_name.clone(), true);

        let authorized = self.handler.on_publish(&stream_ctx).await?;
        if authorized != Authorization::Allow {
            self.send_on_status(stream_id, status::LEVEL_ERROR, status::NET_STREAM_PUBLISH_BAD_NAME, "publish rejected")
                .await?;
            return Ok(());
        }

        match self.registry.register_publisher(&key, self.session_id).await {
            Ok(()) => {
                self.send_on_status(stream_id, status::LEVEL_STATUS, status::NET_STREAM_PUBLISH_START, "publish start")
                    .await
            }
            Err(RegistryError::StreamAlreadyPublishing(_)) => {
                self.send_on_status(stream_id, status::LEVEL_ERROR, status::NET_STREAM_PUBLISH_BAD_NAME, "stream already published")
                    .await
            }
            Err(e) => Err(Error::Registry(e)),
        }
    }

    async fn handle_play(&mut self, cmd: Command) -> Result<()> {
        let Some(stream_name) = cmd.stream_name().map(|s| s.to_string()) else {
            return Err(ProtocolError::MissingArgument("play stream name").into());
        };
        let stream_id = cmd.stream_id;
        let key = self.stream_key(&stream_name);

        if !self.registry.stream_exists(&key).await {
            self.send_on_status(stream_id, status::LEVEL_ERROR, status::NET_STREAM_PLAY_STREAM_NOT_FOUND, "stream not found")
                .await?;
            return Ok(());
        }

        let stream_ctx = self.stream_context(stream_id, stream_name.clone(), false);
        let authorized = self.handler.on_play(&stream_ctx).await?;
        if authorized != Authorization::Allow {
            self.send_on_status(stream_id, status::LEVEL_ERROR, status::NET_STREAM_PLAY_STREAM_NOT_FOUND, "play rejected")
                .await?;
            return Ok(());
        }

        if let Some(stream) = self.state.get_stream_mut(stream_id) {
            stream.start_play(stream_name);
        }

        self.send_user_control(USER_CONTROL_STREAM_BEGIN, stream_id as u16, None).await?;
        self.send_on_status(stream_id, status::LEVEL_STATUS, status::NET_STREAM_PLAY_RESET, "play reset").await?;
        self.send_on_status(stream_id, status::LEVEL_STATUS, status::NET_STREAM_PLAY_START, "play start").await
    }

    async fn handle_pause(&mut self, cmd: Command) -> Result<()> {
        let paused = cmd.arg(0).and_then(|v| v.as_bool()).unwrap_or(true);
        let stream_id = cmd.stream_id;
        if paused {
            self.send_on_status(stream_id, status::LEVEL_STATUS, status::NET_STREAM_PAUSE_NOTIFY, "paused").await
        } else {
            self.send_on_status(stream_id, status::LEVEL_STATUS, status::NET_STREAM_UNPAUSE_NOTIFY, "unpaused").await
        }
    }

    async fn handle_close_stream(&mut self, cmd: Command) -> Result<()> {
        let stream_id = cmd.stream_id;
        if let Some(stream) = self.state.remove_stream(stream_id) {
            if let Some(stream_key) = stream.stream_key.clone() {
                let key = self.stream_key(&stream_key);
                if stream.is_publishing() {
                    self.registry.unregister_publisher(&key, self.session_id).await;
                } else if stream.is_playing() {
                    self.registry.unsubscribe(&key).await;
                }
                let ctx = self.stream_context(stream_id, stream_key, stream.is_publishing());
                self.handler.on_stream_close(&ctx).await?;
            }
        }
        Ok(())
    }

    async fn handle_data(&mut self, message: Message) -> Result<()> {
        let stream_id = message.stream_id;
        let Some(stream) = self.state.get_stream(stream_id) else {
            return Ok(());
        };
        if !stream.is_publishing() {
            return Ok(());
        }
        let Some(stream_key) = stream.stream_key.clone() else {
            return Ok(());
        };

        let values = amf::decode_all(&message.payload)?;
        let is_metadata = values
            .first()
            .and_then(|v| v.as_str())
            .map(|s| s == "onMetaData" || s == "@setDataFrame")
            .unwrap_or(false);

        if is_metadata {
            if let Some(stream) = self.state.get_stream_mut(stream_id) {
                stream.on_metadata();
            }
            let key = self.stream_key(&stream_key);
            self.registry.broadcast(&key, BroadcastFrame::metadata(message.payload.clone())).await;
            let ctx = self.stream_context(stream_id, stream_key, true);
            self.handler.on_metadata(&ctx, message.payload).await?;
        }
        Ok(())
    }

    async fn handle_media(&mut self, message: Message, kind: FlvTagType) -> Result<()> {
        let stream_id = message.stream_id;
        let Some(stream) = self.state.get_stream(stream_id) else {
            return Ok(());
        };
        if !stream.is_publishing() {
            return Ok(());
        }
        let Some(stream_key) = stream.stream_key.clone() else {
            return Ok(());
        };

        let tag = FlvTag {
            tag_type: kind,
            timestamp: message.timestamp,
            data: message.payload.clone(),
        };
        let frame = BroadcastFrame::from_flv_tag(&tag);

        if let Some(stream) = self.state.get_stream_mut(stream_id) {
            match kind {
                FlvTagType::Video => stream.on_video(message.timestamp, frame.is_keyframe, frame.is_header, message.payload.len()),
                FlvTagType::Audio => stream.on_audio(message.timestamp, frame.is_header, message.payload.len()),
                FlvTagType::Script => {}
            }
        }

        let key = self.stream_key(&stream_key);
        self.registry.broadcast(&key, frame).await;

        let ctx = self.stream_context(stream_id, stream_key, true);
        match kind {
            FlvTagType::Video => self.handler.on_video(&ctx, message.timestamp, message.payload).await,
            FlvTagType::Audio => self.handler.on_audio(&ctx, message.timestamp, message.payload).await,
            FlvTagType::Script => Ok(()),
        }
    }

    async fn send_media_frame(&mut self, stream_id: u32, frame: BroadcastFrame) -> Result<()> {
        use crate::registry::FrameType;
        let (type_id, csid) = match frame.frame_type {
            FrameType::Video => (MSG_VIDEO, CHUNK_STREAM_VIDEO),
            FrameType::Audio => (MSG_AUDIO, CHUNK_STREAM_AUDIO),
            FrameType::Metadata => (MSG_DATA_AMF0, CHUNK_STREAM_COMMAND),
        };
        let message = Message {
            chunk_stream_id: csid,
            timestamp: frame.timestamp,
            type_id,
            stream_id,
            payload: frame.data,
        };
        self.write_message(csid, &message).await
    }

    fn stream_key(&self, name: &str) -> StreamKey {
        let app = self.context.app.clone();
        StreamKey::new(app, name.to_string())
    }

    fn stream_context(&self, stream_id: u32, stream_key: String, is_publishing: bool) -> StreamContext {
        StreamContext::new(self.context.clone(), stream_id, stream_key, is_publishing)
    }

    async fn teardown(&mut self) {
        for (_, stream) in self.state.streams.iter() {
            if let Some(stream_key) = stream.stream_key.clone() {
                let key = self.stream_key(&stream_key);
                if stream.is_publishing() {
                    self.registry.unregister_publisher(&key, self.session_id).await;
                } else if stream.is_playing() {
                    self.registry.unsubscribe(&key).await;
                }
            }
        }
        let _ = self.handler.on_disconnect(&self.context).await;
    }

    // -- outgoing protocol helpers --------------------------------------

    async fn write_message(&mut self, csid: u32, message: &Message) -> Result<()> {
        let mut out = BytesMut::new();
        self.writer.write(csid, message, &mut out)?;
        self.socket.write_all(&out).await?;
        self.state.bytes_sent += out.len() as u64;
        Ok(())
    }

    async fn send_set_chunk_size(&mut self, size: u32) -> Result<()> {
        let mut payload = BytesMut::with_capacity(4);
        payload.extend_from_slice(&size.to_be_bytes());
        self.write_control(MSG_SET_CHUNK_SIZE, payload.freeze()).await
    }

    async fn send_window_ack_size(&mut self, size: u32) -> Result<()> {
        let mut payload = BytesMut::with_capacity(4);
        payload.extend_from_slice(&size.to_be_bytes());
        self.write_control(MSG_WINDOW_ACK_SIZE, payload.freeze()).await
    }

    async fn send_set_peer_bandwidth(&mut self, size: u32, limit_type: u8) -> Result<()> {
        let mut payload = BytesMut::with_capacity(5);
        payload.extend_from_slice(&size.to_be_bytes());
        payload.extend_from_slice(&[limit_type]);
        self.write_control(MSG_SET_PEER_BANDWIDTH, payload.freeze()).await
    }

    async fn send_acknowledgement(&mut self) -> Result<()> {
        self.state.mark_ack_sent();
        let mut payload = BytesMut::with_capacity(4);
        payload.extend_from_slice(&(self.state.bytes_received as u32).to_be_bytes());
        self.write_control(MSG_ACKNOWLEDGEMENT, payload.freeze()).await
    }

    async fn send_user_control(&mut self, event_type: u16, stream_id: u16, extra: Option<u32>) -> Result<()> {
        let mut payload = BytesMut::with_capacity(6);
        payload.extend_from_slice(&event_type.to_be_bytes());
        payload.extend_from_slice(&(stream_id as u32).to_be_bytes());
        if let Some(extra) = extra {
            payload.extend_from_slice(&extra.to_be_bytes());
        }
        self.write_control(MSG_USER_CONTROL, payload.freeze()).await
    }

    async fn write_control(&mut self, type_id: u8, payload: Bytes) -> Result<()> {
        let message = Message {
            chunk_stream_id: CHUNK_STREAM_CONTROL,
            timestamp: 0,
            type_id,
            stream_id: STREAM_ID_CONNECTION,
            payload,
        };
        self.write_message(CHUNK_STREAM_CONTROL, &message).await
    }

    async fn send_connect_result(&mut self, transaction_id: f64, success: bool) -> Result<()> {
        let mut properties = std::collections::HashMap::new();
        properties.insert("fmsVer".to_string(), AmfValue::String("FMS/3,0,1,123".into()));
        properties.insert("capabilities".to_string(), AmfValue::Number(31.0));

        let mut info = std::collections::HashMap::new();
        info.insert("level".to_string(), AmfValue::String(status::LEVEL_STATUS.into()));
        info.insert(
            "code".to_string(),
            AmfValue::String(
                if success {
                    status::NET_CONNECTION_CONNECT_SUCCESS
                } else {
                    status::NET_CONNECTION_CONNECT_REJECTED
                }
                .into(),
            ),
        );
        info.insert("description".to_string(), AmfValue::String("Connection succeeded.".into()));

        let values = vec![
            AmfValue::String("_result".into()),
            AmfValue::Number(transaction_id),
            AmfValue::Object(properties),
            AmfValue::Object(info),
        ];
        self.send_command_values(STREAM_ID_CONNECTION, values).await
    }

    async fn send_command_result(&mut self, stream_id: u32, transaction_id: f64, arguments: Vec<AmfValue>) -> Result<()> {
        let mut values = vec![
            AmfValue::String("_result".into()),
            AmfValue::Number(transaction_id),
            AmfValue::Null,
        ];
        values.extend(arguments);
        self.send_command_values(stream_id, values).await
    }

    async fn send_on_status(&mut self, stream_id: u32, level: &str, code: &str, description: &str) -> Result<()> {
        let mut info = std::collections::HashMap::new();
        info.insert("level".to_string(), AmfValue::String(level.into()));
        info.insert("code".to_string(), AmfValue::String(code.into()));
        info.insert("description".to_string(), AmfValue::String(description.into()));

        let values = vec![
            AmfValue::String("onStatus".into()),
            AmfValue::Number(0.0),
            AmfValue::Null,
            AmfValue::Object(info),
        ];
        self.send_command_values(stream_id, values).await
    }

    async fn send_command_values(&mut self, stream_id: u32, values: Vec<AmfValue>) -> Result<()> {
        let payload = amf::encode_all(&values);
        let message = Message {
            chunk_stream_id: CHUNK_STREAM_COMMAND,
            timestamp: 0,
            type_id: MSG_COMMAND_AMF0,
            stream_id,
            payload,
        };
        self.write_message(CHUNK_STREAM_COMMAND, &message).await
    }
}

/// Forward every frame a subscription receives into the connection's frame
/// channel, tagged with its message stream id. Runs as its own task so a
/// slow or lagging subscriber never blocks the socket read loop; dropped via
/// `JoinHandle::abort` once the stream stops playing.
fn spawn_forwarder(
    stream_id: u32,
    mut rx: tokio::sync::broadcast::Receiver<BroadcastFrame>,
    tx: mpsc::Sender<(u32, BroadcastFrame)>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(frame) => {
                    if tx.send((stream_id, frame)).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(stream_id, skipped, "subscriber lagged, frames dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

trait BytesMutExt {
    fn advance_to(&mut self, n: usize);
}

impl BytesMutExt for BytesMut {
    fn advance_to(&mut self, n: usize) {
        let _ = self.split_to(n);
    }
}
