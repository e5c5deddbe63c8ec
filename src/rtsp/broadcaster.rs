//! Given a sender and the media-info-derived SDP, selects packetizers,
//! maintains per-track RTP state, and turns media frames into RTP packets.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::tag::{AudioFormat, MediaInfo, VideoFormat};

use super::message::write_interleaved;
use super::packetizer::{GenericSplitPacketizer, H263Packetizer, H264Packetizer, Mp3Packetizer, Mp4APacketizer, Packetizer};
use super::rtp::{payload_type, RtpTrackState};
use super::session::Track;

/// Minimum gap between consecutive "dropped RTP frame" log lines, so a
/// socket wedged for a long stretch logs once every five seconds instead
/// of once per packet.
const DROP_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Destination for finished RTP packets: a UDP socket or the RTSP
/// connection's interleaved channel.
pub trait Sender: Send {
    fn send(&mut self, track: Track, payload: &[u8]);
}

/// Placeholder sender installed when a session is created at SETUP time,
/// before its real transport (UDP or interleaved) is known.
pub struct NullSender;

impl Sender for NullSender {
    fn send(&mut self, _track: Track, _payload: &[u8]) {}
}

/// Tracks send failures and throttles the log line to at most one per
/// [`DROP_LOG_INTERVAL`], regardless of how fast packets are dropped.
#[derive(Default)]
struct DropCounter {
    dropped: AtomicU64,
    last_logged: Mutex<Option<Instant>>,
}

impl DropCounter {
    fn note_drop(&self, track: Track, reason: &str) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        let mut last_logged = self.last_logged.lock().unwrap();
        let now = Instant::now();
        if last_logged.map(|at| now.duration_since(at) >= DROP_LOG_INTERVAL).unwrap_or(true) {
            tracing::warn!(?track, total, reason, "dropping RTP packets");
            *last_logged = Some(now);
        }
    }
}

/// Sends RTP packets over a UDP socket to a fixed peer address. One
/// instance covers a single track; audio and video each get their own
/// socket and destination port, per RFC 2326 `client_port`.
pub struct UdpSender {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    drops: DropCounter,
}

impl UdpSender {
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self {
            socket,
            peer,
            drops: DropCounter::default(),
        }
    }
}

impl Sender for UdpSender {
    fn send(&mut self, track: Track, payload: &[u8]) {
        match self.socket.try_send_to(payload, self.peer) {
            Ok(_) => {}
            Err(_) => self.drops.note_drop(track, "udp send failed"),
        }
    }
}

/// Sends RTP packets as interleaved binary frames on the RTSP TCP
/// connection, via a channel to the connection's single writer task (the
/// connection owns the socket; many sessions may share it).
pub struct InterleavedSender {
    tx: mpsc::UnboundedSender<BytesMut>,
    audio_channel: u8,
    video_channel: u8,
    drops: DropCounter,
}

impl InterleavedSender {
    pub fn new(tx: mpsc::UnboundedSender<BytesMut>, audio_channel: u8, video_channel: u8) -> Self {
        Self {
            tx,
            audio_channel,
            video_channel,
            drops: DropCounter::default(),
        }
    }
}

impl Sender for InterleavedSender {
    fn send(&mut self, track: Track, payload: &[u8]) {
        let channel = match track {
            Track::Audio => self.audio_channel,
            Track::Video => self.video_channel,
        };
        let mut framed = BytesMut::with_capacity(4 + payload.len());
        write_interleaved(channel, payload, &mut framed);
        if self.tx.send(framed).is_err() {
            self.drops.note_drop(track, "interleaved channel closed");
        }
    }
}

struct TrackState {
    packetizer: Box<dyn Packetizer>,
    rtp: RtpTrackState,
}

/// Owns one [`Sender`] and up to one audio and one video track's RTP state.
pub struct Broadcaster {
    sender: Box<dyn Sender>,
    audio: Option<TrackState>,
    video: Option<TrackState>,
    on_end_of_stream: Option<Box<dyn FnMut() + Send>>,
}

impl Broadcaster {
    pub fn new(sender: Box<dyn Sender>) -> Self {
        Self {
            sender,
            audio: None,
            video: None,
            on_end_of_stream: None,
        }
    }

    pub fn configure(&mut self, info: &MediaInfo) {
        if let Some(video) = &info.video {
            let (payload_type, packetizer): (u8, Box<dyn Packetizer>) = match video.format {
                VideoFormat::H264 => (
                    payload_type::H264,
                    Box::new(H264Packetizer { flv_container: video.flv_container }),
                ),
                VideoFormat::H263 => (34, Box::new(H263Packetizer)),
                VideoFormat::Vp6 => (payload_type::H264, Box::new(GenericSplitPacketizer)),
            };
            self.video = Some(TrackState {
                packetizer,
                rtp: RtpTrackState::new(Track::Video, video.clock_rate_hz, payload_type),
            });
        }

        if let Some(audio) = &info.audio {
            let (payload_type, packetizer): (u8, Box<dyn Packetizer>) = match audio.format {
                AudioFormat::Aac => (payload_type::AAC, Box::new(Mp4APacketizer)),
                AudioFormat::Mp3 => (payload_type::MPA, Box::new(Mp3Packetizer)),
            };
            self.audio = Some(TrackState {
                packetizer,
                rtp: RtpTrackState::new(Track::Audio, audio.sample_rate_hz, payload_type),
            });
        }
    }

    pub fn set_end_of_stream_callback(&mut self, cb: Box<dyn FnMut() + Send>) {
        self.on_end_of_stream = Some(cb);
    }

    /// Packetize one media frame and send every resulting RTP packet.
    /// Video frames mark the last fragment; audio marks every fragment.
    pub fn send_frame(&mut self, track: Track, frame: &[u8], timestamp_media_ms: u64, mtu: usize) {
        let state = match track {
            Track::Audio => &mut self.audio,
            Track::Video => &mut self.video,
        };
        let Some(state) = state else { return };

        let fragments = match state.packetizer.packetize(frame, mtu) {
            Ok(f) => f,
            Err(_) => {
                if let Some(cb) = &mut self.on_end_of_stream {
                    cb();
                }
                return;
            }
        };

        for fragment in fragments {
            let marker = match track {
                Track::Audio => true,
                Track::Video => fragment.marker,
            };
            let header = state.rtp.next_header(timestamp_media_ms, marker);
            let mut packet = BytesMut::with_capacity(12 + fragment.payload.len());
            header.write(&mut packet);
            packet.extend_from_slice(&fragment.payload);
            self.sender.send(track, &packet);
        }
    }

    pub fn end_of_stream(&mut self) {
        if let Some(cb) = &mut self.on_end_of_stream {
            cb();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingSender(Arc<Mutex<Vec<(Track, Vec<u8>)>>>);
    impl Sender for RecordingSender {
        fn send(&mut self, track: Track, payload: &[u8]) {
            self.0.lock().unwrap().push((track, payload.to_vec()));
        }
    }

    #[test]
    fn configures_tracks_and_sends_rtp_packets() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let mut broadcaster = Broadcaster::new(Box::new(RecordingSender(received.clone())));

        let mut info = MediaInfo::new();
        info = info
            .with_audio(crate::tag::AudioBlock {
                format: AudioFormat::Aac,
                channels: 2,
                sample_rate_hz: 44_100,
                sample_size_bits: 16,
                bitrate_bps: 128_000,
                aac_config: None,
                flv_container: false,
            })
            .unwrap();
        broadcaster.configure(&info);

        broadcaster.send_frame(Track::Audio, &[1, 2, 3], 1000, 1460);
        let packets = received.lock().unwrap();
        assert_eq!(packets.len(), 1);
        assert!(packets[0].1.len() > 12);
    }

    #[test]
    fn sending_to_unconfigured_track_is_a_no_op() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let mut broadcaster = Broadcaster::new(Box::new(RecordingSender(received.clone())));
        broadcaster.send_frame(Track::Video, &[1, 2, 3], 0, 1460);
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn interleaved_sender_frames_payload_on_the_configured_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sender = InterleavedSender::new(tx, 0, 2);
        sender.send(Track::Video, &[9, 9, 9]);

        let framed = rx.recv().await.unwrap();
        assert_eq!(framed[0], super::super::message::INTERLEAVED_MAGIC);
        assert_eq!(framed[1], 2);
        assert_eq!(&framed[4..], &[9, 9, 9]);
    }

    #[test]
    fn interleaved_sender_counts_a_drop_when_the_channel_is_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut sender = InterleavedSender::new(tx, 0, 2);
        sender.send(Track::Audio, &[1]);
        assert_eq!(sender.drops.dropped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn udp_sender_delivers_to_the_bound_peer() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());

        let mut sender = UdpSender::new(client, server_addr);
        sender.send(Track::Audio, &[1, 2, 3]);

        let mut buf = [0u8; 16];
        let (len, _) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[1, 2, 3]);
    }
}
