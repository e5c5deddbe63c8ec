//! RTSP method dispatch: the processor an accepted connection drives with
//! each decoded request.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;

use crate::element::ElementMapper;
use crate::tag::MediaInfo;

use super::mount::extract_mount_path;
use super::sdp::generate_sdp;
use super::session::{PlaybackState, Session, SessionManager, Track, TrackTransport};

const ALLOWED_METHODS: &str = "OPTIONS, DESCRIBE, SETUP, PLAY, PAUSE, TEARDOWN, ANNOUNCE, RECORD, GET_PARAMETER, SET_PARAMETER";

use super::message::{Request, Response};

/// Looks up media descriptions for a mount path; implemented by whatever
/// owns the element graph (typically backed by `ElementMapper::describe_media`
/// plus a cached `MediaInfo` per splitting element).
pub trait MediaLookup: Send + Sync {
    fn media_info(&self, path: &str) -> Option<MediaInfo>;
}

pub struct Processor {
    pub sessions: SessionManager,
    pub mapper: Arc<ElementMapper>,
    pub media: Arc<dyn MediaLookup>,
}

impl Processor {
    pub fn new(mapper: Arc<ElementMapper>, media: Arc<dyn MediaLookup>) -> Self {
        Self {
            sessions: SessionManager::new(),
            mapper,
            media,
        }
    }

    pub async fn handle(&self, req: &Request, peer_addr: SocketAddr) -> Response {
        let response = match req.method.as_str() {
            "OPTIONS" => self.options(),
            "DESCRIBE" => self.describe(req),
            "SETUP" => self.setup(req, peer_addr),
            "PLAY" => self.play(req),
            "PAUSE" => self.pause(req),
            "TEARDOWN" => self.teardown(req),
            "ANNOUNCE" | "RECORD" | "REDIRECT" | "GET_PARAMETER" | "SET_PARAMETER" => Response::ok(),
            other => Response::new(501, "Not Implemented").with_header("Allow", ALLOWED_METHODS).tap_unsupported(other),
        };
        response.with_cseq(req)
    }

    fn options(&self) -> Response {
        Response::ok().with_header("Public", ALLOWED_METHODS)
    }

    fn describe(&self, req: &Request) -> Response {
        let path = extract_mount_path(&req.uri);
        let Some(info) = self.media.media_info(&path) else {
            return Response::not_found();
        };
        let sdp = generate_sdp(&req.uri, &info);
        Response::ok().with_body("application/sdp", Bytes::from(sdp))
    }

    fn setup(&self, req: &Request, peer_addr: SocketAddr) -> Response {
        let path = extract_mount_path(&req.uri);
        let Some(transport_header) = req.header("Transport") else {
            return Response::bad_request();
        };

        let existing = req.session_id().and_then(|id| self.sessions.get(id));
        let session = existing.unwrap_or_else(|| {
            let broadcaster = super::broadcaster::Broadcaster::new(Box::new(super::broadcaster::NullSender));
            Arc::new(Session::new(path.clone(), peer_addr, broadcaster))
        });

        let track = if req.uri.contains("trackID=1") { Track::Video } else { Track::Audio };

        if let Some(udp) = parse_udp_transport(transport_header) {
            session.set_transport(
                track,
                TrackTransport::Udp {
                    client_addr: peer_addr,
                    client_rtp_port: udp.0,
                    client_rtcp_port: udp.1,
                },
            );
        } else if let Some((rtp_ch, rtcp_ch)) = parse_interleaved_transport(transport_header) {
            session.set_transport(track, TrackTransport::Interleaved { rtp_channel: rtp_ch, rtcp_channel: rtcp_ch });
        } else {
            return Response::bad_request();
        }

        self.sessions.insert(session.clone());
        Response::ok().with_header("Session", session.id.clone()).with_header("Transport", transport_header.to_string())
    }

    fn play(&self, req: &Request) -> Response {
        let Some(session) = req.session_id().and_then(|id| self.sessions.get(id)) else {
            return Response::new(454, "Session Not Found");
        };
        session.set_state(PlaybackState::Playing);
        Response::ok().with_header("Session", session.id.clone())
    }

    fn pause(&self, req: &Request) -> Response {
        let Some(session) = req.session_id().and_then(|id| self.sessions.get(id)) else {
            return Response::new(454, "Session Not Found");
        };
        session.set_state(PlaybackState::Paused);
        Response::ok()
    }

    fn teardown(&self, req: &Request) -> Response {
        let Some(id) = req.session_id() else {
            return Response::bad_request();
        };
        self.sessions.remove(id);
        Response::ok()
    }
}

trait ResponseExt {
    fn with_cseq(self, req: &Request) -> Response;
    fn tap_unsupported(self, method: &str) -> Response;
}

impl ResponseExt for Response {
    fn with_cseq(self, req: &Request) -> Response {
        match req.cseq() {
            Some(cseq) => self.with_header("CSeq", cseq.to_string()),
            None => self,
        }
    }

    fn tap_unsupported(self, method: &str) -> Response {
        tracing::debug!(method, "unsupported RTSP method");
        self
    }
}

fn parse_udp_transport(header: &str) -> Option<(u16, u16)> {
    if !header.contains("UDP") {
        return None;
    }
    for part in header.split(';') {
        if let Some(ports) = part.trim().strip_prefix("client_port=") {
            let mut it = ports.split('-');
            let rtp: u16 = it.next()?.parse().ok()?;
            let rtcp: u16 = it.next()?.parse().ok()?;
            return Some((rtp, rtcp));
        }
    }
    None
}

fn parse_interleaved_transport(header: &str) -> Option<(u8, u8)> {
    if !header.contains("interleaved") {
        return None;
    }
    for part in header.split(';') {
        if let Some(channels) = part.trim().strip_prefix("interleaved=") {
            let mut it = channels.split('-');
            let rtp: u8 = it.next()?.parse().ok()?;
            let rtcp: u8 = it.next()?.parse().ok()?;
            return Some((rtp, rtcp));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_udp_client_ports() {
        assert_eq!(parse_udp_transport("RTP/AVP/UDP;unicast;client_port=8000-8001"), Some((8000, 8001)));
    }

    #[test]
    fn parses_interleaved_channels() {
        assert_eq!(parse_interleaved_transport("RTP/AVP/TCP;interleaved=0-1"), Some((0, 1)));
    }

    #[test]
    fn rejects_unrecognized_transport() {
        assert_eq!(parse_udp_transport("RTP/AVP/TCP;interleaved=0-1"), None);
    }
}
