//! Minimal SDP (RFC 4566) generation for `DESCRIBE` responses.

use crate::tag::{AudioFormat, MediaInfo, VideoFormat};

/// Build an SDP body describing `info`'s audio/video tracks, reachable at
/// `session_uri`.
pub fn generate_sdp(session_uri: &str, info: &MediaInfo) -> String {
    let mut sdp = String::new();
    sdp.push_str("v=0\r\n");
    sdp.push_str("o=- 0 0 IN IP4 0.0.0.0\r\n");
    sdp.push_str("s=stream\r\n");
    sdp.push_str(&format!("a=control:{session_uri}\r\n"));

    if let Some(video) = &info.video {
        let (payload_type, encoding, clock_rate) = match video.format {
            VideoFormat::H264 => (96, "H264", video.clock_rate_hz.max(90_000)),
            VideoFormat::H263 => (34, "H263", 90_000),
            VideoFormat::Vp6 => (96, "VP6", 90_000),
        };
        sdp.push_str(&format!("m=video 0 RTP/AVP {payload_type}\r\n"));
        sdp.push_str(&format!("a=rtpmap:{payload_type} {encoding}/{clock_rate}\r\n"));
        sdp.push_str("a=control:trackID=1\r\n");
    }

    if let Some(audio) = &info.audio {
        let (payload_type, encoding) = match audio.format {
            AudioFormat::Aac => (97, "MPEG4-GENERIC"),
            AudioFormat::Mp3 => (14, "MPA"),
        };
        sdp.push_str(&format!("m=audio 0 RTP/AVP {payload_type}\r\n"));
        sdp.push_str(&format!(
            "a=rtpmap:{payload_type} {encoding}/{}/{}\r\n",
            audio.sample_rate_hz, audio.channels
        ));
        sdp.push_str("a=control:trackID=0\r\n");
    }

    sdp
}
