//! RTP version-2 header per RFC 3550 §5.1.

use bytes::{BufMut, BytesMut};
use rand::Rng;

use super::session::Track;

pub const RTP_VERSION: u8 = 2;

/// Fixed per-track SSRCs, matching the original byte-for-byte rather than
/// drawing one at random: every audio track uses the same SSRC, every
/// video track uses the same (different) SSRC.
pub mod ssrc {
    pub const AUDIO: u32 = 0xceafa03c;
    pub const VIDEO: u32 = 0x52d8e95a;
}

/// RFC 3551 static/dynamic payload types this engine emits.
pub mod payload_type {
    pub const H264: u8 = 96;
    pub const AAC: u8 = 97;
    pub const MPV: u8 = 14;
    pub const MPA: u8 = 15;
}

#[derive(Debug, Clone, Copy)]
pub struct RtpHeader {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    pub fn write(&self, out: &mut BytesMut) {
        let b0 = (RTP_VERSION << 6) & 0xC0;
        out.put_u8(b0);
        out.put_u8((self.marker as u8) << 7 | (self.payload_type & 0x7F));
        out.put_u16(self.sequence_number);
        out.put_u32(self.timestamp);
        out.put_u32(self.ssrc);
    }

    pub const HEADER_LEN: usize = 12;
}

/// Per-track sequence number, SSRC, and clock-rate bookkeeping.
///
/// `ssrc` is a fixed constant per track kind (see [`ssrc`]), matching the
/// original rather than drawing one at random. Only the initial sequence
/// number is randomized, per RFC 3550 §8.1.
pub struct RtpTrackState {
    pub ssrc: u32,
    pub sequence_number: u16,
    pub clock_rate_hz: u32,
    pub payload_type: u8,
}

impl RtpTrackState {
    pub fn new(track: Track, clock_rate_hz: u32, payload_type: u8) -> Self {
        let ssrc = match track {
            Track::Audio => ssrc::AUDIO,
            Track::Video => ssrc::VIDEO,
        };
        Self {
            ssrc,
            sequence_number: rand::rng().random(),
            clock_rate_hz,
            payload_type,
        }
    }

    pub fn next_header(&mut self, timestamp_media_ms: u64, marker: bool) -> RtpHeader {
        let seq = self.sequence_number;
        self.sequence_number = self.sequence_number.wrapping_add(1);
        RtpHeader {
            marker,
            payload_type: self.payload_type,
            sequence_number: seq,
            timestamp: self.media_timestamp_to_rtp(timestamp_media_ms),
            ssrc: self.ssrc,
        }
    }

    /// `ts_media * clock_rate / 1000`, truncated to `u32` (RTP timestamps
    /// wrap, which is expected and fine).
    pub fn media_timestamp_to_rtp(&self, timestamp_media_ms: u64) -> u32 {
        ((timestamp_media_ms as u128 * self.clock_rate_hz as u128) / 1000) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_number_increments_and_wraps() {
        let mut track = RtpTrackState::new(Track::Video, 90_000, payload_type::H264);
        track.sequence_number = u16::MAX;
        let h1 = track.next_header(0, false);
        let h2 = track.next_header(0, false);
        assert_eq!(h1.sequence_number, u16::MAX);
        assert_eq!(h2.sequence_number, 0);
    }

    #[test]
    fn media_timestamp_scales_by_clock_rate() {
        let track = RtpTrackState::new(Track::Video, 90_000, payload_type::H264);
        assert_eq!(track.media_timestamp_to_rtp(1000), 90_000);
    }

    #[test]
    fn ssrc_is_a_fixed_constant_per_track_kind() {
        let audio = RtpTrackState::new(Track::Audio, 44_100, payload_type::AAC);
        let video = RtpTrackState::new(Track::Video, 90_000, payload_type::H264);
        assert_eq!(audio.ssrc, ssrc::AUDIO);
        assert_eq!(video.ssrc, ssrc::VIDEO);
        assert_ne!(audio.ssrc, video.ssrc);
    }

    #[test]
    fn header_serializes_to_twelve_bytes() {
        let header = RtpHeader {
            marker: true,
            payload_type: payload_type::AAC,
            sequence_number: 5,
            timestamp: 1234,
            ssrc: 0xdead_beef,
        };
        let mut out = BytesMut::new();
        header.write(&mut out);
        assert_eq!(out.len(), RtpHeader::HEADER_LEN);
        assert_eq!(out[0] >> 6, RTP_VERSION);
        assert_eq!(out[1] & 0x80, 0x80);
        assert_eq!(out[1] & 0x7F, payload_type::AAC);
    }
}
