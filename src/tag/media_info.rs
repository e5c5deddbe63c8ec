//! [`MediaInfo`]: the descriptor a container decoder produces describing the
//! audio/video streams it found, carried through the pipeline as its own
//! tag kind.

use std::collections::HashMap;

use bytes::Bytes;

use super::error::TagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Aac,
    Mp3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    H263,
    H264,
    Vp6,
}

/// Audio stream description. A [`MediaInfo`] carries at most one.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    pub format: AudioFormat,
    pub channels: u8,
    pub sample_rate_hz: u32,
    pub sample_size_bits: u8,
    pub bitrate_bps: u32,
    /// AudioSpecificConfig bytes, present when `format == Aac`.
    pub aac_config: Option<Bytes>,
    /// Whether samples are delivered FLV-tag-framed (`true`) or as raw
    /// elementary-stream frames (`false`).
    pub flv_container: bool,
}

/// Video stream description. A [`MediaInfo`] carries at most one.
#[derive(Debug, Clone)]
pub struct VideoBlock {
    pub format: VideoFormat,
    pub width: u32,
    pub height: u32,
    pub clock_rate_hz: u32,
    pub frame_rate: f64,
    pub bitrate_bps: u32,
    /// SPS/PPS in AVCDecoderConfigurationRecord form, present when
    /// `format == H264`.
    pub avcc: Option<Bytes>,
    /// Whether samples are delivered FLV-tag-framed (`true`) or as bare MP4
    /// sample data (`false`).
    pub flv_container: bool,
    /// Whether NAL units are length-prefixed (MP4/AVCC style) rather than
    /// Annex-B start-code delimited.
    pub nalu_length_prefixed: bool,
}

/// One entry in a [`MediaInfo`]'s frame index (populated by the F4V/MP4
/// decoder from the MOOV atom; unused by the streaming-only formats).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy)]
pub struct FrameRecord {
    pub frame_type: FrameType,
    pub size: u32,
    pub decoding_timestamp_ms: u32,
    pub composition_offset_ms: i32,
    pub keyframe: bool,
}

/// Descriptor produced by a container decoder on recognizing stream
/// parameters, most commonly from an FLV `onMetaData` tag or an MP4 MOOV
/// atom.
#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    pub audio: Option<AudioBlock>,
    pub video: Option<VideoBlock>,
    pub duration_ms: u64,
    pub file_size: u64,
    pub seekable: bool,
    pub pausable: bool,
    pub frames: Vec<FrameRecord>,
    pub extra: HashMap<String, String>,
    /// Raw MOOV atom bytes, present only when this descriptor came from an
    /// F4V/MP4 source.
    pub moov: Option<Bytes>,
}

impl MediaInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_audio(mut self, audio: AudioBlock) -> Result<Self, TagError> {
        if self.audio.is_some() {
            return Err(TagError::DuplicateAudioBlock);
        }
        self.audio = Some(audio);
        Ok(self)
    }

    pub fn with_video(mut self, video: VideoBlock) -> Result<Self, TagError> {
        if self.video.is_some() {
            return Err(TagError::DuplicateVideoBlock);
        }
        self.video = Some(video);
        Ok(self)
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_audio() -> AudioBlock {
        AudioBlock {
            format: AudioFormat::Aac,
            channels: 2,
            sample_rate_hz: 44_100,
            sample_size_bits: 16,
            bitrate_bps: 128_000,
            aac_config: Some(Bytes::from_static(&[0x12, 0x10])),
            flv_container: true,
        }
    }

    #[test]
    fn rejects_duplicate_audio_block() {
        let info = MediaInfo::new().with_audio(sample_audio()).unwrap();
        assert!(info.with_audio(sample_audio()).is_err());
    }

    #[test]
    fn fresh_info_has_neither_block() {
        let info = MediaInfo::new();
        assert!(!info.has_audio());
        assert!(!info.has_video());
    }
}
