//! FLV splitter and serializer.
//!
//! Consumes a byte stream beginning with the FLV signature and yields
//! [`Tag`]s; the first `onMetaData` script tag additionally yields a
//! [`TagKind::MediaInfo`] tag (and a [`TagKind::CuePoints`] tag, if the
//! metadata carries a `cuePoints` array) emitted just before it.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::amf::{self, AmfValue};
use crate::media::flv::{AudioFormat as FlvAudioFormat, FlvTag, FlvTagType, VideoCodec};
use crate::tag::{
    AudioBlock, AudioFormat, FlavourMask, MediaInfo, Tag, TagAttributes, TagKind, VideoBlock, VideoFormat,
};

use super::error::ContainerError;
use super::TagSerializer;

const FLV_SIGNATURE: &[u8; 3] = b"FLV";
const MAX_TAG_SIZE: u32 = 16 * 1024 * 1024;

fn flv_kind_attributes(flv: &FlvTag) -> TagAttributes {
    let mut attrs = TagAttributes::empty();
    match flv.tag_type {
        FlvTagType::Audio => {
            attrs.insert(TagAttributes::AUDIO);
            if flv.is_aac_sequence_header() {
                attrs.insert(TagAttributes::CAN_RESYNC);
            }
        }
        FlvTagType::Video => {
            attrs.insert(TagAttributes::VIDEO);
            if !flv.is_keyframe() {
                attrs.insert(TagAttributes::DROPPABLE);
            }
            if flv.is_avc_sequence_header() {
                attrs.insert(TagAttributes::CAN_RESYNC);
            }
        }
        FlvTagType::Script => {
            attrs.insert(TagAttributes::METADATA);
        }
    }
    attrs
}

fn media_info_from_metadata(object: &AmfValue) -> MediaInfo {
    let mut info = MediaInfo::new();

    let width = object.get("width").and_then(AmfValue::as_number);
    let height = object.get("height").and_then(AmfValue::as_number);
    let video_codec_id = object.get("videocodecid").and_then(AmfValue::as_number);
    if width.is_some() || height.is_some() || video_codec_id.is_some() {
        let format = match video_codec_id.map(|n| n as u32) {
            Some(2) => VideoFormat::H263,
            Some(4) => VideoFormat::Vp6,
            _ => VideoFormat::H264,
        };
        let block = VideoBlock {
            format,
            width: width.unwrap_or(0.0) as u32,
            height: height.unwrap_or(0.0) as u32,
            clock_rate_hz: 90_000,
            frame_rate: object.get("framerate").and_then(AmfValue::as_number).unwrap_or(0.0),
            bitrate_bps: (object.get("videodatarate").and_then(AmfValue::as_number).unwrap_or(0.0) * 1000.0) as u32,
            avcc: None,
            flv_container: true,
            nalu_length_prefixed: true,
        };
        info = info.with_video(block).unwrap_or(info);
    }

    let audio_codec_id = object.get("audiocodecid").and_then(AmfValue::as_number);
    if audio_codec_id.is_some() {
        let format = match audio_codec_id.map(|n| n as u32) {
            Some(2) | Some(14) => AudioFormat::Mp3,
            _ => AudioFormat::Aac,
        };
        let block = AudioBlock {
            format,
            channels: if object.get("stereo").and_then(AmfValue::as_bool).unwrap_or(false) {
                2
            } else {
                1
            },
            sample_rate_hz: object.get("audiosamplerate").and_then(AmfValue::as_number).unwrap_or(0.0) as u32,
            sample_size_bits: object.get("audiosamplesize").and_then(AmfValue::as_number).unwrap_or(16.0) as u8,
            bitrate_bps: (object.get("audiodatarate").and_then(AmfValue::as_number).unwrap_or(0.0) * 1000.0) as u32,
            aac_config: None,
            flv_container: true,
        };
        info = info.with_audio(block).unwrap_or(info);
    }

    info.duration_ms = (object.get("duration").and_then(AmfValue::as_number).unwrap_or(0.0) * 1000.0) as u64;
    info.file_size = object.get("filesize").and_then(AmfValue::as_number).unwrap_or(0.0) as u64;
    info.seekable = true;
    info.pausable = true;
    info
}

/// Incrementally parses an FLV byte stream into tags.
pub struct FlvSplitter {
    buf: BytesMut,
    seen_header: bool,
    seen_metadata: bool,
    flavour_mask: FlavourMask,
}

impl FlvSplitter {
    pub fn new(flavour_mask: FlavourMask) -> Self {
        Self {
            buf: BytesMut::new(),
            seen_header: false,
            seen_metadata: false,
            flavour_mask,
        }
    }

    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Tag>, ContainerError> {
        self.buf.extend_from_slice(data);
        let mut tags = Vec::new();

        if !self.seen_header {
            if self.buf.len() < 9 {
                return Ok(tags);
            }
            if &self.buf[0..3] != FLV_SIGNATURE {
                return Err(ContainerError::BadFlvSignature);
            }
            self.buf.advance(9);
            self.seen_header = true;
            tags.push(Tag::new(
                TagKind::ContainerHeader,
                TagAttributes::empty(),
                self.flavour_mask,
                0,
            ));
        }

        loop {
            // PreviousTagSize0 (or PreviousTagSizeN before each subsequent tag).
            if self.buf.len() < 4 {
                break;
            }
            if self.buf.len() < 4 + 11 {
                break;
            }
            let header = &self.buf[4..4 + 11];
            let tag_type = header[0];
            let size = u32::from_be_bytes([0, header[1], header[2], header[3]]);
            if size > MAX_TAG_SIZE {
                return Err(ContainerError::FlvTagTooLarge(size));
            }
            let ts_lower = u32::from_be_bytes([0, header[4], header[5], header[6]]);
            let ts_upper = header[7] as u32;
            let timestamp = (ts_upper << 24) | ts_lower;

            let total = 4 + 11 + size as usize;
            if self.buf.len() < total {
                break;
            }
            self.buf.advance(4 + 11);
            let body = self.buf.split_to(size as usize).freeze();

            let flv_tag_type = match tag_type {
                8 => FlvTagType::Audio,
                9 => FlvTagType::Video,
                18 => FlvTagType::Script,
                other => {
                    tracing::warn!(tag_type = other, "skipping unknown FLV tag type");
                    continue;
                }
            };
            let flv_tag = FlvTag {
                tag_type: flv_tag_type,
                timestamp,
                data: body.clone(),
            };

            if flv_tag_type == FlvTagType::Script && !self.seen_metadata {
                if let Ok(values) = amf::decode_all(&body) {
                    if values.first().and_then(AmfValue::as_str) == Some("onMetaData") {
                        self.seen_metadata = true;
                        if let Some(object) = values.get(1) {
                            if let Some(cue_points) = object.get("cuePoints") {
                                let payload = amf::encode(cue_points);
                                tags.push(
                                    Tag::new(TagKind::CuePoints, TagAttributes::METADATA.into(), self.flavour_mask, timestamp)
                                        .with_payload(payload),
                                );
                            }
                            let info = media_info_from_metadata(object);
                            tags.push(self.media_info_tag(info, timestamp));
                        }
                    }
                }
            }

            let mut out = Tag::new(TagKind::Flv, flv_kind_attributes(&flv_tag), self.flavour_mask, timestamp)
                .with_payload(body);
            out.learn_attributes();
            tags.push(out);
        }

        Ok(tags)
    }

    fn media_info_tag(&self, info: MediaInfo, timestamp: u32) -> Tag {
        let mut tag = Tag::new(TagKind::MediaInfo, TagAttributes::METADATA.into(), self.flavour_mask, timestamp);
        tag.media_info = Some(info);
        tag
    }
}

/// Writes FLV-file bytes (signature, per-tag headers, previous-tag-size
/// trailer) from a tag sequence.
#[derive(Default)]
pub struct FlvSerializer {
    previous_tag_size: u32,
    wrote_header: bool,
}

impl FlvSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_tag(&mut self, tag_type: u8, timestamp: u32, body: &[u8], out: &mut BytesMut) {
        out.put_u32(self.previous_tag_size);
        out.put_u8(tag_type);
        out.put_uint(body.len() as u64, 3);
        out.put_u8(((timestamp >> 16) & 0xFF) as u8);
        out.put_u8(((timestamp >> 8) & 0xFF) as u8);
        out.put_u8((timestamp & 0xFF) as u8);
        out.put_u8(((timestamp >> 24) & 0xFF) as u8);
        out.put_uint(0, 3); // stream id, always 0
        out.put_slice(body);
        self.previous_tag_size = 11 + body.len() as u32;
    }
}

impl TagSerializer for FlvSerializer {
    fn initialize(&mut self, out: &mut BytesMut) -> Result<(), ContainerError> {
        out.put_slice(FLV_SIGNATURE);
        out.put_u8(1); // version
        out.put_u8(0b0000_0101); // audio + video present; refined per-stream by callers if needed
        out.put_u32(9); // header size
        self.previous_tag_size = 0;
        self.wrote_header = true;
        Ok(())
    }

    fn serialize(&mut self, tag: &Tag, base_timestamp_ms: u32, out: &mut BytesMut) -> Result<bool, ContainerError> {
        let timestamp = base_timestamp_ms.wrapping_add(tag.timestamp_ms);
        let body: &Bytes = match &tag.payload {
            Some(b) => b,
            None => return Ok(false),
        };
        let tag_type = if tag.attributes.contains(TagAttributes::AUDIO) {
            8
        } else if tag.attributes.contains(TagAttributes::VIDEO) {
            9
        } else if matches!(tag.kind, TagKind::MediaInfo) {
            18
        } else {
            return Ok(false);
        };
        self.write_tag(tag_type, timestamp, body, out);
        Ok(true)
    }

    fn finalize(&mut self, _out: &mut BytesMut) -> Result<(), ContainerError> {
        Ok(())
    }
}

// Helpers used by other container submodules to classify raw FLV-codec
// bytes without re-deriving the match arms above.
pub(crate) fn is_avc(flv_tag: &FlvTag) -> bool {
    flv_tag.video_codec() == Some(VideoCodec::Avc)
}

pub(crate) fn is_aac(flv_tag: &FlvTag) -> bool {
    flv_tag.audio_format() == Some(FlvAudioFormat::Aac)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_flv_bytes() -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_slice(FLV_SIGNATURE);
        buf.put_u8(1);
        buf.put_u8(0x05);
        buf.put_u32(9);
        buf.put_u32(0); // PreviousTagSize0

        let body = [0xAFu8, 0x01, 0x21, 0x22];
        buf.put_u8(8); // audio
        buf.put_uint(body.len() as u64, 3);
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_uint(0, 3);
        buf.put_slice(&body);

        buf.to_vec()
    }

    #[test]
    fn splits_header_then_audio_tag() {
        let mut splitter = FlvSplitter::new(FlavourMask::ALL);
        let tags = splitter.feed(&sample_flv_bytes()).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].kind, TagKind::ContainerHeader);
        assert_eq!(tags[1].kind, TagKind::Flv);
        assert!(tags[1].attributes.contains(TagAttributes::AUDIO));
    }

    #[test]
    fn rejects_bad_signature() {
        let mut splitter = FlvSplitter::new(FlavourMask::ALL);
        assert!(splitter.feed(b"NOTFLVxxx").is_err());
    }

    #[test]
    fn feed_across_multiple_calls_reassembles() {
        let bytes = sample_flv_bytes();
        let mut splitter = FlvSplitter::new(FlavourMask::ALL);
        let mut tags = splitter.feed(&bytes[..10]).unwrap();
        tags.extend(splitter.feed(&bytes[10..]).unwrap());
        assert_eq!(tags.len(), 2);
    }
}
