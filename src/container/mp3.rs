//! MPEG-1 Layer III (MP3) elementary-stream splitter. Each tag is one frame;
//! timestamps are computed from the running sample count (1152 samples per
//! MPEG-1 Layer III frame) and the frame's sample rate.

use bytes::{Buf, BytesMut};

use crate::tag::{FlavourMask, Tag, TagAttributes, TagKind};

use super::error::ContainerError;

const BITRATES_KBPS: [u32; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];
const SAMPLE_RATES: [u32; 3] = [44100, 48000, 32000];
const SAMPLES_PER_FRAME: u32 = 1152;

pub struct Mp3Splitter {
    buf: BytesMut,
    samples_emitted: u64,
    flavour_mask: FlavourMask,
}

impl Mp3Splitter {
    pub fn new(flavour_mask: FlavourMask) -> Self {
        Self {
            buf: BytesMut::new(),
            samples_emitted: 0,
            flavour_mask,
        }
    }

    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Tag>, ContainerError> {
        self.buf.extend_from_slice(data);
        let mut tags = Vec::new();

        loop {
            if self.buf.len() < 4 {
                break;
            }
            if self.buf[0] != 0xFF || (self.buf[1] & 0xE0) != 0xE0 {
                return Err(ContainerError::BadMp3Header);
            }
            let layer_bits = (self.buf[1] >> 1) & 0x03;
            if layer_bits != 0x01 {
                // Only Layer III is handled; anything else is not a splitter
                // concern in this scope.
                return Err(ContainerError::BadMp3Header);
            }
            let bitrate_index = (self.buf[2] >> 4) & 0x0F;
            let sample_rate_index = (self.buf[2] >> 2) & 0x03;
            let padding = (self.buf[2] >> 1) & 0x01;
            let bitrate_kbps = BITRATES_KBPS[bitrate_index as usize];
            let sample_rate = *SAMPLE_RATES
                .get(sample_rate_index as usize)
                .ok_or(ContainerError::BadMp3Header)?;
            if bitrate_kbps == 0 {
                return Err(ContainerError::BadMp3Header);
            }

            let frame_length = (144 * bitrate_kbps * 1000 / sample_rate) + padding as u32;
            if (self.buf.len() as u32) < frame_length {
                break;
            }

            let timestamp_ms = (self.samples_emitted * 1000 / sample_rate as u64) as u32;
            let body = self.buf.split_to(frame_length as usize).freeze();

            let mut tag = Tag::new(TagKind::Mp3, TagAttributes::empty(), self.flavour_mask, timestamp_ms)
                .with_payload(body);
            tag.attributes.insert(TagAttributes::AUDIO);
            tag.attributes.insert(TagAttributes::CAN_RESYNC);
            tags.push(tag);

            self.samples_emitted += SAMPLES_PER_FRAME as u64;
        }

        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp3_frame_128kbps_44100(payload_len: usize) -> Vec<u8> {
        let frame_length = 144 * 128 * 1000 / 44100;
        let mut frame = vec![0xFFu8, 0xFB, (9 << 4) | (0 << 2), 0x00];
        frame.extend(std::iter::repeat(0u8).take(frame_length as usize - 4 + payload_len.min(0)));
        frame
    }

    #[test]
    fn splits_single_frame() {
        let mut splitter = Mp3Splitter::new(FlavourMask::ALL);
        let frame = mp3_frame_128kbps_44100(0);
        let tags = splitter.feed(&frame).unwrap();
        assert_eq!(tags.len(), 1);
        assert!(tags[0].attributes.contains(TagAttributes::AUDIO));
    }

    #[test]
    fn rejects_bad_sync() {
        let mut splitter = Mp3Splitter::new(FlavourMask::ALL);
        assert!(splitter.feed(&[0x00, 0x00, 0x00, 0x00]).is_err());
    }
}
