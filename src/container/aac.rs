//! ADTS-framed AAC elementary-stream splitter. Each tag is one compressed
//! frame; timestamps are derived from the running sample count and the
//! stream's sample rate (1024 samples/frame, as ADTS carries no explicit
//! timestamp).

use bytes::{Buf, BytesMut};

use crate::tag::{FlavourMask, Tag, TagAttributes, TagKind};

use super::error::ContainerError;

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];
const SAMPLES_PER_FRAME: u32 = 1024;

pub struct AacSplitter {
    buf: BytesMut,
    samples_emitted: u64,
    sample_rate_hz: u32,
    flavour_mask: FlavourMask,
}

impl AacSplitter {
    pub fn new(flavour_mask: FlavourMask) -> Self {
        Self {
            buf: BytesMut::new(),
            samples_emitted: 0,
            sample_rate_hz: 44_100,
            flavour_mask,
        }
    }

    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Tag>, ContainerError> {
        self.buf.extend_from_slice(data);
        let mut tags = Vec::new();

        loop {
            if self.buf.len() < 7 {
                break;
            }
            if self.buf[0] != 0xFF || (self.buf[1] & 0xF0) != 0xF0 {
                return Err(ContainerError::BadAdtsHeader);
            }
            let protection_absent = self.buf[1] & 0x01 != 0;
            let sampling_freq_index = (self.buf[2] >> 2) & 0x0F;
            let frame_length = (((self.buf[3] & 0x03) as u32) << 11)
                | ((self.buf[4] as u32) << 3)
                | ((self.buf[5] as u32) >> 5);
            if frame_length < 7 {
                return Err(ContainerError::BadAdtsHeader);
            }
            if (self.buf.len() as u32) < frame_length {
                break;
            }
            if let Some(&rate) = SAMPLE_RATES.get(sampling_freq_index as usize) {
                self.sample_rate_hz = rate;
            }

            let header_len = if protection_absent { 7 } else { 9 };
            let timestamp_ms = (self.samples_emitted * 1000 / self.sample_rate_hz as u64) as u32;

            self.buf.advance(header_len);
            let payload_len = frame_length - header_len as u32;
            let body = self.buf.split_to(payload_len as usize).freeze();

            let mut tag = Tag::new(TagKind::Aac, TagAttributes::empty(), self.flavour_mask, timestamp_ms)
                .with_payload(body);
            tag.learn_attributes();
            tags.push(tag);

            self.samples_emitted += SAMPLES_PER_FRAME as u64;
        }

        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adts_frame(payload: &[u8]) -> Vec<u8> {
        let frame_length = (7 + payload.len()) as u32;
        let mut header = vec![
            0xFF,
            0xF1,
            (4 << 2) | (1 >> 2), // 44100Hz, channel config high bit
            ((1 & 0x3) << 6) | ((frame_length >> 11) as u8),
            ((frame_length >> 3) & 0xFF) as u8,
            (((frame_length & 0x7) as u8) << 5) | 0x1F,
            0xFC,
        ];
        header.extend_from_slice(payload);
        header
    }

    #[test]
    fn splits_single_frame() {
        let mut splitter = AacSplitter::new(FlavourMask::ALL);
        let frame = adts_frame(&[1, 2, 3, 4]);
        let tags = splitter.feed(&frame).unwrap();
        assert_eq!(tags.len(), 1);
        assert!(tags[0].attributes.contains(TagAttributes::AUDIO));
    }

    #[test]
    fn advances_timestamp_by_frame() {
        let mut splitter = AacSplitter::new(FlavourMask::ALL);
        let mut bytes = adts_frame(&[1, 2]);
        bytes.extend(adts_frame(&[3, 4]));
        let tags = splitter.feed(&bytes).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].timestamp_ms, 0);
        assert!(tags[1].timestamp_ms > 0);
    }
}
