//! Splits one media frame into RTP-MTU-sized payloads, codec by codec.

use bytes::{Bytes, BytesMut};

use super::error::RtspError;

/// Default RTP MTU: 1500 Ethernet - 20 IP - 8 UDP - 12 RTP header.
pub const DEFAULT_MTU: usize = 1460;

/// One fragment ready to be wrapped in an RTP header and sent, with the
/// marker bit this fragment should carry.
pub struct Fragment {
    pub payload: Bytes,
    pub marker: bool,
}

pub trait Packetizer: Send {
    /// Split `frame` (one decoded media sample) into MTU-bounded fragments.
    fn packetize(&mut self, frame: &[u8], mtu: usize) -> Result<Vec<Fragment>, RtspError>;
}

/// Naive fixed-size chunking with no codec framing, used for payloads the
/// engine has no dedicated packetizer for.
pub struct GenericSplitPacketizer;

impl Packetizer for GenericSplitPacketizer {
    fn packetize(&mut self, frame: &[u8], mtu: usize) -> Result<Vec<Fragment>, RtspError> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < frame.len() {
            let end = (offset + mtu).min(frame.len());
            out.push(Fragment {
                payload: Bytes::copy_from_slice(&frame[offset..end]),
                marker: end == frame.len(),
            });
            offset = end;
        }
        Ok(out)
    }
}

/// RFC 4629 two-byte H.263 payload header; first-packet flag (P-bit) set
/// only on the first fragment of a frame.
pub struct H263Packetizer;

impl Packetizer for H263Packetizer {
    fn packetize(&mut self, frame: &[u8], mtu: usize) -> Result<Vec<Fragment>, RtspError> {
        let payload_mtu = mtu.saturating_sub(2).max(1);
        let mut out = Vec::new();
        let mut offset = 0;
        let mut first = true;
        while offset < frame.len() || (frame.is_empty() && first) {
            let end = (offset + payload_mtu).min(frame.len());
            let mut chunk = BytesMut::with_capacity(2 + (end - offset));
            let header_byte0 = if first { 0x00 } else { 0x40 };
            chunk.extend_from_slice(&[header_byte0, 0x00]);
            chunk.extend_from_slice(&frame[offset..end]);
            out.push(Fragment {
                payload: chunk.freeze(),
                marker: end == frame.len(),
            });
            first = false;
            offset = end;
            if frame.is_empty() {
                break;
            }
        }
        Ok(out)
    }
}

const NAL_TYPE_MASK: u8 = 0x1F;
const FU_A_TYPE: u8 = 28;

/// RFC 6184 H.264: single-NAL packets when a NAL fits the MTU, FU-A
/// fragmentation otherwise.
pub struct H264Packetizer {
    /// 2-byte length-prefixed NALs preceded by 7 opaque bytes to skip
    /// (FLV-container AVC video data), vs. 4-byte length-prefixed (MP4).
    pub flv_container: bool,
}

impl H264Packetizer {
    fn iter_nalus<'a>(&self, frame: &'a [u8]) -> Vec<&'a [u8]> {
        let mut data = frame;
        if self.flv_container {
            if data.len() < 7 {
                return Vec::new();
            }
            data = &data[7..];
        }
        let length_size = if self.flv_container { 2 } else { 4 };
        let mut nalus = Vec::new();
        while data.len() > length_size {
            let len = if length_size == 2 {
                u16::from_be_bytes([data[0], data[1]]) as usize
            } else {
                u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize
            };
            data = &data[length_size..];
            if len > data.len() {
                break;
            }
            nalus.push(&data[..len]);
            data = &data[len..];
        }
        nalus
    }
}

impl Packetizer for H264Packetizer {
    fn packetize(&mut self, frame: &[u8], mtu: usize) -> Result<Vec<Fragment>, RtspError> {
        let nalus = self.iter_nalus(frame);
        let mut out = Vec::new();
        let total = nalus.len();

        for (i, nal) in nalus.into_iter().enumerate() {
            let is_last_nal = i + 1 == total;
            if nal.len() <= mtu {
                out.push(Fragment {
                    payload: Bytes::copy_from_slice(nal),
                    marker: is_last_nal,
                });
                continue;
            }

            let nal_header = nal[0];
            let nal_type = nal_header & NAL_TYPE_MASK;
            let nri = nal_header & 0x60;
            let payload = &nal[1..];
            let fu_payload_mtu = mtu.saturating_sub(2).max(1);

            let mut offset = 0;
            while offset < payload.len() {
                let end = (offset + fu_payload_mtu).min(payload.len());
                let is_first = offset == 0;
                let is_last_fragment = end == payload.len();

                let fu_indicator = nri | FU_A_TYPE;
                let mut fu_header = nal_type;
                if is_first {
                    fu_header |= 0x80;
                }
                if is_last_fragment {
                    fu_header |= 0x40;
                }

                let mut chunk = BytesMut::with_capacity(2 + (end - offset));
                chunk.extend_from_slice(&[fu_indicator, fu_header]);
                chunk.extend_from_slice(&payload[offset..end]);

                out.push(Fragment {
                    payload: chunk.freeze(),
                    marker: is_last_fragment && is_last_nal,
                });
                offset = end;
            }
        }
        Ok(out)
    }
}

/// RFC 3640 MPEG-4 generic (AAC "MP4A-LATM"/hbr mode): a 2-byte
/// AU-headers-length field followed by one 16-bit AU header (13-bit size,
/// 3-bit index) per access unit.
pub struct Mp4APacketizer;

impl Packetizer for Mp4APacketizer {
    fn packetize(&mut self, frame: &[u8], mtu: usize) -> Result<Vec<Fragment>, RtspError> {
        if frame.len() > mtu.saturating_sub(4) {
            return Err(RtspError::PacketizationFailed);
        }
        let au_header: u16 = ((frame.len() as u16) << 3) & 0xFFF8;
        let mut out = BytesMut::with_capacity(4 + frame.len());
        out.extend_from_slice(&[0x00, 0x10]);
        out.extend_from_slice(&au_header.to_be_bytes());
        out.extend_from_slice(frame);
        Ok(vec![Fragment { payload: out.freeze(), marker: true }])
    }
}

/// RFC 2250 MPEG audio: a four-byte all-zero ADU header precedes each
/// packet's payload.
pub struct Mp3Packetizer;

impl Packetizer for Mp3Packetizer {
    fn packetize(&mut self, frame: &[u8], mtu: usize) -> Result<Vec<Fragment>, RtspError> {
        let payload_mtu = mtu.saturating_sub(4).max(1);
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < frame.len() {
            let end = (offset + payload_mtu).min(frame.len());
            let mut chunk = BytesMut::with_capacity(4 + (end - offset));
            chunk.extend_from_slice(&[0, 0, 0, 0]);
            chunk.extend_from_slice(&frame[offset..end]);
            out.push(Fragment {
                payload: chunk.freeze(),
                marker: end == frame.len(),
            });
            offset = end;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_split_respects_mtu() {
        let mut p = GenericSplitPacketizer;
        let frame = vec![0u8; 3000];
        let fragments = p.packetize(&frame, 1000).unwrap();
        assert_eq!(fragments.len(), 3);
        assert!(fragments.iter().all(|f| f.payload.len() <= 1000));
        assert!(fragments.last().unwrap().marker);
    }

    #[test]
    fn h264_emits_single_nal_packet_when_it_fits() {
        let mut p = H264Packetizer { flv_container: false };
        let nal = vec![0x65, 1, 2, 3];
        let mut frame = BytesMut::new();
        frame.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        frame.extend_from_slice(&nal);
        let fragments = p.packetize(&frame, 1460).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(&fragments[0].payload[..], &nal[..]);
        assert!(fragments[0].marker);
    }

    #[test]
    fn h264_fragments_large_nal_with_fu_a() {
        let mut p = H264Packetizer { flv_container: false };
        let mut nal = vec![0x65];
        nal.extend(std::iter::repeat(0xAB).take(3000));
        let mut frame = BytesMut::new();
        frame.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        frame.extend_from_slice(&nal);

        let fragments = p.packetize(&frame, 1000).unwrap();
        assert!(fragments.len() > 1);
        assert_eq!(fragments[0].payload[0] & 0x1F, FU_A_TYPE);
        assert_eq!(fragments[0].payload[1] & 0x80, 0x80);
        assert_eq!(fragments.last().unwrap().payload[1] & 0x40, 0x40);
        assert!(fragments.iter().all(|f| f.payload.len() <= 1000));
    }

    #[test]
    fn mp4a_packetizer_prefixes_au_header() {
        let mut p = Mp4APacketizer;
        let frame = vec![1, 2, 3, 4];
        let fragments = p.packetize(&frame, 1460).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].payload.len(), 4 + frame.len());
    }

    #[test]
    fn mp3_packetizer_prefixes_zero_adu_header() {
        let mut p = Mp3Packetizer;
        let frame = vec![9, 9, 9];
        let fragments = p.packetize(&frame, 1460).unwrap();
        assert_eq!(&fragments[0].payload[..4], &[0, 0, 0, 0]);
    }
}
