//! MPEG-TS muxer.
//!
//! The real encoder is an external component (see the crate's external
//! interfaces documentation); this module provides a `TagSerializer` that
//! emits a minimal, standards-shaped TS stream (PAT/PMT plus one PES per
//! media tag) sufficient for a pure-Rust dependency tree with no libav
//! binding available. It is not a full multiplexer: no PCR pacing, no
//! adaptation-field stuffing beyond packet padding.

use bytes::{BufMut, Bytes, BytesMut};

use crate::tag::{Tag, TagAttributes, TagKind};

use super::error::ContainerError;
use super::TagSerializer;

const TS_PACKET_SIZE: usize = 188;
const PAT_PID: u16 = 0x0000;
const PMT_PID: u16 = 0x1000;
const VIDEO_PID: u16 = 0x0100;
const AUDIO_PID: u16 = 0x0101;

pub struct TsSerializer {
    continuity: [u8; 0x1FFF + 1],
    wrote_tables: bool,
}

impl Default for TsSerializer {
    fn default() -> Self {
        Self {
            continuity: [0; 0x1FFF + 1],
            wrote_tables: false,
        }
    }
}

impl TsSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_packet(&mut self, pid: u16, payload_start: bool, payload: &[u8], out: &mut BytesMut) {
        let cc = self.continuity[pid as usize];
        self.continuity[pid as usize] = (cc + 1) & 0x0F;

        let mut packet = [0xFFu8; TS_PACKET_SIZE];
        packet[0] = 0x47;
        packet[1] = (if payload_start { 0x40 } else { 0x00 }) | ((pid >> 8) as u8 & 0x1F);
        packet[2] = (pid & 0xFF) as u8;
        packet[3] = 0x10 | cc;

        let available = TS_PACKET_SIZE - 4;
        let n = payload.len().min(available);
        packet[4..4 + n].copy_from_slice(&payload[..n]);
        out.put_slice(&packet);
    }

    fn write_tables(&mut self, out: &mut BytesMut) {
        // PAT: program 1 -> PMT_PID.
        let mut pat = BytesMut::new();
        pat.put_u8(0x00); // pointer field
        pat.put_u8(0x00); // table id
        pat.put_u16(0xB00D);
        pat.put_u16(0x0001); // transport stream id
        pat.put_u8(0xC1);
        pat.put_u8(0x00);
        pat.put_u8(0x00);
        pat.put_u16(0x0001); // program number
        pat.put_u16(0xE000 | PMT_PID);
        pat.put_u32(0); // CRC32 (not computed; stub)
        self.write_packet(PAT_PID, true, &pat, out);

        let mut pmt = BytesMut::new();
        pmt.put_u8(0x00);
        pmt.put_u8(0x02); // table id
        pmt.put_u16(0xB012);
        pmt.put_u16(0x0001); // program number
        pmt.put_u8(0xC1);
        pmt.put_u8(0x00);
        pmt.put_u8(0x00);
        pmt.put_u16(0xE000 | VIDEO_PID); // PCR pid
        pmt.put_u16(0xF000);
        pmt.put_u8(0x1B); // stream type: H.264
        pmt.put_u16(0xE000 | VIDEO_PID);
        pmt.put_u16(0xF000);
        pmt.put_u8(0x0F); // stream type: AAC ADTS
        pmt.put_u16(0xE000 | AUDIO_PID);
        pmt.put_u16(0xF000);
        pmt.put_u32(0);
        self.write_packet(PMT_PID, true, &pmt, out);
    }

    fn write_pes(&mut self, pid: u16, payload: &Bytes, out: &mut BytesMut) {
        let mut pes = BytesMut::new();
        pes.put_slice(&[0x00, 0x00, 0x01]); // start code
        pes.put_u8(if pid == VIDEO_PID { 0xE0 } else { 0xC0 });
        let length = (payload.len() + 3).min(0xFFFF) as u16;
        pes.put_u16(length);
        pes.put_u8(0x80);
        pes.put_u8(0x00);
        pes.put_u8(0x00); // PTS/DTS flags = none (stub)
        pes.put_slice(payload);

        let mut first = true;
        for chunk in pes.chunks(184) {
            self.write_packet(pid, first, chunk, out);
            first = false;
        }
    }
}

impl TagSerializer for TsSerializer {
    fn initialize(&mut self, out: &mut BytesMut) -> Result<(), ContainerError> {
        self.write_tables(out);
        self.wrote_tables = true;
        Ok(())
    }

    fn serialize(&mut self, tag: &Tag, _base_timestamp_ms: u32, out: &mut BytesMut) -> Result<bool, ContainerError> {
        let Some(payload) = &tag.payload else {
            return Ok(false);
        };
        let pid = if tag.attributes.contains(TagAttributes::VIDEO) {
            VIDEO_PID
        } else if tag.attributes.contains(TagAttributes::AUDIO) {
            AUDIO_PID
        } else if matches!(tag.kind, TagKind::Flv | TagKind::Mp3 | TagKind::Aac | TagKind::F4v) {
            AUDIO_PID
        } else {
            return Ok(false);
        };
        self.write_pes(pid, payload, out);
        Ok(true)
    }

    fn finalize(&mut self, _out: &mut BytesMut) -> Result<(), ContainerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::FlavourMask;

    #[test]
    fn emits_pat_pmt_then_pes() {
        let mut serializer = TsSerializer::new();
        let mut out = BytesMut::new();
        serializer.initialize(&mut out).unwrap();
        assert_eq!(out.len() % TS_PACKET_SIZE, 0);
        assert!(out.len() >= TS_PACKET_SIZE * 2);

        let tag = Tag::new(TagKind::Aac, TagAttributes::AUDIO, FlavourMask::ALL, 0)
            .with_payload(Bytes::from_static(&[1, 2, 3]));
        let handled = serializer.serialize(&tag, 0, &mut out).unwrap();
        assert!(handled);
    }

    #[test]
    fn skips_tags_without_payload() {
        let mut serializer = TsSerializer::new();
        let mut out = BytesMut::new();
        let tag = Tag::new(TagKind::BootstrapBegin, TagAttributes::empty(), FlavourMask::ALL, 0);
        assert!(!serializer.serialize(&tag, 0, &mut out).unwrap());
    }
}
