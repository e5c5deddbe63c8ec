//! F4V/MP4 (ISO-BMFF) decoder.
//!
//! Parses atoms by recursive type dispatch, reconstructs per-track sample
//! tables from the `moov` atom, and emits a MOOV tag followed by frame tags
//! in file-offset or timestamp order.

use std::collections::BTreeSet;

use bytes::{Buf, Bytes, BytesMut};

use crate::tag::{FlavourMask, FrameRecord, FrameType, MediaInfo, Tag, TagAttributes, TagKind};

use super::error::ContainerError;

const CONTAINER_ATOMS: &[&[u8; 4]] = &[b"moov", b"trak", b"mdia", b"minf", b"stbl", b"udta", b"edts"];

#[derive(Debug, Default, Clone)]
struct SampleTable {
    is_video: bool,
    timescale: u32,
    stts: Vec<(u32, u32)>,      // (sample_count, sample_delta)
    ctts: Vec<(u32, i32)>,      // (sample_count, composition_offset)
    stsz: Vec<u32>,             // per-sample size (or uniform size repeated)
    stsc: Vec<(u32, u32)>,      // (first_chunk, samples_per_chunk), 1-indexed first_chunk
    chunk_offsets: Vec<u64>,
    keyframes_raw: Vec<u32>,    // 1-indexed sample numbers from stss
}

/// Ordering in which frame tags are emitted relative to one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrder {
    FileOffset,
    Timestamp,
}

fn read_box_header(buf: &[u8]) -> Option<(u32, [u8; 4], usize)> {
    if buf.len() < 8 {
        return None;
    }
    let size = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let mut kind = [0u8; 4];
    kind.copy_from_slice(&buf[4..8]);
    Some((size, kind, 8))
}

fn is_container(kind: &[u8; 4]) -> bool {
    CONTAINER_ATOMS.iter().any(|c| *c == kind)
}

fn parse_stts(body: &[u8]) -> Vec<(u32, u32)> {
    if body.len() < 8 {
        return Vec::new();
    }
    let count = u32::from_be_bytes([body[4], body[5], body[6], body[7]]) as usize;
    let mut out = Vec::with_capacity(count);
    let mut off = 8;
    for _ in 0..count {
        if off + 8 > body.len() {
            break;
        }
        let n = u32::from_be_bytes([body[off], body[off + 1], body[off + 2], body[off + 3]]);
        let delta = u32::from_be_bytes([body[off + 4], body[off + 5], body[off + 6], body[off + 7]]);
        out.push((n, delta));
        off += 8;
    }
    out
}

fn parse_ctts(body: &[u8]) -> Vec<(u32, i32)> {
    if body.len() < 8 {
        return Vec::new();
    }
    let count = u32::from_be_bytes([body[4], body[5], body[6], body[7]]) as usize;
    let mut out = Vec::with_capacity(count);
    let mut off = 8;
    for _ in 0..count {
        if off + 8 > body.len() {
            break;
        }
        let n = u32::from_be_bytes([body[off], body[off + 1], body[off + 2], body[off + 3]]);
        let offset = i32::from_be_bytes([body[off + 4], body[off + 5], body[off + 6], body[off + 7]]);
        out.push((n, offset));
        off += 8;
    }
    out
}

fn parse_stsz(body: &[u8]) -> Vec<u32> {
    if body.len() < 12 {
        return Vec::new();
    }
    let uniform_size = u32::from_be_bytes([body[4], body[5], body[6], body[7]]);
    let count = u32::from_be_bytes([body[8], body[9], body[10], body[11]]) as usize;
    if uniform_size != 0 {
        return vec![uniform_size; count];
    }
    let mut out = Vec::with_capacity(count);
    let mut off = 12;
    for _ in 0..count {
        if off + 4 > body.len() {
            break;
        }
        out.push(u32::from_be_bytes([body[off], body[off + 1], body[off + 2], body[off + 3]]));
        off += 4;
    }
    out
}

fn parse_stsc(body: &[u8]) -> Vec<(u32, u32)> {
    if body.len() < 8 {
        return Vec::new();
    }
    let count = u32::from_be_bytes([body[4], body[5], body[6], body[7]]) as usize;
    let mut out = Vec::with_capacity(count);
    let mut off = 8;
    for _ in 0..count {
        if off + 12 > body.len() {
            break;
        }
        let first_chunk = u32::from_be_bytes([body[off], body[off + 1], body[off + 2], body[off + 3]]);
        let samples_per_chunk = u32::from_be_bytes([body[off + 4], body[off + 5], body[off + 6], body[off + 7]]);
        out.push((first_chunk, samples_per_chunk));
        off += 12;
    }
    out
}

fn parse_stco(body: &[u8]) -> Vec<u64> {
    if body.len() < 8 {
        return Vec::new();
    }
    let count = u32::from_be_bytes([body[4], body[5], body[6], body[7]]) as usize;
    let mut out = Vec::with_capacity(count);
    let mut off = 8;
    for _ in 0..count {
        if off + 4 > body.len() {
            break;
        }
        out.push(u32::from_be_bytes([body[off], body[off + 1], body[off + 2], body[off + 3]]) as u64);
        off += 4;
    }
    out
}

fn parse_co64(body: &[u8]) -> Vec<u64> {
    if body.len() < 8 {
        return Vec::new();
    }
    let count = u32::from_be_bytes([body[4], body[5], body[6], body[7]]) as usize;
    let mut out = Vec::with_capacity(count);
    let mut off = 8;
    for _ in 0..count {
        if off + 8 > body.len() {
            break;
        }
        let mut b = [0u8; 8];
        b.copy_from_slice(&body[off..off + 8]);
        out.push(u64::from_be_bytes(b));
        off += 8;
    }
    out
}

fn parse_stss(body: &[u8]) -> Vec<u32> {
    if body.len() < 8 {
        return Vec::new();
    }
    let count = u32::from_be_bytes([body[4], body[5], body[6], body[7]]) as usize;
    let mut out = Vec::with_capacity(count);
    let mut off = 8;
    for _ in 0..count {
        if off + 4 > body.len() {
            break;
        }
        out.push(u32::from_be_bytes([body[off], body[off + 1], body[off + 2], body[off + 3]]));
        off += 4;
    }
    out
}

/// Recursively walk `moov`'s children collecting one [`SampleTable`] per
/// `trak`, and the raw MOOV bytes for replay.
fn walk_moov(data: &[u8]) -> Vec<SampleTable> {
    let mut tables = Vec::new();
    walk_traks(data, &mut tables);
    tables
}

fn walk_traks(data: &[u8], tables: &mut Vec<SampleTable>) {
    let mut off = 0;
    while off + 8 <= data.len() {
        let Some((size, kind, header_len)) = read_box_header(&data[off..]) else {
            break;
        };
        let box_size = if size == 0 { data.len() - off } else { size as usize };
        let end = (off + box_size).min(data.len());
        let body = &data[off + header_len..end];

        if &kind == b"trak" {
            tables.push(parse_trak(body));
        } else if is_container(&kind) {
            walk_traks(body, tables);
        }

        if box_size == 0 {
            break;
        }
        off += box_size;
    }
}

fn parse_trak(data: &[u8]) -> SampleTable {
    let mut table = SampleTable::default();
    walk_trak_children(data, &mut table);
    table
}

fn walk_trak_children(data: &[u8], table: &mut SampleTable) {
    let mut off = 0;
    while off + 8 <= data.len() {
        let Some((size, kind, header_len)) = read_box_header(&data[off..]) else {
            break;
        };
        let box_size = if size == 0 { data.len() - off } else { size as usize };
        let end = (off + box_size).min(data.len());
        let body = &data[off + header_len..end];

        match &kind {
            b"hdlr" if body.len() >= 12 => {
                let handler = &body[8..12];
                table.is_video = handler == b"vide";
            }
            b"mdhd" if body.len() >= 20 => {
                table.timescale = u32::from_be_bytes([body[12], body[13], body[14], body[15]]);
            }
            b"stts" => table.stts = parse_stts(body),
            b"ctts" => table.ctts = parse_ctts(body),
            b"stsz" => table.stsz = parse_stsz(body),
            b"stsc" => table.stsc = parse_stsc(body),
            b"stco" => table.chunk_offsets = parse_stco(body),
            b"co64" => table.chunk_offsets = parse_co64(body),
            b"stss" => {
                // Stashed temporarily via a side channel below.
                table.keyframes_raw = parse_stss(body);
            }
            _ if is_container(&kind) => walk_trak_children(body, table),
            _ => {}
        }

        if box_size == 0 {
            break;
        }
        off += box_size;
    }
}

/// Expand `stsc` + `chunk_offsets` into a per-sample file offset list.
fn sample_offsets(table: &SampleTable, total_samples: usize) -> Vec<u64> {
    let mut offsets = Vec::with_capacity(total_samples);
    if table.stsc.is_empty() || table.chunk_offsets.is_empty() {
        return offsets;
    }
    let mut sample_index = 0usize;
    for (chunk_index, &chunk_offset) in table.chunk_offsets.iter().enumerate() {
        let chunk_number = chunk_index as u32 + 1;
        let samples_per_chunk = table
            .stsc
            .iter()
            .rev()
            .find(|(first, _)| *first <= chunk_number)
            .map(|(_, n)| *n)
            .unwrap_or(1);
        let mut running = chunk_offset;
        for _ in 0..samples_per_chunk {
            if sample_index >= total_samples {
                break;
            }
            offsets.push(running);
            running += *table.stsz.get(sample_index).unwrap_or(&0) as u64;
            sample_index += 1;
        }
    }
    offsets
}

fn expand_stts(stts: &[(u32, u32)], timescale: u32, count: usize) -> Vec<u32> {
    let mut out = Vec::with_capacity(count);
    let mut ts: u64 = 0;
    for &(n, delta) in stts {
        for _ in 0..n {
            if out.len() >= count {
                break;
            }
            out.push(((ts * 1000) / timescale.max(1) as u64) as u32);
            ts += delta as u64;
        }
    }
    out
}

fn expand_ctts(ctts: &[(u32, i32)], timescale: u32, count: usize) -> Vec<i32> {
    if ctts.is_empty() {
        return vec![0; count];
    }
    let mut out = Vec::with_capacity(count);
    for &(n, offset) in ctts {
        for _ in 0..n {
            if out.len() >= count {
                break;
            }
            out.push(((offset as i64 * 1000) / timescale.max(1) as i64) as i32);
        }
    }
    while out.len() < count {
        out.push(0);
    }
    out
}

/// Build the per-sample `(absolute file offset, record)` list for one
/// track, unordered (offset-ascending as laid out by `stco`/`co64`).
fn track_frames(table: &SampleTable) -> Vec<(u64, FrameRecord)> {
    let total_samples = table.stsz.len();
    let offsets = sample_offsets(table, total_samples);
    let decoding_ts = expand_stts(&table.stts, table.timescale, total_samples);
    let composition_offsets = expand_ctts(&table.ctts, table.timescale, total_samples);
    let keyframes: std::collections::HashSet<u32> = table.keyframes_raw.iter().copied().collect();

    (0..total_samples)
        .map(|i| {
            let record = FrameRecord {
                frame_type: if table.is_video { FrameType::Video } else { FrameType::Audio },
                size: *table.stsz.get(i).unwrap_or(&0),
                decoding_timestamp_ms: *decoding_ts.get(i).unwrap_or(&0),
                composition_offset_ms: *composition_offsets.get(i).unwrap_or(&0),
                keyframe: !table.is_video || keyframes.is_empty() || keyframes.contains(&(i as u32 + 1)),
            };
            (*offsets.get(i).unwrap_or(&0), record)
        })
        .collect()
}

/// Merge every track's frames into one plan, ordered as `order` dictates.
/// The returned `(offset, record)` pairs are consumed in this order by the
/// streaming splitter; `offset` is the sample's absolute position in the
/// fed byte stream, used to tell when enough bytes have arrived.
fn build_frame_plan(tables: &[SampleTable], order: FrameOrder) -> Vec<(u64, FrameRecord)> {
    let mut frames: Vec<(u64, FrameRecord)> = tables.iter().flat_map(track_frames).collect();
    match order {
        FrameOrder::FileOffset => frames.sort_by_key(|(offset, _)| *offset),
        FrameOrder::Timestamp => frames.sort_by_key(|(_, r)| r.decoding_timestamp_ms),
    }
    frames
}

/// Wraps a parsed [`MediaInfo`] as the MOOV tag a joining subscriber
/// consumes before its frame index.
pub fn media_info_tag(info: MediaInfo, flavour_mask: FlavourMask) -> Tag {
    let mut tag = Tag::new(TagKind::MediaInfo, TagAttributes::METADATA.into(), flavour_mask, 0);
    tag.media_info = Some(info);
    tag
}

/// An emission index whose sample bytes have already arrived in the fed
/// byte stream but whose turn under `order` has not yet come. Bounds how
/// far the splitter tolerates the plan running ahead of arrival order
/// before concluding the sample tables don't match the actual layout.
const MAX_PENDING_FRAMES: usize = 4096;

/// Incrementally parses an F4V/MP4 byte stream into tags, mirroring
/// [`super::flv::FlvSplitter`]'s contract: `feed` returns whatever tags the
/// newly arrived bytes make available (possibly none, if more bytes are
/// still needed), and a structural problem is reported as `Err` rather than
/// panicking or silently truncating the stream.
///
/// Samples are not necessarily delivered to `feed` in `order`: the `mdat`
/// byte layout follows `stco`/`co64` chunk order, which may differ from the
/// playback order this splitter must emit in (most commonly when ordering
/// by timestamp across interleaved audio/video tracks). `pending` holds the
/// indices of already-arrived-but-not-yet-due frames so their bytes are not
/// re-scanned or lost while earlier-due frames are still in flight.
pub struct F4vSplitter {
    flavour_mask: FlavourMask,
    order: FrameOrder,
    header: HeaderState,
}

enum HeaderState {
    Searching { buf: BytesMut, scanned: usize },
    Streaming(Streaming),
}

struct Streaming {
    plan: Vec<(u64, FrameRecord)>,
    next_index: usize,
    pending: BTreeSet<usize>,
    buf: BytesMut,
    /// Absolute file offset of `buf[0]`.
    buf_base: u64,
    /// Absolute file offset one past the last byte fed so far.
    total_fed: u64,
}

impl F4vSplitter {
    pub fn new(flavour_mask: FlavourMask, order: FrameOrder) -> Self {
        Self {
            flavour_mask,
            order,
            header: HeaderState::Searching { buf: BytesMut::new(), scanned: 0 },
        }
    }

    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Tag>, ContainerError> {
        match &mut self.header {
            HeaderState::Searching { buf, scanned } => {
                buf.extend_from_slice(data);
                match find_moov(buf, *scanned)? {
                    None => {
                        *scanned = buf.len().saturating_sub(8);
                        Ok(Vec::new())
                    }
                    Some((moov_start, moov_end)) => {
                        let moov = Bytes::copy_from_slice(&buf[moov_start..moov_end]);
                        let tables = walk_moov(&moov);
                        let plan = build_frame_plan(&tables, self.order);

                        let mut info = MediaInfo::new();
                        info.moov = Some(moov);
                        info.frames = plan.iter().map(|(_, r)| *r).collect();
                        let moov_tag = media_info_tag(info, self.flavour_mask);

                        let total_fed = buf.len() as u64;
                        let mut streaming = Streaming {
                            plan,
                            next_index: 0,
                            pending: BTreeSet::new(),
                            buf: std::mem::take(buf),
                            buf_base: 0,
                            total_fed,
                        };
                        let mut tags = vec![moov_tag];
                        tags.extend(streaming.drain_ready(self.flavour_mask)?);
                        self.header = HeaderState::Streaming(streaming);
                        Ok(tags)
                    }
                }
            }
            HeaderState::Streaming(streaming) => {
                streaming.buf.extend_from_slice(data);
                streaming.total_fed += data.len() as u64;
                streaming.drain_ready(self.flavour_mask)
            }
        }
    }
}

impl Streaming {
    fn is_available(&self, idx: usize) -> bool {
        let (offset, record) = &self.plan[idx];
        self.total_fed >= offset + record.size as u64
    }

    fn emit(&mut self, idx: usize, flavour_mask: FlavourMask) -> Tag {
        let (offset, record) = self.plan[idx];
        let start = (offset - self.buf_base) as usize;
        let end = start + record.size as usize;
        let payload = Bytes::copy_from_slice(&self.buf[start..end]);

        let mut attrs = TagAttributes::empty();
        match record.frame_type {
            FrameType::Video => {
                attrs.insert(TagAttributes::VIDEO);
                if !record.keyframe {
                    attrs.insert(TagAttributes::DROPPABLE);
                }
            }
            FrameType::Audio => attrs.insert(TagAttributes::AUDIO),
        }

        Tag::new(TagKind::F4v, attrs, flavour_mask, record.decoding_timestamp_ms)
            .with_composition_offset(record.composition_offset_ms)
            .with_payload(payload)
    }

    /// Emit every frame whose turn has come, in plan order; track frames
    /// that arrived early but are not yet due in `pending`, and trim the
    /// buffer back to the earliest offset still needed by any unemitted
    /// frame (due or pending).
    fn drain_ready(&mut self, flavour_mask: FlavourMask) -> Result<Vec<Tag>, ContainerError> {
        let mut out = Vec::new();
        while self.next_index < self.plan.len() {
            let due = self.pending.remove(&self.next_index) || self.is_available(self.next_index);
            if !due {
                break;
            }
            out.push(self.emit(self.next_index, flavour_mask));
            self.next_index += 1;
        }

        for idx in self.next_index..self.plan.len() {
            if self.pending.contains(&idx) {
                continue;
            }
            if self.is_available(idx) {
                self.pending.insert(idx);
            }
        }
        if self.pending.len() > MAX_PENDING_FRAMES {
            return Err(ContainerError::InconsistentSampleTables);
        }

        self.trim_buffer();
        Ok(out)
    }

    fn trim_buffer(&mut self) {
        let min_offset = std::iter::once(self.next_index)
            .chain(self.pending.iter().copied())
            .filter(|i| *i < self.plan.len())
            .map(|i| self.plan[i].0)
            .min()
            .unwrap_or(self.total_fed);
        let drop = min_offset.saturating_sub(self.buf_base).min(self.buf.len() as u64) as usize;
        if drop > 0 {
            self.buf.advance(drop);
            self.buf_base += drop as u64;
        }
    }
}

/// Scan `buf` (re-scanning only from `from`, since earlier bytes were
/// already confirmed not to start a complete `moov` box) for a fully
/// buffered top-level `moov` box. Returns the start/end of its body.
fn find_moov(buf: &[u8], from: usize) -> Result<Option<(usize, usize)>, ContainerError> {
    let mut off = from.min(buf.len());
    loop {
        if off + 8 > buf.len() {
            return Ok(None);
        }
        let Some((size, kind, header_len)) = read_box_header(&buf[off..]) else {
            return Err(ContainerError::BadBoxHeader);
        };
        if size != 0 && (size as usize) < header_len {
            return Err(ContainerError::BadBoxHeader);
        }
        let box_size = if size == 0 { None } else { Some(size as usize) };

        if &kind == b"moov" {
            let Some(box_size) = box_size else {
                // A streamed file never declares an unsized trailing `moov`.
                return Err(ContainerError::BadBoxHeader);
            };
            if off + box_size > buf.len() {
                return Ok(None);
            }
            return Ok(Some((off + header_len, off + box_size)));
        }

        let Some(box_size) = box_size else { return Ok(None) };
        if off + box_size > buf.len() {
            return Ok(None);
        }
        off += box_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn make_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.put_u32((8 + body.len()) as u32);
        out.put_slice(kind);
        out.put_slice(body);
        out
    }

    fn make_full_box(kind: &[u8; 4], version_flags: u32, entries: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.put_u32(version_flags);
        body.extend_from_slice(entries);
        make_box(kind, &body)
    }

    /// One track with a single sample of `sample_size` bytes at
    /// `chunk_offset`, `delta` ticks apart at `timescale` ticks/second.
    fn make_trak(is_video: bool, timescale: u32, delta: u32, sample_size: u32, chunk_offset: u32) -> Vec<u8> {
        let mut stts_entries = Vec::new();
        stts_entries.put_u32(1);
        stts_entries.put_u32(delta);
        let stts = make_full_box(b"stts", 0, &stts_entries);

        let mut stsz_body = Vec::new();
        stsz_body.put_u32(0);
        stsz_body.put_u32(0);
        stsz_body.put_u32(1);
        stsz_body.put_u32(sample_size);
        let stsz = make_box(b"stsz", &stsz_body);

        let mut stsc_entries = Vec::new();
        stsc_entries.put_u32(1);
        stsc_entries.put_u32(1);
        stsc_entries.put_u32(1);
        let stsc = make_full_box(b"stsc", 0, &stsc_entries);

        let mut stco_entries = Vec::new();
        stco_entries.put_u32(1);
        stco_entries.put_u32(chunk_offset);
        let stco = make_full_box(b"stco", 0, &stco_entries);

        let mut stbl_body = Vec::new();
        stbl_body.extend_from_slice(&stts);
        stbl_body.extend_from_slice(&stsz);
        stbl_body.extend_from_slice(&stsc);
        stbl_body.extend_from_slice(&stco);
        let stbl = make_box(b"stbl", &stbl_body);

        let minf = make_box(b"minf", &stbl);

        let mut hdlr_body = vec![0u8; 8];
        hdlr_body.extend_from_slice(if is_video { b"vide" } else { b"soun" });
        hdlr_body.extend_from_slice(&[0u8; 4]);
        let hdlr = make_box(b"hdlr", &hdlr_body);

        let mut mdhd_body = vec![0u8; 12];
        mdhd_body.extend_from_slice(&timescale.to_be_bytes());
        mdhd_body.extend_from_slice(&[0u8; 4]);
        let mdhd = make_box(b"mdhd", &mdhd_body);

        let mut mdia_body = Vec::new();
        mdia_body.extend_from_slice(&mdhd);
        mdia_body.extend_from_slice(&hdlr);
        mdia_body.extend_from_slice(&minf);
        let mdia = make_box(b"mdia", &mdia_body);

        make_box(b"trak", &mdia)
    }

    /// `ftyp` + `moov` (containing every trak in `traks`) + zero padding up
    /// to `mdat_start`, i.e. a file whose sample bytes begin exactly there.
    fn make_file_header(traks: &[Vec<u8>], mdat_start: usize) -> Vec<u8> {
        let mut moov_body = Vec::new();
        for trak in traks {
            moov_body.extend_from_slice(trak);
        }
        let moov = make_box(b"moov", &moov_body);
        let ftyp = make_box(b"ftyp", b"isomiso2");

        let mut file = Vec::new();
        file.extend_from_slice(&ftyp);
        file.extend_from_slice(&moov);
        file.resize(mdat_start, 0);
        file
    }

    #[test]
    fn emits_moov_tag_then_one_frame_tag_across_multiple_feeds() {
        let trak = make_trak(false, 1000, 1024, 100, 500);
        let mut file = make_file_header(&[trak], 500);
        file.extend(std::iter::repeat(0xAB).take(100));

        let mut splitter = F4vSplitter::new(FlavourMask::ALL, FrameOrder::FileOffset);

        let mut tags = splitter.feed(&file[..100]).unwrap();
        assert!(tags.is_empty(), "no moov assembled yet, nothing should emit");

        tags.extend(splitter.feed(&file[100..550]).unwrap());
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].kind, TagKind::MediaInfo);
        assert_eq!(tags[0].media_info.as_ref().unwrap().frames.len(), 1);

        tags.extend(splitter.feed(&file[550..]).unwrap());
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].kind, TagKind::F4v);
        assert_eq!(tags[1].payload.as_ref().unwrap().len(), 100);
        assert!(tags[1].attributes.contains(TagAttributes::AUDIO));
    }

    #[test]
    fn reorder_buffer_holds_an_early_arriving_out_of_turn_frame() {
        // Both tracks have a single sample at decoding timestamp 0, so under
        // `FrameOrder::Timestamp` the plan keeps them in declaration order
        // (video, then audio) — but the audio sample's mdat bytes are laid
        // out *before* the video sample's. The audio frame therefore becomes
        // available before it is due and must sit in the reorder buffer
        // until the video frame (plan index 0) is also available.
        let video = make_trak(true, 1000, 1000, 50, 700);
        let audio = make_trak(false, 1000, 0, 50, 500);
        let mut file = make_file_header(&[video, audio], 500);
        file.extend(std::iter::repeat(0xEE).take(50)); // audio sample @500
        file.extend(std::iter::repeat(0xCC).take(150)); // padding up to 700
        file.truncate(700);
        file.extend(std::iter::repeat(0xCC).take(50)); // video sample @700

        let mut splitter = F4vSplitter::new(FlavourMask::ALL, FrameOrder::Timestamp);

        // Feed through the audio sample only: it is available but not due
        // (video is plan index 0), so only the MOOV tag comes out.
        let tags = splitter.feed(&file[..550]).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].kind, TagKind::MediaInfo);

        // Feeding the video sample's bytes makes index 0 due, which then
        // also releases the audio frame already held in the reorder buffer.
        let tags = splitter.feed(&file[550..]).unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags[0].attributes.contains(TagAttributes::VIDEO));
        assert!(tags[1].attributes.contains(TagAttributes::AUDIO));
    }

    #[test]
    fn incomplete_header_yields_no_tags_rather_than_an_error() {
        let ftyp = make_box(b"ftyp", b"isomiso2");
        let mut splitter = F4vSplitter::new(FlavourMask::ALL, FrameOrder::FileOffset);
        assert!(splitter.feed(&ftyp).unwrap().is_empty());
    }

    #[test]
    fn malformed_box_header_is_an_error() {
        let mut splitter = F4vSplitter::new(FlavourMask::ALL, FrameOrder::FileOffset);
        // A declared size smaller than the 8-byte header is structurally invalid.
        let bad = [0u8, 0, 0, 4, b'm', b'o', b'o', b'v'];
        assert!(splitter.feed(&bad).is_err());
    }
}
