//! RTMP chunk-stream framing.
//!
//! RTMP multiplexes logical messages (commands, audio, video, …) over a
//! single TCP byte stream by splitting each message into chunks, each
//! prefixed by a basic header (chunk stream id + format) and, depending on
//! format, a message header carrying some subset of timestamp/length/type
//! id/message stream id. A `ChunkReader` reassembles whole messages from an
//! accumulating byte buffer; a `ChunkWriter` fragments outgoing messages the
//! same way.
//!
//! Reference: RTMP Specification Section 5.3.

use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};
use crate::protocol::constants::EXTENDED_TIMESTAMP_MARKER;

/// A fully reassembled RTMP message.
#[derive(Debug, Clone)]
pub struct Message {
    pub chunk_stream_id: u32,
    pub timestamp: u32,
    pub type_id: u8,
    pub stream_id: u32,
    pub payload: Bytes,
}

/// Per-chunk-stream header state, tracked separately for reads and writes so
/// format 1-3 chunks can omit fields unchanged since the previous chunk on
/// that stream.
#[derive(Debug, Clone, Default)]
struct ChunkHeaderState {
    timestamp: u32,
    timestamp_delta: u32,
    message_length: u32,
    type_id: u8,
    stream_id: u32,
}

/// In-progress reassembly of one message on one chunk stream.
#[derive(Debug)]
struct PartialMessage {
    header: ChunkHeaderState,
    buf: BytesMut,
    has_extended_timestamp: bool,
}

/// Reassembles chunks arriving on a single connection into whole messages.
///
/// `feed` is called with newly-read bytes; it drains as many complete
/// messages as the buffer currently contains and returns them in order. Any
/// trailing partial chunk stays buffered for the next call.
#[derive(Debug)]
pub struct ChunkReader {
    chunk_size: u32,
    previous: HashMap<u32, ChunkHeaderState>,
    partial: HashMap<u32, PartialMessage>,
    incoming: BytesMut,
}

impl ChunkReader {
    pub fn new(chunk_size: u32) -> Self {
        Self {
            chunk_size,
            previous: HashMap::new(),
            partial: HashMap::new(),
            incoming: BytesMut::new(),
        }
    }

    pub fn set_chunk_size(&mut self, size: u32) {
        self.chunk_size = size;
    }

    /// Append newly-read bytes and return every message the buffer now
    /// contains a complete chunk sequence for.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Message>> {
        self.incoming.extend_from_slice(data);
        let mut messages = Vec::new();

        loop {
            let before = self.incoming.len();
            match self.try_read_one()? {
                Some(Some(message)) => messages.push(message),
                Some(None) => {} // one chunk consumed, message still partial
                None => break,   // not enough bytes buffered yet
            }
            debug_assert!(self.incoming.len() < before);
        }

        Ok(messages)
    }

    /// Attempt to consume exactly one chunk from the front of `incoming`.
    /// Returns `None` if more bytes are needed, `Some(None)` if a chunk was
    /// consumed but its message isn't complete, `Some(Some(message))` once a
    /// full message has been reassembled.
    fn try_read_one(&mut self) -> Result<Option<Option<Message>>> {
        let mut cursor = &self.incoming[..];
        if cursor.is_empty() {
            return Ok(None);
        }

        let (csid, fmt, basic_len) = match read_basic_header(cursor)? {
            Some(v) => v,
            None => return Ok(None),
        };
        cursor.advance(basic_len);

        let header_len = message_header_len(fmt);
        if cursor.len() < header_len {
            return Ok(None);
        }

        let prev = self.previous.get(&csid).cloned().unwrap_or_default();
        let mut header = prev.clone();
        let mut raw_timestamp = 0u32;

        match fmt {
            0 => {
                raw_timestamp = cursor.get_uint(3) as u32;
                header.message_length = cursor.get_uint(3) as u32;
                header.type_id = cursor.get_u8();
                header.stream_id = cursor.get_u32_le();
                header.timestamp = raw_timestamp;
                header.timestamp_delta = 0;
            }
            1 => {
                raw_timestamp = cursor.get_uint(3) as u32;
                header.message_length = cursor.get_uint(3) as u32;
                header.type_id = cursor.get_u8();
                header.timestamp_delta = raw_timestamp;
            }
            2 => {
                raw_timestamp = cursor.get_uint(3) as u32;
                header.timestamp_delta = raw_timestamp;
            }
            3 => {}
            _ => unreachable!("format is masked to 2 bits"),
        }

        let has_extended = raw_timestamp == EXTENDED_TIMESTAMP_MARKER
            || (fmt == 3
                && self
                    .partial
                    .get(&csid)
                    .map(|p| p.has_extended_timestamp)
                    .unwrap_or(false));

        let extended_len = if has_extended { 4 } else { 0 };
        if cursor.len() < extended_len {
            return Ok(None);
        }
        let extended_timestamp = if has_extended {
            Some(cursor.get_u32())
        } else {
            None
        };

        if fmt != 3 {
            if let Some(ts) = extended_timestamp {
                raw_timestamp = ts;
                if fmt == 0 {
                    header.timestamp = ts;
                } else {
                    header.timestamp_delta = ts;
                }
            }
        }
        let _ = raw_timestamp;

        let partial = self.partial.entry(csid).or_insert_with(|| PartialMessage {
            header: header.clone(),
            buf: BytesMut::new(),
            has_extended_timestamp: has_extended,
        });
        if fmt != 3 {
            partial.header = header.clone();
            partial.has_extended_timestamp = has_extended;
        }

        let remaining = partial.header.message_length as usize - partial.buf.len();
        let take = remaining.min(self.chunk_size as usize);
        if cursor.len() < take {
            return Ok(None);
        }

        let consumed = self.incoming.len() - cursor.len() + take;
        let payload_start = self.incoming.len() - cursor.len();
        partial
            .buf
            .extend_from_slice(&self.incoming[payload_start..payload_start + take]);
        let message_length = partial.header.message_length as usize;
        let complete = partial.buf.len() >= message_length;

        let result = if complete {
            let partial = self.partial.remove(&csid).unwrap();
            let timestamp = if fmt == 0 {
                partial.header.timestamp
            } else {
                prev.timestamp.wrapping_add(partial.header.timestamp_delta)
            };
            let mut final_header = partial.header.clone();
            final_header.timestamp = timestamp;
            self.previous.insert(csid, final_header.clone());

            Some(Message {
                chunk_stream_id: csid,
                timestamp,
                type_id: final_header.type_id,
                stream_id: final_header.stream_id,
                payload: partial.buf.freeze(),
            })
        } else {
            None
        };

        self.incoming.advance(consumed);
        Ok(Some(result))
    }
}

fn message_header_len(fmt: u8) -> usize {
    match fmt {
        0 => 11,
        1 => 7,
        2 => 3,
        3 => 0,
        _ => unreachable!(),
    }
}

/// Parse the basic header (chunk stream id + format). Returns the decoded
/// `(chunk_stream_id, format, header_byte_len)` or `None` if not enough
/// bytes are buffered yet.
fn read_basic_header(mut cursor: &[u8]) -> Result<Option<(u32, u8, usize)>> {
    if cursor.is_empty() {
        return Ok(None);
    }
    let first = cursor[0];
    let fmt = first >> 6;
    let csid_low = first & 0x3F;

    match csid_low {
        0 => {
            if cursor.len() < 2 {
                return Ok(None);
            }
            cursor.advance(1);
            let csid = 64 + cursor.get_u8() as u32;
            Ok(Some((csid, fmt, 2)))
        }
        1 => {
            if cursor.len() < 3 {
                return Ok(None);
            }
            cursor.advance(1);
            let csid = 64 + cursor.get_u8() as u32 + (cursor.get_u8() as u32) * 256;
            Ok(Some((csid, fmt, 3)))
        }
        csid => Ok(Some((csid as u32, fmt, 1))),
    }
}

/// Serializes outgoing messages into chunks, tracking per-chunk-stream
/// header state so unchanged fields are omitted per the format 1-3 rules.
#[derive(Debug)]
pub struct ChunkWriter {
    chunk_size: u32,
    previous: HashMap<u32, ChunkHeaderState>,
}

impl ChunkWriter {
    pub fn new(chunk_size: u32) -> Self {
        Self {
            chunk_size,
            previous: HashMap::new(),
        }
    }

    pub fn set_chunk_size(&mut self, size: u32) {
        self.chunk_size = size;
    }

    /// Encode `message` as one or more chunks on `csid`, appending to `out`.
    pub fn write(&mut self, csid: u32, message: &Message, out: &mut BytesMut) -> Result<()> {
        if csid < 2 {
            return Err(ProtocolError::UnknownChunkStream(csid).into());
        }

        let prev = self.previous.get(&csid).cloned();
        let length = message.payload.len() as u32;

        let fmt = match &prev {
            Some(p)
                if p.stream_id == message.stream_id
                    && p.type_id == message.type_id
                    && p.message_length == length =>
            {
                1
            }
            Some(p) if p.stream_id == message.stream_id => 0,
            _ => 0,
        };
        // format 0 always on the first chunk of a stream; header state
        // comparison above only ever yields 0 or 1 for simplicity and
        // correctness (format 2's "same length+type" optimization is left
        // to a future writer; it's a pure size optimization, not correctness).

        write_basic_header(out, csid, fmt);

        let delta = match &prev {
            Some(p) if fmt != 0 => message.timestamp.wrapping_sub(p.timestamp),
            _ => message.timestamp,
        };
        let extended = delta >= EXTENDED_TIMESTAMP_MARKER;
        let ts_field = if extended { EXTENDED_TIMESTAMP_MARKER } else { delta };

        match fmt {
            0 => {
                out.put_uint(ts_field as u64, 3);
                out.put_uint(length as u64, 3);
                out.put_u8(message.type_id);
                out.put_u32_le(message.stream_id);
            }
            1 => {
                out.put_uint(ts_field as u64, 3);
                out.put_uint(length as u64, 3);
                out.put_u8(message.type_id);
            }
            _ => unreachable!(),
        }
        if extended {
            out.put_u32(delta);
        }

        let mut offset = 0usize;
        let payload = &message.payload;
        while offset < payload.len() {
            if offset > 0 {
                write_basic_header(out, csid, 3);
                if extended {
                    out.put_u32(delta);
                }
            }
            let take = (payload.len() - offset).min(self.chunk_size as usize);
            out.extend_from_slice(&payload[offset..offset + take]);
            offset += take;
        }
        if payload.is_empty() {
            // a zero-length message still occupies one chunk, already written above
        }

        self.previous.insert(
            csid,
            ChunkHeaderState {
                timestamp: message.timestamp,
                timestamp_delta: delta,
                message_length: length,
                type_id: message.type_id,
                stream_id: message.stream_id,
            },
        );

        Ok(())
    }
}

fn write_basic_header(out: &mut BytesMut, csid: u32, fmt: u8) {
    if csid < 64 {
        out.put_u8((fmt << 6) | csid as u8);
    } else if csid < 320 {
        out.put_u8(fmt << 6);
        out.put_u8((csid - 64) as u8);
    } else {
        out.put_u8((fmt << 6) | 1);
        let rest = csid - 64;
        out.put_u8((rest & 0xFF) as u8);
        out.put_u8((rest >> 8) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(messages: &[(u32, Message)]) -> Vec<Message> {
        let mut writer = ChunkWriter::new(128);
        let mut out = BytesMut::new();
        for (csid, message) in messages {
            writer.write(*csid, message, &mut out).unwrap();
        }

        let mut reader = ChunkReader::new(128);
        reader.feed(&out).unwrap()
    }

    fn msg(timestamp: u32, type_id: u8, stream_id: u32, payload: &[u8]) -> Message {
        Message {
            chunk_stream_id: 0,
            timestamp,
            type_id,
            stream_id,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    #[test]
    fn single_small_message_roundtrips() {
        let out = roundtrip(&[(3, msg(0, 20, 0, b"hello"))]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].type_id, 20);
        assert_eq!(out[0].timestamp, 0);
        assert_eq!(&out[0].payload[..], b"hello");
    }

    #[test]
    fn message_larger_than_chunk_size_splits_and_reassembles() {
        let payload = vec![0xABu8; 300];
        let out = roundtrip(&[(6, msg(1000, 9, 1, &payload))]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].payload.len(), 300);
        assert_eq!(&out[0].payload[..], &payload[..]);
    }

    #[test]
    fn sequential_messages_on_same_stream_use_deltas() {
        let out = roundtrip(&[
            (4, msg(0, 8, 1, b"a")),
            (4, msg(40, 8, 1, b"b")),
            (4, msg(80, 8, 1, b"c")),
        ]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].timestamp, 0);
        assert_eq!(out[1].timestamp, 40);
        assert_eq!(out[2].timestamp, 80);
    }

    #[test]
    fn feed_across_multiple_calls_reassembles() {
        let mut writer = ChunkWriter::new(128);
        let mut out = BytesMut::new();
        writer.write(3, &msg(0, 20, 0, b"split across reads"), &mut out).unwrap();

        let mut reader = ChunkReader::new(128);
        let (first, second) = out.split_at(5);
        assert!(reader.feed(first).unwrap().is_empty());
        let messages = reader.feed(second).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(&messages[0].payload[..], b"split across reads");
    }

    #[test]
    fn unknown_chunk_stream_below_two_is_rejected() {
        let mut writer = ChunkWriter::new(128);
        let mut out = BytesMut::new();
        let err = writer.write(1, &msg(0, 20, 0, b"x"), &mut out).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Protocol(ProtocolError::UnknownChunkStream(1))
        ));
    }
}
