//! RTSP/1.0 message codec: request/response lines, CRLF headers, an
//! optional `Content-Length`-sized body, and interleaved binary frames.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::RtspError;

/// An interleaved binary frame marker, per RFC 2326 §10.12.
pub const INTERLEAVED_MAGIC: u8 = b'$';

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn cseq(&self) -> Option<&str> {
        self.header("CSeq")
    }

    pub fn session_id(&self) -> Option<&str> {
        self.header("Session")
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl Response {
    pub fn new(status_code: u16, status_text: impl Into<String>) -> Self {
        Self {
            status_code,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }

    pub fn bad_request() -> Self {
        Self::new(400, "Bad Request")
    }

    pub fn method_not_allowed() -> Self {
        Self::new(405, "Method Not Allowed")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, content_type: &str, body: Bytes) -> Self {
        self.headers.push(("Content-Type".to_string(), content_type.to_string()));
        self.body = Some(body);
        self
    }

    pub fn serialize(&self) -> Bytes {
        let mut out = BytesMut::new();
        out.extend_from_slice(format!("RTSP/1.0 {} {}\r\n", self.status_code, self.status_text).as_bytes());
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        if let Some(body) = &self.body {
            out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
            out.extend_from_slice(body);
        } else {
            out.extend_from_slice(b"\r\n");
        }
        out.freeze()
    }
}

/// One unit decoded off an RTSP connection's byte stream: a textual
/// request/response, or an interleaved RTP/RTCP frame.
#[derive(Debug)]
pub enum Frame {
    Request(Request),
    Interleaved { channel: u8, payload: Bytes },
}

/// Wrap `payload` as an interleaved frame on `channel`.
pub fn write_interleaved(channel: u8, payload: &[u8], out: &mut BytesMut) {
    out.put_u8(INTERLEAVED_MAGIC);
    out.put_u8(channel);
    out.put_u16(payload.len() as u16);
    out.extend_from_slice(payload);
}

/// Attempt to decode one [`Frame`] from the front of `buf`, consuming the
/// bytes it used. Returns `Ok(None)` if more data is needed.
pub fn try_decode_frame(buf: &mut BytesMut) -> Result<Option<Frame>, RtspError> {
    if buf.is_empty() {
        return Ok(None);
    }

    if buf[0] == INTERLEAVED_MAGIC {
        if buf.len() < 4 {
            return Ok(None);
        }
        let channel = buf[1];
        let len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        if buf.len() < 4 + len {
            return Ok(None);
        }
        buf.advance(4);
        let payload = buf.split_to(len).freeze();
        return Ok(Some(Frame::Interleaved { channel, payload }));
    }

    let Some(header_end) = find_double_crlf(buf) else { return Ok(None) };
    let header_text = std::str::from_utf8(&buf[..header_end]).map_err(|_| RtspError::InvalidHeader)?;
    let request = parse_request_head(header_text)?;

    let content_length: usize = request
        .header("Content-Length")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    if buf.len() < body_start + content_length {
        return Ok(None);
    }

    buf.advance(body_start);
    let body = if content_length > 0 {
        Some(buf.split_to(content_length).freeze())
    } else {
        None
    };

    Ok(Some(Frame::Request(Request { body, ..request })))
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_request_head(raw: &str) -> Result<Request, RtspError> {
    let mut lines = raw.split("\r\n");
    let request_line = lines.next().ok_or(RtspError::EmptyRequest)?;
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(RtspError::InvalidRequestLine);
    }

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let colon = line.find(':').ok_or(RtspError::InvalidHeader)?;
        headers.push((line[..colon].trim().to_string(), line[colon + 1..].trim().to_string()));
    }

    Ok(Request {
        method: parts[0].to_string(),
        uri: parts[1].to_string(),
        version: parts[2].to_string(),
        headers,
        body: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_setup_request_with_no_body() {
        let mut buf = BytesMut::from(
            "SETUP rtsp://host/stream trackID=0 RTSP/1.0\r\nCSeq: 2\r\nTransport: RTP/AVP;unicast;client_port=8000-8001\r\n\r\n",
        );
        let frame = try_decode_frame(&mut buf).unwrap().unwrap();
        match frame {
            Frame::Request(req) => {
                assert_eq!(req.method, "SETUP");
                assert_eq!(req.cseq(), Some("2"));
            }
            _ => panic!("expected a request frame"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn incomplete_header_returns_none() {
        let mut buf = BytesMut::from("OPTIONS rtsp://host/stream RTSP/1.0\r\nCSeq: 1\r\n");
        assert!(try_decode_frame(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decodes_an_interleaved_frame() {
        let mut out = BytesMut::new();
        write_interleaved(0, &[1, 2, 3, 4], &mut out);
        let frame = try_decode_frame(&mut out).unwrap().unwrap();
        match frame {
            Frame::Interleaved { channel, payload } => {
                assert_eq!(channel, 0);
                assert_eq!(&payload[..], &[1, 2, 3, 4]);
            }
            _ => panic!("expected an interleaved frame"),
        }
    }

    #[test]
    fn response_serializes_status_line_and_headers() {
        let resp = Response::ok().with_header("CSeq", "3").with_header("Public", "OPTIONS, DESCRIBE");
        let bytes = resp.serialize();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("RTSP/1.0 200 OK\r\n"));
        assert!(text.contains("CSeq: 3\r\n"));
    }
}
