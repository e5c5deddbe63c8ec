//! RAW passthrough "codec": wraps fed bytes as opaque [`TagKind::Raw`]
//! tags with no demuxing, for media flavours that are forwarded untouched
//! rather than split into elementary frames.

use bytes::Bytes;

use crate::tag::{FlavourMask, Tag, TagAttributes, TagKind};

use super::error::ContainerError;

/// Turns each fed chunk directly into one `Raw` tag. Unlike the other
/// splitters this never buffers: there is no frame boundary to wait for.
pub struct RawSplitter {
    flavour_mask: FlavourMask,
    timestamp_ms: u32,
}

impl RawSplitter {
    pub fn new(flavour_mask: FlavourMask) -> Self {
        Self { flavour_mask, timestamp_ms: 0 }
    }

    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Tag>, ContainerError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let tag = Tag::new(TagKind::Raw, TagAttributes::empty(), self.flavour_mask, self.timestamp_ms)
            .with_payload(Bytes::copy_from_slice(data));
        self.timestamp_ms = self.timestamp_ms.wrapping_add(1);
        Ok(vec![tag])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_feed_call_becomes_one_raw_tag() {
        let mut splitter = RawSplitter::new(FlavourMask::ALL);
        let tags = splitter.feed(b"whatever bytes").unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].kind, TagKind::Raw);
        assert_eq!(tags[0].payload.as_ref().unwrap().as_ref(), b"whatever bytes");
    }

    #[test]
    fn empty_feed_yields_no_tag() {
        let mut splitter = RawSplitter::new(FlavourMask::ALL);
        assert!(splitter.feed(&[]).unwrap().is_empty());
    }

    #[test]
    fn successive_tags_get_increasing_timestamps() {
        let mut splitter = RawSplitter::new(FlavourMask::ALL);
        let first = splitter.feed(b"a").unwrap().remove(0);
        let second = splitter.feed(b"b").unwrap().remove(0);
        assert!(second.timestamp_ms > first.timestamp_ms);
    }
}
