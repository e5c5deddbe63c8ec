//! The tag pipeline's fundamental unit of data: [`Tag`], its [`TagKind`],
//! [`TagAttributes`] bits, [`FlavourMask`], and the [`MediaInfo`] descriptor
//! carried as its own tag kind.

mod attributes;
mod error;
mod flavour;
mod media_info;

pub use attributes::TagAttributes;
pub use error::TagError;
pub use flavour::FlavourMask;
pub use media_info::{AudioBlock, AudioFormat, FrameRecord, MediaInfo, VideoBlock, VideoFormat};

use bytes::Bytes;

/// What a [`Tag`] represents in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// Container-format header (e.g. the FLV signature block).
    ContainerHeader,
    /// Raw, not-yet-demuxed container bytes (FLV, F4V, MP3, AAC, MPEG-TS).
    Raw,
    /// A fully demuxed FLV payload.
    Flv,
    /// A fully demuxed F4V/MP4 sample.
    F4v,
    /// A fully demuxed MP3 frame.
    Mp3,
    /// A fully demuxed AAC frame.
    Aac,
    /// Opaque MPEG-TS internal payload.
    Ts,
    /// A [`MediaInfo`] descriptor.
    MediaInfo,
    /// A cue-point table.
    CuePoints,
    /// A nested source began producing tags (push onto the bootstrapper's
    /// started stack).
    SourceStarted,
    /// A nested source stopped producing tags (pop its matching start).
    SourceEnded,
    /// A new media segment began at a declared media timestamp.
    SegmentStarted,
    /// First tag of a bootstrap cycle delivered to a joining subscriber.
    BootstrapBegin,
    /// Last tag of a bootstrap cycle delivered to a joining subscriber.
    BootstrapEnd,
    /// Upstream began producing tags.
    BeginOfStream,
    /// Upstream stopped producing tags; `forced` distinguishes a clean stop
    /// from an error-driven teardown.
    EndOfStream { forced: bool },
    /// Accumulated state should be discarded (e.g. before a seek).
    Flush,
    /// A seek was performed; carries the new media timestamp.
    SeekPerformed,
    /// A capability negotiated out-of-band was observed in-stream.
    FeatureFound,
    /// A run of small tags merged into one, preserving the first
    /// constituent's timestamp.
    Composed,
}

/// A unit of data flowing through the tag pipeline.
///
/// Tags are logically immutable once shared: the payload is a [`Bytes`]
/// handle, so re-timestamping via [`Tag::clone_with_timestamp`] produces a
/// new `Tag` sharing the same underlying bytes without copying them.
#[derive(Debug, Clone)]
pub struct Tag {
    pub kind: TagKind,
    pub attributes: TagAttributes,
    pub flavour_mask: FlavourMask,
    pub timestamp_ms: u32,
    pub composition_offset_ms: i32,
    pub duration_ms: u32,
    pub payload: Option<Bytes>,
    /// Populated only on a [`TagKind::MediaInfo`] tag.
    pub media_info: Option<MediaInfo>,
}

impl Tag {
    /// Construct a tag with no payload and a zero composition offset/duration.
    pub fn new(kind: TagKind, attributes: TagAttributes, flavour_mask: FlavourMask, timestamp_ms: u32) -> Self {
        Self {
            kind,
            attributes,
            flavour_mask,
            timestamp_ms,
            composition_offset_ms: 0,
            duration_ms: 0,
            payload: None,
            media_info: None,
        }
    }

    /// Attach a payload, returning `self` for chaining.
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Attach a [`MediaInfo`] descriptor, returning `self` for chaining.
    /// Only meaningful on a [`TagKind::MediaInfo`] tag.
    pub fn with_media_info(mut self, info: MediaInfo) -> Self {
        self.media_info = Some(info);
        self
    }

    pub fn with_composition_offset(mut self, offset_ms: i32) -> Self {
        self.composition_offset_ms = offset_ms;
        self
    }

    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// A new tag sharing this tag's payload but carrying `timestamp_ms`.
    pub fn clone_with_timestamp(&self, timestamp_ms: u32) -> Self {
        Self {
            timestamp_ms,
            ..self.clone()
        }
    }

    /// Inspect the payload and set `AUDIO`/`VIDEO`/`CAN_RESYNC` attribute
    /// bits appropriate to this tag's kind. Metadata and lifecycle kinds are
    /// left untouched.
    pub fn learn_attributes(&mut self) {
        match self.kind {
            TagKind::Flv | TagKind::F4v | TagKind::Ts => {
                // Codec is carried inside the payload for these kinds; callers
                // that already know audio/video should set the bit directly
                // via `with_attributes` instead of relying on this inference.
            }
            TagKind::Mp3 | TagKind::Aac => {
                self.attributes |= TagAttributes::AUDIO;
                self.attributes |= TagAttributes::CAN_RESYNC;
            }
            TagKind::MediaInfo | TagKind::CuePoints => {
                self.attributes |= TagAttributes::METADATA;
            }
            _ => {}
        }
    }

    pub fn is_keyframe(&self) -> bool {
        self.attributes.contains(TagAttributes::VIDEO) && !self.attributes.contains(TagAttributes::DROPPABLE)
    }

    /// Whether this is an FLV/F4V AVC sequence header (CAN_RESYNC video).
    pub fn is_avc_header(&self) -> bool {
        self.attributes.contains(TagAttributes::VIDEO) && self.attributes.contains(TagAttributes::CAN_RESYNC)
    }

    /// Whether this is an FLV/F4V AAC sequence header (CAN_RESYNC audio).
    pub fn is_aac_header(&self) -> bool {
        self.attributes.contains(TagAttributes::AUDIO) && self.attributes.contains(TagAttributes::CAN_RESYNC)
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self.kind, TagKind::EndOfStream { .. })
    }

    pub fn end_of_stream_forced(&self) -> Option<bool> {
        match self.kind {
            TagKind::EndOfStream { forced } => Some(forced),
            _ => None,
        }
    }

    pub fn bootstrap_begin(flavour_mask: FlavourMask) -> Self {
        Self::new(TagKind::BootstrapBegin, TagAttributes::empty(), flavour_mask, 0)
    }

    pub fn bootstrap_end(flavour_mask: FlavourMask) -> Self {
        Self::new(TagKind::BootstrapEnd, TagAttributes::empty(), flavour_mask, 0)
    }

    pub fn source_started(name: impl Into<String>, flavour_mask: FlavourMask) -> Self {
        Self::new(TagKind::SourceStarted, TagAttributes::empty(), flavour_mask, 0)
            .with_payload(Bytes::from(name.into().into_bytes()))
    }

    pub fn source_ended(name: impl Into<String>, flavour_mask: FlavourMask) -> Self {
        Self::new(TagKind::SourceEnded, TagAttributes::empty(), flavour_mask, 0)
            .with_payload(Bytes::from(name.into().into_bytes()))
    }

    pub fn end_of_stream(forced: bool, flavour_mask: FlavourMask) -> Self {
        Self::new(TagKind::EndOfStream { forced }, TagAttributes::empty(), flavour_mask, 0)
    }

    /// Name carried by a `source_started`/`source_ended` tag's payload, if any.
    pub fn source_name(&self) -> Option<String> {
        self.payload
            .as_ref()
            .and_then(|b| std::str::from_utf8(b).ok())
            .map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_with_timestamp_shares_payload() {
        let payload = Bytes::from_static(b"abc");
        let tag = Tag::new(TagKind::Aac, TagAttributes::AUDIO, FlavourMask::ALL, 10).with_payload(payload.clone());
        let retimed = tag.clone_with_timestamp(20);
        assert_eq!(retimed.timestamp_ms, 20);
        assert_eq!(retimed.payload.as_ref().unwrap().as_ptr(), payload.as_ptr());
    }

    #[test]
    fn learn_attributes_marks_audio_resync() {
        let mut tag = Tag::new(TagKind::Aac, TagAttributes::empty(), FlavourMask::ALL, 0);
        tag.learn_attributes();
        assert!(tag.attributes.contains(TagAttributes::AUDIO));
        assert!(tag.attributes.contains(TagAttributes::CAN_RESYNC));
    }

    #[test]
    fn end_of_stream_forced_round_trips() {
        let tag = Tag::end_of_stream(true, FlavourMask::ALL);
        assert_eq!(tag.end_of_stream_forced(), Some(true));
        assert!(tag.is_end_of_stream());
    }

    #[test]
    fn source_started_carries_name() {
        let tag = Tag::source_started("camera-1", FlavourMask::ALL);
        assert_eq!(tag.source_name().as_deref(), Some("camera-1"));
    }
}
