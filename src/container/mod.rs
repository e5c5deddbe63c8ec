//! Container codecs: byte-stream splitters that turn FLV/F4V/MP3/AAC/RAW
//! bytes into [`crate::tag::Tag`] values, and serializers that turn tags
//! back into wire bytes.

pub mod aac;
pub mod error;
pub mod flv;
pub mod f4v;
pub mod mp3;
pub mod raw;
pub mod ts;

pub use error::ContainerError;

use bytes::BytesMut;

use crate::tag::Tag;

/// Uniform contract for turning a tag sequence back into container bytes.
///
/// Implementors hold only the state required to keep the output stream
/// correct (a running previous-tag-size for FLV, codec extradata for TS).
pub trait TagSerializer {
    /// Write any leading container bytes (e.g. the FLV signature header).
    fn initialize(&mut self, out: &mut BytesMut) -> Result<(), ContainerError>;

    /// Serialize one tag at `base_timestamp_ms + tag.timestamp_ms`. Returns
    /// `false` if the tag's kind is not representable by this serializer and
    /// was silently skipped (e.g. a bootstrap marker).
    fn serialize(&mut self, tag: &Tag, base_timestamp_ms: u32, out: &mut BytesMut) -> Result<bool, ContainerError>;

    /// Write any trailing bytes (TS trailer, etc.).
    fn finalize(&mut self, out: &mut BytesMut) -> Result<(), ContainerError>;
}
