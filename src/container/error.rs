use thiserror::Error;

/// Errors raised splitting or serializing container bytes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContainerError {
    #[error("not enough bytes buffered yet")]
    NoData,
    #[error("malformed FLV signature")]
    BadFlvSignature,
    #[error("truncated FLV tag header")]
    TruncatedFlvTag,
    #[error("FLV tag size {0} exceeds the reassembly limit")]
    FlvTagTooLarge(u32),
    #[error("malformed MP4/F4V box header")]
    BadBoxHeader,
    #[error("required MOOV child atom {0} missing")]
    MissingAtom(&'static str),
    #[error("MOOV sample tables disagree on sample count")]
    InconsistentSampleTables,
    #[error("malformed ADTS AAC frame header")]
    BadAdtsHeader,
    #[error("malformed MP3 frame header")]
    BadMp3Header,
    #[error("tag kind is not representable by this serializer")]
    UnsupportedTagKind,
}
