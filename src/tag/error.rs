use thiserror::Error;

/// Errors raised constructing or interpreting tags and their payloads.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TagError {
    #[error("tag kind {0:?} requires a payload")]
    MissingPayload(super::TagKind),
    #[error("media info already has an audio block")]
    DuplicateAudioBlock,
    #[error("media info already has a video block")]
    DuplicateVideoBlock,
    #[error("composed tag run exceeded the configured size threshold")]
    ComposedRunTooLarge,
    #[error("flavour mask on a subscriber request must not be zero")]
    EmptySubscriberMask,
}
