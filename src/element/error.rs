use thiserror::Error;

/// Errors raised resolving or serving a media request through the element
/// graph.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ElementError {
    #[error("no element serves path {0:?}")]
    NotFound(String),
    #[error("request for {0:?} was not authorized")]
    Forbidden(String),
    #[error("too many clients for path {0:?}")]
    TooManyClients(String),
    #[error("reassembly buffer exceeded max_tag_size ({0} bytes)")]
    TagTooLarge(usize),
    #[error("element already closing, request rejected")]
    Closing,
}
