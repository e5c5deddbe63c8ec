use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache max_size must be greater than zero")]
    ZeroCapacity,
}
