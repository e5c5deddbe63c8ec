//! Session, stream, and server-wide statistics.

pub mod metrics;

pub use metrics::{ServerStats, SessionStats, StreamStats};
