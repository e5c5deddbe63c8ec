//! Per-connection session and stream state.

pub mod context;
pub mod state;
pub mod stream;

pub use context::{SessionContext, StreamContext};
pub use state::{SessionPhase, SessionState};
pub use stream::{StreamMode, StreamState};
