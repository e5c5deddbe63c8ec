//! Small supporting utilities shared across the element graph.

pub mod state;

pub use state::{InMemoryStateKeeper, StateKeeper};
