//! RTMP server: listener, per-connection driver, and the application
//! callback trait.

pub mod config;
pub mod connection;
pub mod handler;
pub mod listener;

pub use config::ServerConfig;
pub use connection::Connection;
pub use handler::{Authorization, RtmpHandler};
pub use listener::RtmpServer;
