//! Per-subscriber [`Request`]: everything an [`super::Element`] needs to
//! know about who is asking and what they are allowed to see.

use crate::tag::{FlavourMask, Tag};

/// Where produced tags go once a request is being served.
pub type Sink = Box<dyn FnMut(Tag) + Send>;

/// Authorization fields a request carries for the [`super::Authorizer`]
/// boundary.
#[derive(Debug, Clone, Default)]
pub struct AuthFields {
    pub user: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub net_address: Option<String>,
    pub resource: String,
    pub action: String,
}

/// Whether an upstream controller backing a request can be paused or
/// seeked; implementations typically wrap a connection's write side.
pub trait Controller: Send + Sync {
    fn supports_pause(&self) -> bool;
    fn pause(&self, paused: bool);
    fn supports_seek(&self) -> bool;
    fn seek(&self, timestamp_ms: u64);
}

/// Per-subscriber object created by the connection-side stream, handed to
/// the element mapper, and destroyed after `remove_request` returns.
pub struct Request {
    pub media_path: String,
    pub capabilities: FlavourMask,
    pub controller: Option<Box<dyn Controller>>,
    pub write_ahead_ms: u64,
    pub auth: AuthFields,
    pub sink: Sink,
}

impl Request {
    pub fn new(media_path: impl Into<String>, capabilities: FlavourMask) -> Self {
        Self::with_sink(media_path, capabilities, Box::new(|_tag| {}))
    }

    pub fn with_sink(media_path: impl Into<String>, capabilities: FlavourMask, sink: Sink) -> Self {
        Self {
            media_path: media_path.into(),
            capabilities,
            controller: None,
            write_ahead_ms: 2000,
            auth: AuthFields::default(),
            sink,
        }
    }

    pub fn with_controller(mut self, controller: Box<dyn Controller>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn with_write_ahead_ms(mut self, write_ahead_ms: u64) -> Self {
        self.write_ahead_ms = write_ahead_ms;
        self
    }
}
