//! Application callback trait for RTMP servers
//!
//! `RtmpServer` drives the protocol; an `RtmpHandler` implementation decides
//! what the application actually does with each lifecycle event (accept or
//! reject a publish, authorize a play request, receive media, …).

use bytes::Bytes;

use crate::error::Result;
use crate::session::context::{SessionContext, StreamContext};

/// Decision returned from [`RtmpHandler::on_publish`] / [`on_play`](RtmpHandler::on_play).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Allow,
    Reject,
}

/// Application hooks invoked over an RTMP connection's lifetime.
///
/// Every method has a permissive default so a handler only needs to
/// override what it cares about. Implementations are shared across
/// connections behind an `Arc`, so methods take `&self`; any mutable state
/// must use interior mutability.
pub trait RtmpHandler: Send + Sync + 'static {
    /// Called once the `connect` command has been parsed. Returning
    /// `Authorization::Reject` closes the connection before any stream is
    /// created.
    fn on_connect(&self, ctx: &SessionContext) -> impl std::future::Future<Output = Result<Authorization>> + Send {
        let _ = ctx;
        async { Ok(Authorization::Allow) }
    }

    /// Called when a client issues `publish` on a newly created stream.
    fn on_publish(&self, ctx: &StreamContext) -> impl std::future::Future<Output = Result<Authorization>> + Send {
        let _ = ctx;
        async { Ok(Authorization::Allow) }
    }

    /// Called when a client issues `play` on a newly created stream.
    fn on_play(&self, ctx: &StreamContext) -> impl std::future::Future<Output = Result<Authorization>> + Send {
        let _ = ctx;
        async { Ok(Authorization::Allow) }
    }

    /// Called for every audio message received on a publishing stream.
    fn on_audio(&self, ctx: &StreamContext, timestamp: u32, data: Bytes) -> impl std::future::Future<Output = Result<()>> + Send {
        let _ = (ctx, timestamp, data);
        async { Ok(()) }
    }

    /// Called for every video message received on a publishing stream.
    fn on_video(&self, ctx: &StreamContext, timestamp: u32, data: Bytes) -> impl std::future::Future<Output = Result<()>> + Send {
        let _ = (ctx, timestamp, data);
        async { Ok(()) }
    }

    /// Called for `@setDataFrame`/`onMetaData` messages.
    fn on_metadata(&self, ctx: &StreamContext, data: Bytes) -> impl std::future::Future<Output = Result<()>> + Send {
        let _ = (ctx, data);
        async { Ok(()) }
    }

    /// Called when a stream is closed (`deleteStream`, `closeStream`, or the
    /// connection dropping while the stream was active).
    fn on_stream_close(&self, ctx: &StreamContext) -> impl std::future::Future<Output = Result<()>> + Send {
        let _ = ctx;
        async { Ok(()) }
    }

    /// Called once the connection itself has closed, after any active
    /// streams have already received `on_stream_close`.
    fn on_disconnect(&self, ctx: &SessionContext) -> impl std::future::Future<Output = Result<()>> + Send {
        let _ = ctx;
        async { Ok(()) }
    }
}
