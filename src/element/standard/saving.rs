//! Saving element: subscribes to an upstream element and writes every tag
//! through a [`TagSerializer`] into a file, `.part`-then-rename so a reader
//! never observes a half-written file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::container::TagSerializer;
use crate::element::{BoxFuture, Element, ElementError, Request};
use crate::tag::{FlavourMask, Tag};

const REOPEN_BACKOFF: Duration = Duration::from_secs(2);

enum State {
    Idle,
    Writing,
}

struct Inner {
    state: State,
}

/// Records tags from `upstream` into `output_path`, using `serializer` to
/// frame them, re-subscribing on upstream end-of-stream after a fixed
/// back-off.
pub struct SavingElement<S: TagSerializer + Send + 'static> {
    upstream: Arc<dyn Element>,
    output_path: PathBuf,
    flavour_mask: FlavourMask,
    make_serializer: Box<dyn Fn() -> S + Send + Sync>,
    inner: Arc<Mutex<Inner>>,
}

impl<S: TagSerializer + Send + 'static> SavingElement<S> {
    pub fn new(
        upstream: Arc<dyn Element>,
        output_path: impl Into<PathBuf>,
        flavour_mask: FlavourMask,
        make_serializer: impl Fn() -> S + Send + Sync + 'static,
    ) -> Self {
        Self {
            upstream,
            output_path: output_path.into(),
            flavour_mask,
            make_serializer: Box::new(make_serializer),
            inner: Arc::new(Mutex::new(Inner { state: State::Idle })),
        }
    }

    /// Start (or restart) recording. Runs until the upstream ends, then
    /// sleeps `REOPEN_BACKOFF` and tries again, forever, until `close` is
    /// called. Intended to be spawned as its own task.
    pub async fn run(self: Arc<Self>) {
        loop {
            if matches!(self.inner.lock().state, State::Idle) {
                return;
            }
            if let Err(err) = self.record_once().await {
                tracing::warn!(path = %self.output_path.display(), error = %err, "recording pass failed");
            }
            tokio::time::sleep(REOPEN_BACKOFF).await;
        }
    }

    async fn record_once(&self) -> Result<(), ElementError> {
        let part_path = self.output_path.with_extension("part");
        let mut file = fs::File::create(&part_path).await.map_err(io_err)?;

        let mut serializer = (self.make_serializer)();
        let mut out = BytesMut::new();
        serializer.initialize(&mut out).map_err(|_| ElementError::Closing)?;
        file.write_all(&out).await.map_err(io_err)?;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Tag>();
        let sink_tx = tx.clone();
        let req = Request::with_sink(
            "_saving",
            self.flavour_mask,
            Box::new(move |tag| {
                let _ = sink_tx.send(tag);
            }),
        );
        let id = self.upstream.add_request(req).await?;

        let mut base_timestamp_ms: Option<u32> = None;
        while let Some(tag) = rx.recv().await {
            let base = *base_timestamp_ms.get_or_insert(tag.timestamp_ms);
            let mut chunk = BytesMut::new();
            if serializer.serialize(&tag, base, &mut chunk).is_ok() {
                let _ = file.write_all(&chunk).await;
            }
            if tag.is_end_of_stream() {
                break;
            }
        }

        let mut tail = BytesMut::new();
        let _ = serializer.finalize(&mut tail);
        let _ = file.write_all(&tail).await;
        let _ = file.flush().await;
        drop(file);

        self.upstream.remove_request(id).await;
        fs::rename(&part_path, &self.output_path).await.map_err(io_err)?;
        Ok(())
    }
}

fn io_err(err: std::io::Error) -> ElementError {
    tracing::warn!(error = %err, "saving element io error");
    ElementError::Closing
}

impl<S: TagSerializer + Send + 'static> Element for SavingElement<S> {
    fn initialize(&self) -> BoxFuture<'_, Result<(), ElementError>> {
        Box::pin(async move {
            self.inner.lock().state = State::Writing;
            Ok(())
        })
    }

    fn add_request(&self, _req: Request) -> BoxFuture<'_, Result<u64, ElementError>> {
        // A saving element has no output subscribers of its own; it is a
        // sink, not a relay.
        Box::pin(async { Err(ElementError::NotFound("saving element has no output".to_string())) })
    }

    fn remove_request(&self, _id: u64) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }

    fn has_media(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { false })
    }

    fn list_media(&self) -> BoxFuture<'_, Vec<String>> {
        Box::pin(async { Vec::new() })
    }

    fn describe_media(&self, _path: &str) -> BoxFuture<'_, Option<String>> {
        Box::pin(async { None })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.inner.lock().state = State::Idle;
        })
    }
}
