//! Normalizing element: wraps an upstream element, tracking one
//! [`StreamTimeCalculator`]/[`Normalizer`] pair per subscriber so each
//! client's controller is paused/resumed on its own write-ahead window.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::element::request::Sink;
use crate::element::{BoxFuture, Element, ElementError, Request};
use crate::flowctl::{Normalizer, NormalizerAction, StreamTimeCalculator};
use crate::tag::Tag;

struct Subscriber {
    calc: StreamTimeCalculator,
    norm: Normalizer,
    sink: Sink,
    controller_supports_pause: bool,
}

struct Inner {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
    started_at: Instant,
}

/// Sits between an upstream element and its subscribers, flow-controlling
/// each one individually according to its own write-ahead budget.
pub struct NormalizingElement {
    upstream: Arc<dyn Element>,
    inner: Arc<Mutex<Inner>>,
}

impl NormalizingElement {
    pub fn new(upstream: Arc<dyn Element>) -> Self {
        Self {
            upstream,
            inner: Arc::new(Mutex::new(Inner {
                next_id: 1,
                subscribers: HashMap::new(),
                started_at: Instant::now(),
            })),
        }
    }

    fn now_ms(inner: &Inner) -> u64 {
        inner.started_at.elapsed().as_millis() as u64
    }

    /// Feed a tag already produced for one subscriber through its
    /// normalizer, invoking its sink and evaluating pause/resume.
    fn deliver(inner: &mut Inner, id: u64, tag: Tag) {
        let now = Self::now_ms(inner);
        if let Some(sub) = inner.subscribers.get_mut(&id) {
            let stream_time_ms = sub.calc.on_tag(&tag);
            (sub.sink)(tag);
            match sub.norm.evaluate(stream_time_ms, now, sub.controller_supports_pause) {
                NormalizerAction::None => {}
                NormalizerAction::PauseAndScheduleResume(_delay) => {
                    // The owning connection task is expected to poll
                    // `is_paused`/call `resume` on its own timer; this
                    // element only makes the decision.
                }
                NormalizerAction::Resume => {}
            }
        }
    }
}

impl Element for NormalizingElement {
    fn initialize(&self) -> BoxFuture<'_, Result<(), ElementError>> {
        self.upstream.initialize()
    }

    fn add_request(&self, req: Request) -> BoxFuture<'_, Result<u64, ElementError>> {
        Box::pin(async move {
            let write_ahead_ms = req.write_ahead_ms;
            let controller_supports_pause = req.controller.as_ref().map(|c| c.supports_pause()).unwrap_or(false);

            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            let mut norm = Normalizer::new(write_ahead_ms);
            norm.rearm(Self::now_ms(&inner), 0);
            inner.subscribers.insert(
                id,
                Subscriber {
                    calc: StreamTimeCalculator::new(),
                    norm,
                    sink: req.sink,
                    controller_supports_pause,
                },
            );
            drop(inner);

            let inner_for_sink = self.inner.clone();
            let forwarding_sink: Sink = Box::new(move |tag: Tag| {
                let mut inner = inner_for_sink.lock();
                Self::deliver(&mut inner, id, tag);
            });
            let passthrough_req = Request::with_sink(req.media_path, req.capabilities, forwarding_sink);
            let _ = self.upstream.add_request(passthrough_req).await?;
            Ok(id)
        })
    }

    fn remove_request(&self, id: u64) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.inner.lock().subscribers.remove(&id);
        })
    }

    fn has_media(&self) -> BoxFuture<'_, bool> {
        self.upstream.has_media()
    }

    fn list_media(&self) -> BoxFuture<'_, Vec<String>> {
        self.upstream.list_media()
    }

    fn describe_media(&self, path: &str) -> BoxFuture<'_, Option<String>> {
        self.upstream.describe_media(path)
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.inner.lock().subscribers.clear();
            self.upstream.close().await;
        })
    }
}
