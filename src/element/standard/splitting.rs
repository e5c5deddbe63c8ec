//! Splitting element: demuxes a RAW container byte stream into the tag
//! pipeline's elementary tag kinds and fans them out to subscribers.

use parking_lot::Mutex;

use crate::container::aac::AacSplitter;
use crate::container::f4v::{F4vSplitter, FrameOrder};
use crate::container::flv::FlvSplitter;
use crate::container::mp3::Mp3Splitter;
use crate::container::raw::RawSplitter;
use crate::container::ContainerError;
use crate::distributor::{Callback, Distributor, SubscriberId};
use crate::element::{BoxFuture, Element, ElementError, Request};
use crate::tag::{FlavourMask, Tag, TagKind};

/// Which container format this element demuxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Flv,
    F4v,
    Mp3,
    Aac,
    Raw,
}

enum Splitter {
    Flv(FlvSplitter),
    F4v(Box<F4vSplitter>),
    Mp3(Mp3Splitter),
    Aac(AacSplitter),
    Raw(RawSplitter),
}

impl Splitter {
    fn new(kind: ContainerKind, flavour_mask: FlavourMask) -> Self {
        match kind {
            ContainerKind::Flv => Splitter::Flv(FlvSplitter::new(flavour_mask)),
            ContainerKind::F4v => {
                Splitter::F4v(Box::new(F4vSplitter::new(flavour_mask, FrameOrder::Timestamp)))
            }
            ContainerKind::Mp3 => Splitter::Mp3(Mp3Splitter::new(flavour_mask)),
            ContainerKind::Aac => Splitter::Aac(AacSplitter::new(flavour_mask)),
            ContainerKind::Raw => Splitter::Raw(RawSplitter::new(flavour_mask)),
        }
    }

    fn feed(&mut self, data: &[u8]) -> Result<Vec<Tag>, ContainerError> {
        match self {
            Splitter::Flv(s) => s.feed(data),
            Splitter::F4v(s) => s.feed(data),
            Splitter::Mp3(s) => s.feed(data),
            Splitter::Aac(s) => s.feed(data),
            Splitter::Raw(s) => s.feed(data),
        }
    }
}

struct Inner {
    splitter: Splitter,
    distributor: Distributor,
    max_tag_size: usize,
    closing: bool,
}

/// Converts RAW bytes on its single upstream input into elementary tags on
/// however many subscribers attach downstream.
pub struct SplittingElement {
    kind: ContainerKind,
    inner: Mutex<Inner>,
}

impl SplittingElement {
    pub fn new(name: impl Into<String>, kind: ContainerKind, max_tag_size: usize) -> Self {
        Self {
            kind,
            inner: Mutex::new(Inner {
                splitter: Splitter::new(kind, FlavourMask::ALL),
                distributor: Distributor::new(Some(name.into()), true),
                max_tag_size,
                closing: false,
            }),
        }
    }

    /// Feed one upstream RAW tag. On a container parse error the element
    /// closes every subscriber with a forced end-of-stream.
    pub fn feed_raw(&self, tag: &Tag) {
        if !matches!(tag.kind, TagKind::Raw) {
            return;
        }
        let Some(payload) = &tag.payload else { return };

        let mut inner = self.inner.lock();
        if inner.closing {
            return;
        }

        match inner.splitter.feed(payload) {
            Ok(tags) => {
                for mut produced in tags {
                    if let Some(p) = &produced.payload {
                        if p.len() > inner.max_tag_size {
                            inner.closing = true;
                            inner.distributor.close_all(true);
                            return;
                        }
                    }
                    produced.learn_attributes();
                    inner.distributor.distribute_tag(produced);
                }
            }
            Err(_) => {
                inner.closing = true;
                inner.distributor.close_all(true);
            }
        }
    }

    pub fn end_of_input(&self) {
        let mut inner = self.inner.lock();
        inner.closing = true;
        inner.distributor.close_all(false);
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }
}

impl Element for SplittingElement {
    fn initialize(&self) -> BoxFuture<'_, Result<(), ElementError>> {
        Box::pin(async { Ok(()) })
    }

    fn add_request(&self, req: Request) -> BoxFuture<'_, Result<u64, ElementError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            if inner.closing {
                return Err(ElementError::Closing);
            }
            let mask = req.capabilities;
            let mut sink = req.sink;
            let cb: Callback = Box::new(move |tag: Tag| sink(tag));
            let id = inner.distributor.add_callback(mask, cb);
            Ok(id.raw())
        })
    }

    fn remove_request(&self, id: u64) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            inner.distributor.close_callback(SubscriberId::from_raw(id), false);
        })
    }

    fn has_media(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { !self.inner.lock().closing })
    }

    fn list_media(&self) -> BoxFuture<'_, Vec<String>> {
        Box::pin(async { Vec::new() })
    }

    fn describe_media(&self, _path: &str) -> BoxFuture<'_, Option<String>> {
        Box::pin(async { None })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            inner.closing = true;
            inner.distributor.close_all(true);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::{Arc, Mutex as StdMutex};

    #[tokio::test]
    async fn feeding_malformed_flv_closes_every_subscriber() {
        let element = SplittingElement::new("test", ContainerKind::Flv, 1 << 20);
        let received = Arc::new(StdMutex::new(Vec::new()));
        let recorder = received.clone();
        let req = Request::with_sink(
            "irrelevant",
            FlavourMask::ALL,
            Box::new(move |tag| recorder.lock().unwrap().push(tag)),
        );
        element.add_request(req).await.unwrap();

        let bad = Tag::new(TagKind::Raw, crate::tag::TagAttributes::empty(), FlavourMask::ALL, 0)
            .with_payload(Bytes::from_static(b"not an flv file"));
        element.feed_raw(&bad);

        let log = received.lock().unwrap();
        assert!(log.iter().any(|t| t.end_of_stream_forced() == Some(true)));
        assert!(!element.has_media().await);
    }

    #[tokio::test]
    async fn non_raw_tags_are_ignored() {
        let element = SplittingElement::new("test", ContainerKind::Mp3, 1 << 20);
        let tag = Tag::new(TagKind::MediaInfo, crate::tag::TagAttributes::empty(), FlavourMask::ALL, 0);
        element.feed_raw(&tag);
        assert!(element.has_media().await);
    }
}
