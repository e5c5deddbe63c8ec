//! Tag distributor: fans a single upstream tag sequence out to many
//! subscribers, bootstrapping each newcomer before it sees a live tag.

pub mod bootstrap;

pub use bootstrap::Bootstrapper;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::tag::{FlavourMask, Tag, TagKind};

/// Callback invoked once per tag destined for a subscriber.
pub type Callback = Box<dyn FnMut(Tag) + Send>;

/// Opaque handle identifying a subscriber registered via [`Distributor::add_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

struct Subscriber {
    flavour_mask: FlavourMask,
    callback: Callback,
}

/// Owns a [`Bootstrapper`] and the two subscriber sets (`running`,
/// `to_bootstrap`) described by the distributor contract.
///
/// Not `Sync`-shared directly: callers serialize access to a distributor
/// under their own `tokio::sync::Mutex` (or drive it from a single task),
/// matching the re-entrancy discipline the in-flight flag enforces.
pub struct Distributor {
    name: Option<String>,
    bootstrapper: Bootstrapper,
    running: HashMap<u64, Subscriber>,
    to_bootstrap: HashMap<u64, Subscriber>,
    next_id: AtomicU64,
    in_flight: AtomicBool,
}

impl Distributor {
    pub fn new(name: Option<String>, keep_media: bool) -> Self {
        Self {
            name,
            bootstrapper: Bootstrapper::new(keep_media),
            running: HashMap::new(),
            to_bootstrap: HashMap::new(),
            next_id: AtomicU64::new(1),
            in_flight: AtomicBool::new(false),
        }
    }

    fn guard_not_in_flight(&self) {
        debug_assert!(
            !self.in_flight.load(Ordering::Acquire),
            "distributor mutated re-entrantly from within a callback"
        );
    }

    /// Register a new subscriber. Parked in `to_bootstrap` until the next
    /// `distribute_tag` call bootstraps it.
    ///
    /// Illegal to call while a distribution is in progress (checked via
    /// `debug_assert!`, matching the crate's release-mode-silent invariant
    /// policy).
    pub fn add_callback(&mut self, flavour_mask: FlavourMask, callback: Callback) -> SubscriberId {
        self.guard_not_in_flight();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.to_bootstrap.insert(id, Subscriber { flavour_mask, callback });
        SubscriberId(id)
    }

    /// Drain `to_bootstrap` into `running`, then feed `tag` to every
    /// `running` subscriber whose mask matches.
    pub fn distribute_tag(&mut self, tag: Tag) {
        self.in_flight.store(true, Ordering::Release);

        for (id, mut sub) in self.to_bootstrap.drain().collect::<Vec<_>>() {
            if self.name.is_some() {
                let started = Tag::source_started(self.name.clone().unwrap(), sub.flavour_mask);
                (sub.callback)(started);
            }
            for begin_tag in self.bootstrapper.play_at_begin(sub.flavour_mask, None) {
                (sub.callback)(begin_tag);
            }
            self.running.insert(id, sub);
        }

        // The distributor owns bootstrap_begin/bootstrap_end framing; any
        // such tag arriving from upstream is consumed here, not forwarded.
        if !matches!(tag.kind, TagKind::BootstrapBegin | TagKind::BootstrapEnd) {
            self.bootstrapper.process_tag(&tag);
            for sub in self.running.values_mut() {
                if tag.flavour_mask.matches(sub.flavour_mask) {
                    (sub.callback)(tag.clone());
                }
            }
        }

        self.in_flight.store(false, Ordering::Release);
    }

    /// Tear down one subscriber: `play_at_end`, an optional `source_ended`,
    /// then `end-of-stream(forced)`.
    pub fn close_callback(&mut self, id: SubscriberId, forced: bool) {
        self.guard_not_in_flight();
        let sub = self.running.remove(&id.0).or_else(|| self.to_bootstrap.remove(&id.0));
        if let Some(mut sub) = sub {
            for end_tag in self.bootstrapper.play_at_end(sub.flavour_mask) {
                (sub.callback)(end_tag);
            }
            (sub.callback)(Tag::end_of_stream(forced, sub.flavour_mask));
        }
    }

    /// Tear down every subscriber; every one receives end-of-stream.
    pub fn close_all(&mut self, forced: bool) {
        self.guard_not_in_flight();
        let ids: Vec<u64> = self.running.keys().chain(self.to_bootstrap.keys()).copied().collect();
        for id in ids {
            self.close_callback(SubscriberId(id), forced);
        }
    }

    /// Treat the upstream source as ended: re-park every running subscriber
    /// in `to_bootstrap` so it is re-bootstrapped when the stream resumes.
    pub fn reset(&mut self) {
        self.guard_not_in_flight();
        self.bootstrapper.reset();
        for (id, sub) in self.running.drain() {
            self.to_bootstrap.insert(id, sub);
        }
    }

    /// Replay `play_at_end` to every running subscriber, used when a splice
    /// point is imminent.
    pub fn switch(&mut self) {
        self.in_flight.store(true, Ordering::Release);
        for sub in self.running.values_mut() {
            for end_tag in self.bootstrapper.play_at_end(sub.flavour_mask) {
                (sub.callback)(end_tag);
            }
        }
        self.in_flight.store(false, Ordering::Release);
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn pending_bootstrap_count(&self) -> usize {
        self.to_bootstrap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TagAttributes;
    use std::sync::{Arc, Mutex};

    fn collecting_callback() -> (Callback, Arc<Mutex<Vec<Tag>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let recorder = received.clone();
        let cb: Callback = Box::new(move |tag| recorder.lock().unwrap().push(tag));
        (cb, received)
    }

    #[test]
    fn new_subscriber_bootstraps_before_seeing_live_tag() {
        let mut dist = Distributor::new(None, false);
        let (cb, received) = collecting_callback();
        dist.add_callback(FlavourMask::ALL, cb);

        let media = Tag::new(TagKind::Aac, TagAttributes::AUDIO, FlavourMask::ALL, 5);
        dist.distribute_tag(media);

        let log = received.lock().unwrap();
        assert_eq!(log.first().unwrap().kind, TagKind::BootstrapBegin);
        assert_eq!(log.last().unwrap().kind, TagKind::Aac);
        assert_eq!(dist.running_count(), 1);
        assert_eq!(dist.pending_bootstrap_count(), 0);
    }

    #[test]
    fn flavour_filtering_excludes_non_matching_subscribers() {
        let mut dist = Distributor::new(None, false);
        let (cb, received) = collecting_callback();
        dist.add_callback(FlavourMask::single(0), cb);
        dist.distribute_tag(Tag::new(TagKind::Aac, TagAttributes::AUDIO, FlavourMask::single(0), 0));

        let (cb2, received2) = collecting_callback();
        dist.add_callback(FlavourMask::single(1), cb2);
        dist.distribute_tag(Tag::new(TagKind::Aac, TagAttributes::AUDIO, FlavourMask::single(0), 1));

        assert!(received.lock().unwrap().iter().any(|t| t.kind == TagKind::Aac));
        assert!(!received2.lock().unwrap().iter().any(|t| t.kind == TagKind::Aac));
    }

    #[test]
    fn close_callback_emits_end_of_stream() {
        let mut dist = Distributor::new(None, false);
        let (cb, received) = collecting_callback();
        let id = dist.add_callback(FlavourMask::ALL, cb);
        dist.distribute_tag(Tag::new(TagKind::Aac, TagAttributes::AUDIO, FlavourMask::ALL, 0));
        dist.close_callback(id, true);

        let log = received.lock().unwrap();
        assert_eq!(log.last().unwrap().end_of_stream_forced(), Some(true));
    }

    #[test]
    fn reset_reparks_running_subscribers() {
        let mut dist = Distributor::new(None, false);
        let (cb, _received) = collecting_callback();
        dist.add_callback(FlavourMask::ALL, cb);
        dist.distribute_tag(Tag::new(TagKind::Aac, TagAttributes::AUDIO, FlavourMask::ALL, 0));
        assert_eq!(dist.running_count(), 1);

        dist.reset();
        assert_eq!(dist.running_count(), 0);
        assert_eq!(dist.pending_bootstrap_count(), 1);
    }
}
