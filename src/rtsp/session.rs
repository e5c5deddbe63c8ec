//! RTSP session: per-client playback state, keyed by a server-generated id,
//! with a SETUP→PLAY watchdog.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use super::broadcaster::Broadcaster;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// SETUP must be followed by PLAY within this window or the session is
/// torn down.
pub const SETUP_TO_PLAY_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    Audio,
    Video,
}

#[derive(Debug, Clone)]
pub enum TrackTransport {
    Udp { client_addr: SocketAddr, client_rtp_port: u16, client_rtcp_port: u16 },
    Interleaved { rtp_channel: u8, rtcp_channel: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Ready,
    Playing,
    Paused,
}

pub struct Session {
    pub id: String,
    pub media_path: String,
    pub peer_addr: SocketAddr,
    state: RwLock<PlaybackState>,
    transports: RwLock<HashMap<Track, TrackTransport>>,
    pub broadcaster: Broadcaster,
    setup_deadline: tokio::time::Instant,
}

impl Session {
    pub fn new(media_path: impl Into<String>, peer_addr: SocketAddr, broadcaster: Broadcaster) -> Self {
        let id = SESSION_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self {
            id: format!("{id:016X}"),
            media_path: media_path.into(),
            peer_addr,
            state: RwLock::new(PlaybackState::Ready),
            transports: RwLock::new(HashMap::new()),
            broadcaster,
            setup_deadline: tokio::time::Instant::now() + SETUP_TO_PLAY_DEADLINE,
        }
    }

    pub fn set_transport(&self, track: Track, transport: TrackTransport) {
        self.transports.write().insert(track, transport);
    }

    pub fn transport(&self, track: Track) -> Option<TrackTransport> {
        self.transports.read().get(&track).cloned()
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.read()
    }

    pub fn set_state(&self, state: PlaybackState) {
        *self.state.write() = state;
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn setup_deadline_elapsed(&self) -> bool {
        self.state() == PlaybackState::Ready && tokio::time::Instant::now() >= self.setup_deadline
    }
}

/// All live sessions, keyed by their server-assigned id.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.write().insert(session.id.clone(), session);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.write().remove(id)
    }

    pub fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    /// Sessions whose SETUP→PLAY watchdog has elapsed without a PLAY.
    pub fn expired(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().filter(|s| s.setup_deadline_elapsed()).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtsp::broadcaster::{Broadcaster, Sender};

    struct NullSender;
    impl Sender for NullSender {
        fn send(&mut self, _track: Track, _payload: &[u8]) {}
    }

    #[tokio::test]
    async fn new_session_is_ready_and_not_expired_immediately() {
        let broadcaster = Broadcaster::new(Box::new(NullSender));
        let session = Session::new("live/cam1", "127.0.0.1:1000".parse().unwrap(), broadcaster);
        assert_eq!(session.state(), PlaybackState::Ready);
        assert!(!session.setup_deadline_elapsed());
    }

    #[tokio::test]
    async fn manager_inserts_and_fetches_by_id() {
        let manager = SessionManager::new();
        let broadcaster = Broadcaster::new(Box::new(NullSender));
        let session = Arc::new(Session::new("live/cam1", "127.0.0.1:1000".parse().unwrap(), broadcaster));
        manager.insert(session.clone());
        assert!(manager.get(&session.id).is_some());
        assert_eq!(manager.all().len(), 1);
    }
}
