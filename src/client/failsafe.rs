//! Fan-out wrapper dispatching requests across a pool of upstream RTMP
//! peers: picks the least-loaded live peer, retries on another peer when
//! one fails, and backs a peer off for a while after a failure rather than
//! hammering it every attempt.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Error, HandshakeError, Result};

use super::config::ClientConfig;

struct Peer {
    config: ClientConfig,
    load: AtomicUsize,
    backoff_until: Mutex<Option<Instant>>,
}

/// Dispatches outbound RTMP operations (pulls or publishes) across a set of
/// candidate servers, retrying failed attempts on a different peer.
pub struct FailsafeClient {
    peers: Vec<Peer>,
    max_retries: usize,
    request_timeout: Duration,
    backoff: Duration,
}

impl FailsafeClient {
    pub fn new(configs: Vec<ClientConfig>, max_retries: usize, request_timeout: Duration) -> Self {
        Self::with_backoff(configs, max_retries, request_timeout, Duration::from_secs(5))
    }

    pub fn with_backoff(configs: Vec<ClientConfig>, max_retries: usize, request_timeout: Duration, backoff: Duration) -> Self {
        let peers = configs
            .into_iter()
            .map(|config| Peer {
                config,
                load: AtomicUsize::new(0),
                backoff_until: Mutex::new(None),
            })
            .collect();
        Self {
            peers,
            max_retries,
            request_timeout,
            backoff,
        }
    }

    fn least_loaded_live(&self) -> Option<usize> {
        let now = Instant::now();
        self.peers
            .iter()
            .enumerate()
            .filter(|(_, peer)| peer.backoff_until.lock().unwrap().map(|until| now >= until).unwrap_or(true))
            .min_by_key(|(_, peer)| peer.load.load(Ordering::Relaxed))
            .map(|(index, _)| index)
    }

    fn mark_failed(&self, index: usize) {
        *self.peers[index].backoff_until.lock().unwrap() = Some(Instant::now() + self.backoff);
    }

    /// Run `op` against peers in least-loaded order, retrying up to
    /// `max_retries` additional times on failure or timeout. A peer that
    /// fails is backed off and skipped by subsequent attempts until its
    /// backoff expires — which a later call (or a caller-driven periodic
    /// retry) will naturally discover once it checks `least_loaded_live`
    /// again, without needing a dedicated requeue timer.
    pub async fn dispatch<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(&ClientConfig) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_err: Option<Error> = None;

        for _ in 0..=self.max_retries {
            let Some(index) = self.least_loaded_live() else {
                break;
            };
            let peer = &self.peers[index];
            peer.load.fetch_add(1, Ordering::Relaxed);
            let outcome = tokio::time::timeout(self.request_timeout, op(&peer.config)).await;
            peer.load.fetch_sub(1, Ordering::Relaxed);

            match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => {
                    self.mark_failed(index);
                    last_err = Some(err);
                }
                Err(_) => {
                    self.mark_failed(index);
                    last_err = Some(Error::Handshake(HandshakeError::TimedOut));
                }
            }
        }

        Err(last_err.unwrap_or(Error::Handshake(HandshakeError::ConnectionClosed)))
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configs(n: usize) -> Vec<ClientConfig> {
        (0..n).map(|i| ClientConfig::new(format!("rtmp://host{i}/live/key"))).collect()
    }

    #[tokio::test]
    async fn retries_on_a_different_peer_after_failure() {
        let client = FailsafeClient::new(configs(2), 1, Duration::from_secs(1));
        let attempted: std::sync::Mutex<Vec<String>> = std::sync::Mutex::new(Vec::new());

        let result = client
            .dispatch(|config| {
                attempted.lock().unwrap().push(config.url.clone());
                let first_attempt = attempted.lock().unwrap().len() == 1;
                async move {
                    if first_attempt {
                        Err(Error::Handshake(HandshakeError::ConnectionClosed))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_the_last_error() {
        let client = FailsafeClient::new(configs(1), 2, Duration::from_secs(1));
        let result: Result<()> = client.dispatch(|_| async { Err(Error::Handshake(HandshakeError::SignatureMismatch)) }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn backed_off_peer_is_skipped_until_it_recovers() {
        let client = FailsafeClient::with_backoff(configs(1), 0, Duration::from_secs(1), Duration::from_millis(20));
        let _: Result<()> = client.dispatch(|_| async { Err(Error::Handshake(HandshakeError::ConnectionClosed)) }).await;

        assert!(client.least_loaded_live().is_none());
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(client.least_loaded_live(), Some(0));
    }
}
