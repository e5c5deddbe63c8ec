//! RTMP stream puller
//!
//! High-level API for pulling a remote stream (`play`) and receiving its
//! audio/video/metadata messages as events, e.g. to relay or transcode.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::constants::{MSG_AUDIO, MSG_DATA_AMF0, MSG_DATA_AMF3, MSG_VIDEO};

use super::config::ClientConfig;
use super::connector::RtmpConnector;

/// Events emitted while pulling a remote stream.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Connected,
    Playing,
    Audio { timestamp: u32, data: Bytes },
    Video { timestamp: u32, data: Bytes },
    Metadata { data: Bytes },
    Disconnected,
    Error(String),
}

/// Pulls a remote RTMP stream and forwards its media as [`ClientEvent`]s.
pub struct RtmpPuller {
    config: ClientConfig,
    event_tx: mpsc::Sender<ClientEvent>,
}

impl RtmpPuller {
    /// Create a new puller. Returns the puller and a receiver for events.
    pub fn new(config: ClientConfig) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(256);
        (Self { config, event_tx: tx }, rx)
    }

    /// Connect, issue `play`, and run the read loop until the connection
    /// closes or errors. Intended to be spawned as its own task.
    pub async fn run(mut self) -> Result<()> {
        let stream_name = self
            .config
            .parse_url()
            .and_then(|u| u.stream_key)
            .unwrap_or_default();

        let mut connector = match RtmpConnector::connect(self.config.clone()).await {
            Ok(c) => c,
            Err(e) => {
                let _ = self.event_tx.send(ClientEvent::Error(e.to_string())).await;
                return Err(e);
            }
        };
        let _ = self.event_tx.send(ClientEvent::Connected).await;

        connector.play(&stream_name).await?;
        let _ = self.event_tx.send(ClientEvent::Playing).await;

        loop {
            let message = match connector.read_message().await {
                Ok(m) => m,
                Err(e) => {
                    let _ = self.event_tx.send(ClientEvent::Disconnected).await;
                    return Err(e);
                }
            };

            let event = match message.type_id {
                MSG_AUDIO => Some(ClientEvent::Audio {
                    timestamp: message.timestamp,
                    data: message.payload,
                }),
                MSG_VIDEO => Some(ClientEvent::Video {
                    timestamp: message.timestamp,
                    data: message.payload,
                }),
                MSG_DATA_AMF0 | MSG_DATA_AMF3 => Some(ClientEvent::Metadata { data: message.payload }),
                _ => None,
            };

            if let Some(event) = event {
                if self.event_tx.send(event).await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}
