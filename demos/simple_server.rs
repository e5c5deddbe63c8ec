//! Simple RTMP server example with pub/sub support
//!
//! Run with: cargo run --example simple_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_server                    # binds to 0.0.0.0:1935
//!   cargo run --example simple_server localhost          # binds to 127.0.0.1:1935
//!   cargo run --example simple_server 127.0.0.1:1936     # binds to 127.0.0.1:1936
//!   cargo run --example simple_server 0.0.0.0:1940       # binds to 0.0.0.0:1940
//!
//! ## Publishing (send stream)
//!
//! With OBS:
//!   Server: rtmp://localhost/live
//!   Stream Key: test_key
//!
//! With ffmpeg:
//!   ffmpeg -re -i input.mp4 -c copy -f flv rtmp://localhost/live/test_key
//!
//! ## Playing (receive stream)
//!
//! With VLC:
//!   vlc rtmp://localhost/live/test_key
//!
//! With ffplay:
//!   ffplay rtmp://localhost/live/test_key
//!
//! ## Features
//!
//! - Late-joiner support: Players joining after stream starts receive sequence headers + GOP
//! - Publisher reconnect: If publisher disconnects, stream stays alive for 10s grace period
//! - Backpressure: Slow subscribers skip to next keyframe instead of buffering indefinitely

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use streamcore::error::Result;
use streamcore::server::handler::{Authorization, RtmpHandler};
use streamcore::session::{SessionContext, StreamContext};
use streamcore::{RtmpServer, ServerConfig};

/// Simple handler that logs events and collects stats.
struct MyHandler {
    video_frames: AtomicU64,
    audio_frames: AtomicU64,
    bytes_received: AtomicU64,
}

impl MyHandler {
    fn new() -> Self {
        Self {
            video_frames: AtomicU64::new(0),
            audio_frames: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    fn print_stats(&self) {
        println!(
            "Stats: video={} audio={} bytes={}",
            self.video_frames.load(Ordering::Relaxed),
            self.audio_frames.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
        );
    }
}

impl RtmpHandler for MyHandler {
    async fn on_connect(&self, ctx: &SessionContext) -> Result<Authorization> {
        println!("[{}] Connect: app={}, peer={}", ctx.session_id, ctx.app, ctx.peer_addr);
        Ok(Authorization::Allow)
    }

    async fn on_publish(&self, ctx: &StreamContext) -> Result<Authorization> {
        println!("[{}] Publish: {}", ctx.session.session_id, ctx.stream_key);

        // Example: reject unless the stream key passes some check.
        // if !ctx.stream_key.starts_with("valid_") {
        //     return Ok(Authorization::Reject);
        // }

        Ok(Authorization::Allow)
    }

    async fn on_play(&self, ctx: &StreamContext) -> Result<Authorization> {
        println!("[{}] Play: {}", ctx.session.session_id, ctx.stream_key);
        Ok(Authorization::Allow)
    }

    async fn on_audio(&self, _ctx: &StreamContext, timestamp: u32, data: Bytes) -> Result<()> {
        self.audio_frames.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(data.len() as u64, Ordering::Relaxed);
        tracing::trace!(timestamp, len = data.len(), "audio message");
        Ok(())
    }

    async fn on_video(&self, _ctx: &StreamContext, timestamp: u32, data: Bytes) -> Result<()> {
        self.video_frames.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(data.len() as u64, Ordering::Relaxed);
        tracing::trace!(timestamp, len = data.len(), "video message");
        Ok(())
    }

    async fn on_metadata(&self, ctx: &StreamContext, data: Bytes) -> Result<()> {
        println!(
            "[{}] Metadata for {}: {} bytes",
            ctx.session.session_id,
            ctx.stream_key,
            data.len()
        );
        Ok(())
    }

    async fn on_stream_close(&self, ctx: &StreamContext) -> Result<()> {
        println!("[{}] Stream closed: {}", ctx.session.session_id, ctx.stream_key);
        self.print_stats();
        Ok(())
    }

    async fn on_disconnect(&self, ctx: &SessionContext) -> Result<()> {
        println!("[{}] Disconnected", ctx.session_id);
        Ok(())
    }
}

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:1935
/// - "localhost:1936" -> 127.0.0.1:1936
/// - "127.0.0.1" -> 127.0.0.1:1935
/// - "127.0.0.1:1936" -> 127.0.0.1:1936
/// - "0.0.0.0:1935" -> 0.0.0.0:1935
fn parse_bind_addr(arg: &str) -> std::result::Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 1935;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: simple_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:1935)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  simple_server                     # binds to 0.0.0.0:1935");
    eprintln!("  simple_server localhost           # binds to 127.0.0.1:1935");
    eprintln!("  simple_server localhost:1936      # binds to 127.0.0.1:1936");
    eprintln!("  simple_server 127.0.0.1:1936      # binds to 127.0.0.1:1936");
    eprintln!("  simple_server 0.0.0.0:1940        # binds to 0.0.0.0:1940");
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:1935".parse().unwrap(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("streamcore=debug".parse()?)
                .add_directive("simple_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig {
        bind_addr,
        ..ServerConfig::default()
    };

    println!("Starting RTMP server on {}", config.bind_addr);
    println!();
    println!("=== Publish a stream ===");
    println!("OBS:    Server: rtmp://localhost/live  Stream Key: test");
    println!("ffmpeg: ffmpeg -re -i input.mp4 -c copy -f flv rtmp://localhost/live/test");
    println!();
    println!("=== Play a stream ===");
    println!("VLC:    vlc rtmp://localhost/live/test");
    println!("ffplay: ffplay rtmp://localhost/live/test");
    println!();

    let handler = MyHandler::new();
    let server = Arc::new(RtmpServer::new(config, handler));

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    Ok(())
}
