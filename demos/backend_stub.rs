//! Stand-in inference backend for local testing
//!
//! Run with: cargo run --example backend_stub [BIND_ADDR]
//!
//! Accepts WebSocket connections, consumes binary frame events and answers
//! with synthetic detection streams:
//! - an identity result for every frame (`bbox` array + `name` shape)
//! - an attribute result for every second frame (`box` object + `emotion`
//!   shape), so the two streams arrive at different rates like the real
//!   backend passes do
//!
//! Point the `live_overlay` demo (or any client) at `ws://<addr>/detect`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

use facecast_rs::channel::wire::decode_binary;
use facecast_rs::channel::Envelope;

/// Per-server counters
struct StubStats {
    connections: AtomicU64,
    frames: AtomicU64,
    bytes: AtomicU64,
}

impl StubStats {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            connections: AtomicU64::new(0),
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        })
    }

    fn print(&self) {
        println!(
            "Stats: connections={} frames={} bytes={}",
            self.connections.load(Ordering::Relaxed),
            self.frames.load(Ordering::Relaxed),
            self.bytes.load(Ordering::Relaxed),
        );
    }
}

/// A face box that wanders around the encoded frame over time
fn wandering_box(frame_index: u64) -> (f64, f64, f64, f64) {
    let t = frame_index as f64 * 0.35;
    let x = 80.0 + 50.0 * t.sin();
    let y = 50.0 + 25.0 * t.cos();
    (x, y, 96.0, 110.0)
}

async fn handle_connection(socket: TcpStream, stats: Arc<StubStats>) {
    let peer = socket
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let mut ws = match tokio_tungstenite::accept_async(socket).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("[{}] Handshake failed: {}", peer, e);
            return;
        }
    };

    let session = stats.connections.fetch_add(1, Ordering::Relaxed) + 1;
    println!("[{}] Client connected ({})", session, peer);

    let mut frame_index: u64 = 0;

    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Binary(raw)) => {
                stats.frames.fetch_add(1, Ordering::Relaxed);
                stats.bytes.fetch_add(raw.len() as u64, Ordering::Relaxed);

                let Some((event, payload)) = decode_binary(Bytes::from(raw)) else {
                    eprintln!("[{}] Undecodable binary frame", session);
                    continue;
                };
                tracing::debug!(event = %event, len = payload.len(), "Frame received");

                frame_index += 1;
                let (x, y, w, h) = wandering_box(frame_index);

                // Identity pass: bbox array + name
                let identity = Envelope::event(
                    "identity_result",
                    json!({
                        "faces": [
                            { "bbox": [x, y, w, h], "name": "Alice", "confidence": 0.92 }
                        ]
                    }),
                );
                if ws.send(Message::Text(identity.encode())).await.is_err() {
                    break;
                }

                // Attribute pass: slower, box object + emotion
                if frame_index % 2 == 0 {
                    let attribute = Envelope::event(
                        "attribute_result",
                        json!([
                            {
                                "box": { "x": x + 2.0, "y": y + 1.0, "w": w - 3.0, "h": h - 2.0 },
                                "emotion": "happy",
                                "expressions": { "happy": 0.81, "neutral": 0.12, "surprised": 0.07 },
                                "score": 0.81
                            }
                        ]),
                    );
                    if ws.send(Message::Text(attribute.encode())).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Text(text)) => {
                // Echo an ack when a client asks for one
                if let Some(envelope) = Envelope::decode(&text) {
                    if let Some(id) = envelope.ack {
                        let reply = Envelope::ack_reply(id, json!({"ok": true}));
                        if ws.send(Message::Text(reply.encode())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = ws.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    println!("[{}] Client disconnected after {} frames", session, frame_index);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9004".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("facecast_rs=debug".parse()?)
                .add_directive("backend_stub=debug".parse()?),
        )
        .init();

    let listener = TcpListener::bind(&bind_addr).await?;
    let stats = StubStats::new();

    println!("Backend stub listening on ws://{}/detect", bind_addr);
    println!("Run the client demo: cargo run --example live_overlay");
    println!();

    let stats_printer = Arc::clone(&stats);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(10));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            stats_printer.print();
        }
    });

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, _)) => {
                        tokio::spawn(handle_connection(socket, Arc::clone(&stats)));
                    }
                    Err(e) => eprintln!("Accept failed: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                stats.print();
                return Ok(());
            }
        }
    }
}
