//! End-to-end overlay session against an in-process backend stub
//!
//! Run with: cargo run --example live_overlay
//!
//! Spawns a stub inference backend on an ephemeral port, streams a synthetic
//! test pattern to it, fuses the two detection streams it answers with and
//! draws the overlay. Halfway through, the "window" is resized to show the
//! debounced replay. The final overlay is written to `overlay.png`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use facecast_rs::capture::TestPattern;
use facecast_rs::channel::wire::decode_binary;
use facecast_rs::channel::{ChannelOptions, ChannelPool, Envelope};
use facecast_rs::client::OverlaySession;
use facecast_rs::config::StreamSettings;
use facecast_rs::geometry::Rect;
use facecast_rs::overlay::{
    FixedView, OverlayCanvas, OverlayRenderer, ViewportSignal, ViewportSignals,
};

/// Minimal in-process stand-in for the inference backend
async fn spawn_stub() -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
                    return;
                };

                let mut frame_index = 0u64;
                while let Some(Ok(msg)) = ws.next().await {
                    let raw = match msg {
                        Message::Binary(raw) => raw,
                        Message::Text(text) => {
                            // Ack the client's configure announce
                            if let Some(envelope) = Envelope::decode(&text) {
                                if let Some(id) = envelope.ack {
                                    let reply = Envelope::ack_reply(id, json!({"ok": true}));
                                    if ws.send(Message::Text(reply.encode())).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            continue;
                        }
                        _ => continue,
                    };
                    if decode_binary(Bytes::from(raw)).is_none() {
                        continue;
                    }

                    frame_index += 1;
                    let x = 60.0 + 40.0 * (frame_index as f64 * 0.4).sin();

                    let identity = Envelope::event(
                        "identity_result",
                        json!({ "faces": [{ "bbox": [x, 40.0, 90.0, 100.0], "name": "Alice" }] }),
                    );
                    if ws.send(Message::Text(identity.encode())).await.is_err() {
                        return;
                    }

                    if frame_index % 2 == 0 {
                        let attribute = Envelope::event(
                            "attribute_result",
                            json!([{
                                "box": { "x": x + 2.0, "y": 41.0, "w": 88.0, "h": 98.0 },
                                "emotion": "happy",
                                "score": 0.81
                            }]),
                        );
                        if ws.send(Message::Text(attribute.encode())).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    Ok(addr.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("facecast_rs=debug".parse()?)
                .add_directive("live_overlay=info".parse()?),
        )
        .init();

    let stub_addr = spawn_stub().await?;
    println!("Backend stub on ws://{}/detect", stub_addr);

    // Fast capture so the demo has something to show within seconds
    let settings = StreamSettings::default()
        .encode_width(320)
        .capture_interval(Duration::from_millis(200));

    let pool = ChannelPool::new(ChannelOptions::default().secure(false));
    let renderer = Arc::new(OverlayRenderer::default());
    let (mut session, mut events) = OverlaySession::new(settings, Arc::clone(&renderer));

    // The "camera": a moving synthetic pattern
    let source = Arc::new(TestPattern::new(640, 480));
    let ticker_source = Arc::clone(&source);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(100));
        loop {
            ticker.tick().await;
            ticker_source.advance();
        }
    });

    // The "video element" and its overlay canvas at 2x DPI
    let view = Arc::new(FixedView::new(Rect::new(0.0, 0.0, 480.0, 360.0)));
    let canvas = Arc::new(Mutex::new(OverlayCanvas::new(2.0)));

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("Event: {:?}", event);
        }
    });

    session.start(
        &pool,
        &format!("ws://{}/detect", stub_addr),
        Arc::clone(&source) as _,
        Arc::clone(&view) as _,
        Arc::clone(&canvas),
    )?;

    // Viewport signals would come from the windowing layer
    let signals = ViewportSignals::new();
    session.attach_resize(&signals);

    tokio::time::sleep(Duration::from_secs(2)).await;

    // Simulate a window resize; the debounced replay recomputes geometry
    println!("Resizing view to 640x480...");
    view.set_rect(Rect::new(0.0, 0.0, 640.0, 480.0));
    signals.notify(ViewportSignal::Resized);

    tokio::time::sleep(Duration::from_secs(2)).await;

    if let Some(stats) = session.pipeline_stats() {
        println!(
            "Pipeline: ticks={} captured={} skipped={} avg_frame={}B",
            stats.ticks,
            stats.frames_captured,
            stats.frames_skipped,
            stats.average_frame_size(),
        );
    }
    if let Some(stats) = session.channel_stats() {
        println!(
            "Channel: connects={} events_in={} frames_out={}",
            stats.connects, stats.events_in, stats.frames_out,
        );
    }

    {
        let canvas = canvas.lock().unwrap();
        let (w, h) = canvas.buffer_size();
        canvas.buffer().save("overlay.png")?;
        println!("Overlay written to overlay.png ({}x{})", w, h);
    }

    session.stop();
    pool.dispose();
    Ok(())
}
