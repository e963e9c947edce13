//! Connection actor
//!
//! One actor task owns each pooled WebSocket connection. Handles talk to it
//! through a command channel; inbound events are dispatched to the shared
//! listener registry. Connection-level failures are surfaced as `connect` /
//! `disconnect` / `connect_error` events, never as errors on the sending
//! side — a lost connection shows up as the absence of fresh results, and
//! an external notification layer can react to the lifecycle events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{ChannelError, Error, Result};
use crate::stats::ChannelStats;

use super::config::ChannelOptions;
use super::listeners::ListenerRegistry;
use super::wire::{self, Envelope, EVENT_CONNECT, EVENT_CONNECT_ERROR, EVENT_DISCONNECT};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Commands a handle can send to its connection actor
pub(crate) enum Command {
    /// Fire-and-forget structured event
    Emit { event: String, data: Value },
    /// Fire-and-forget binary frame event
    EmitBinary { event: String, payload: Bytes },
    /// Structured event expecting an acknowledgment
    EmitWithAck {
        event: String,
        data: Value,
        timeout: Duration,
        reply: oneshot::Sender<Result<Value>>,
    },
    /// Internal: an ack wait expired
    ExpireAck { id: u64 },
    /// Close the connection and stop the actor
    Close,
}

/// How a live connection ended
enum DriveEnd {
    /// Explicit close; do not reconnect
    Closed,
    /// Transport failure; reconnect if enabled
    Lost,
    /// All command senders are gone; actor is orphaned
    Orphaned,
}

struct PendingAck {
    reply: oneshot::Sender<Result<Value>>,
    event: String,
    after: Duration,
}

/// Spawn a connection actor for the given URL
pub(crate) fn spawn(
    url: String,
    options: ChannelOptions,
    listeners: Arc<ListenerRegistry>,
    stats: Arc<ChannelStats>,
) -> (mpsc::UnboundedSender<Command>, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

    let actor = ConnectionActor {
        url,
        options,
        listeners,
        stats,
        cmd_tx: cmd_tx.clone(),
        cmd_rx,
        pending: HashMap::new(),
        next_ack_id: 1,
    };

    let handle = tokio::spawn(actor.run());
    (cmd_tx, handle)
}

struct ConnectionActor {
    url: String,
    options: ChannelOptions,
    listeners: Arc<ListenerRegistry>,
    stats: Arc<ChannelStats>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    pending: HashMap<u64, PendingAck>,
    next_ack_id: u64,
}

impl ConnectionActor {
    async fn run(mut self) {
        let mut attempt: u32 = 0;

        loop {
            tracing::debug!(endpoint = %self.url, "Connecting");

            match tokio::time::timeout(self.options.connect_timeout, connect_async(self.url.as_str()))
                .await
            {
                Ok(Ok((ws, _))) => {
                    attempt = 0;
                    self.stats.record_connect();
                    tracing::info!(endpoint = %self.url, "Channel connected");
                    self.listeners.dispatch(EVENT_CONNECT, &Value::Null);

                    let end = self.drive(ws).await;

                    // In-flight acks cannot complete on a dead connection
                    self.fail_pending();
                    self.listeners.dispatch(EVENT_DISCONNECT, &Value::Null);

                    match end {
                        DriveEnd::Closed | DriveEnd::Orphaned => {
                            tracing::info!(endpoint = %self.url, "Channel closed");
                            return;
                        }
                        DriveEnd::Lost => {
                            tracing::warn!(endpoint = %self.url, "Connection lost");
                        }
                    }
                }
                Ok(Err(e)) => {
                    self.stats.record_connect_failure();
                    tracing::warn!(endpoint = %self.url, error = %e, "Connection attempt failed");
                    self.listeners
                        .dispatch(EVENT_CONNECT_ERROR, &Value::String(e.to_string()));
                }
                Err(_) => {
                    self.stats.record_connect_failure();
                    tracing::warn!(endpoint = %self.url, "Connection attempt timed out");
                    self.listeners.dispatch(
                        EVENT_CONNECT_ERROR,
                        &Value::String("connection timeout".to_string()),
                    );
                }
            }

            if !self.options.reconnect {
                return;
            }

            attempt = attempt.saturating_add(1);
            if !self.backoff(attempt).await {
                return;
            }
        }
    }

    /// Handle commands and inbound traffic on a live connection
    async fn drive(&mut self, mut ws: WsStream) -> DriveEnd {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        let _ = ws.close(None).await;
                        return DriveEnd::Orphaned;
                    };

                    match cmd {
                        Command::Emit { event, data } => {
                            if self.send_envelope(&mut ws, Envelope::event(event, data)).await.is_err() {
                                return DriveEnd::Lost;
                            }
                        }
                        Command::EmitBinary { event, payload } => {
                            let frame = wire::encode_binary(&event, &payload);
                            self.stats.record_frame_out(frame.len());
                            if let Err(e) = ws.send(Message::Binary(frame.to_vec())).await {
                                tracing::warn!(endpoint = %self.url, error = %e, "Binary send failed");
                                return DriveEnd::Lost;
                            }
                        }
                        Command::EmitWithAck { event, data, timeout, reply } => {
                            let id = self.next_ack_id;
                            self.next_ack_id += 1;

                            let envelope = Envelope::with_ack(event.clone(), data, id);
                            self.pending.insert(id, PendingAck { reply, event, after: timeout });

                            if self.send_envelope(&mut ws, envelope).await.is_err() {
                                return DriveEnd::Lost;
                            }

                            // The expiry is delivered as a command so the ack
                            // entry is always removed on the actor itself
                            let expiry_tx = self.cmd_tx.clone();
                            tokio::spawn(async move {
                                tokio::time::sleep(timeout).await;
                                let _ = expiry_tx.send(Command::ExpireAck { id });
                            });
                        }
                        Command::ExpireAck { id } => self.expire_ack(id),
                        Command::Close => {
                            let _ = ws.close(None).await;
                            return DriveEnd::Closed;
                        }
                    }
                }
                msg = ws.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text(&mut ws, &text).await,
                        Some(Ok(Message::Binary(raw))) => {
                            // Inbound traffic is structured events; unexpected
                            // binary frames are counted and dropped
                            self.stats.record_dropped();
                            match wire::decode_binary(Bytes::from(raw)) {
                                Some((event, payload)) => tracing::debug!(
                                    endpoint = %self.url,
                                    event = %event,
                                    len = payload.len(),
                                    "Ignoring inbound binary frame"
                                ),
                                None => tracing::debug!(endpoint = %self.url, "Ignoring undecodable binary frame"),
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return DriveEnd::Lost,
                    }
                }
            }
        }
    }

    async fn handle_text(&mut self, ws: &mut WsStream, text: &str) {
        let Some(envelope) = Envelope::decode(text) else {
            self.stats.record_dropped();
            tracing::debug!(endpoint = %self.url, "Dropping malformed text frame");
            return;
        };

        if envelope.is_ack() {
            let id = envelope.ack.unwrap_or(0);
            match self.pending.remove(&id) {
                Some(pending) => {
                    let _ = pending.reply.send(Ok(envelope.data));
                }
                // Late ack after expiry; nothing is waiting anymore
                None => tracing::debug!(endpoint = %self.url, ack = id, "Ack with no pending wait"),
            }
            return;
        }

        // The backend asked for an ack of its own event
        if let Some(id) = envelope.ack {
            let _ = self
                .send_envelope(ws, Envelope::ack_reply(id, Value::Null))
                .await;
        }

        self.stats.record_event_in();
        self.listeners.dispatch(&envelope.event, &envelope.data);
    }

    async fn send_envelope(
        &mut self,
        ws: &mut WsStream,
        envelope: Envelope,
    ) -> std::result::Result<(), ()> {
        self.stats.record_event_out();
        match ws.send(Message::Text(envelope.encode())).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(endpoint = %self.url, error = %e, "Send failed");
                Err(())
            }
        }
    }

    fn expire_ack(&mut self, id: u64) {
        if let Some(pending) = self.pending.remove(&id) {
            self.stats.record_ack_timeout();
            tracing::warn!(
                endpoint = %self.url,
                event = %pending.event,
                "Ack timed out"
            );
            let _ = pending.reply.send(Err(Error::AckTimeout {
                event: pending.event,
                after: pending.after,
            }));
        }
    }

    fn fail_pending(&mut self) {
        for (_, pending) in self.pending.drain() {
            let _ = pending
                .reply
                .send(Err(Error::Channel(ChannelError::ConnectionLost)));
        }
    }

    /// Wait out the reconnect backoff while still answering commands
    ///
    /// Returns `false` when a close arrived and the actor should stop.
    async fn backoff(&mut self, attempt: u32) -> bool {
        let exp = self
            .options
            .reconnect_delay
            .saturating_mul(1u32 << (attempt - 1).min(16));
        let delay = exp.min(self.options.max_reconnect_delay);

        tracing::debug!(
            endpoint = %self.url,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnect backoff"
        );

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Close) | None => return false,
                    Some(Command::EmitWithAck { reply, .. }) => {
                        let _ = reply.send(Err(Error::Channel(ChannelError::ConnectionLost)));
                    }
                    Some(Command::ExpireAck { id }) => self.expire_ack(id),
                    // Sends are not retried across a reconnect
                    Some(_) => self.stats.record_dropped(),
                }
            }
        }
    }
}
