//! Caller-facing channel handle
//!
//! A handle is one reference to a pooled connection. Emits go through the
//! connection actor; listener registration hands back RAII
//! [`Subscription`]s, so releasing a handle never disturbs listeners other
//! sharers registered on the same connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{ChannelError, Error, Result};
use crate::stats::ChannelStatsSnapshot;

use super::endpoint::EndpointKey;
use super::listeners::Subscription;
use super::pool::{PoolEntry, PoolInner};
use super::transport::Command;

/// One reference to a shared duplex channel
///
/// Dropping the handle releases its reference; the last release closes the
/// underlying connection. `release()` more than once is a no-op beyond the
/// first.
pub struct ChannelHandle {
    pool: Arc<PoolInner>,
    entry: Arc<PoolEntry>,
    released: AtomicBool,
}

impl ChannelHandle {
    pub(crate) fn new(pool: Arc<PoolInner>, entry: Arc<PoolEntry>) -> Self {
        Self {
            pool,
            entry,
            released: AtomicBool::new(false),
        }
    }

    /// The normalized endpoint this handle is connected to
    pub fn endpoint(&self) -> &EndpointKey {
        &self.entry.key
    }

    /// Send a fire-and-forget structured event
    ///
    /// Success means the event was queued; whether it reaches the backend
    /// depends on the connection, and a loss surfaces as a `disconnect`
    /// event rather than an error here.
    pub fn emit(&self, event: &str, data: Value) -> Result<()> {
        self.ensure_active()?;
        self.entry
            .cmd_tx
            .send(Command::Emit {
                event: event.to_string(),
                data,
            })
            .map_err(|_| Error::Channel(ChannelError::Closed))
    }

    /// Send a binary frame event (encoded camera frame)
    pub fn emit_binary(&self, event: &str, payload: Bytes) -> Result<()> {
        self.ensure_active()?;
        self.entry
            .cmd_tx
            .send(Command::EmitBinary {
                event: event.to_string(),
                payload,
            })
            .map_err(|_| Error::Channel(ChannelError::Closed))
    }

    /// Send a structured event and wait for its acknowledgment
    ///
    /// Resolves with the ack payload, or fails with [`Error::AckTimeout`]
    /// once `timeout` elapses. A timed-out ack leaves nothing behind: the
    /// pending entry is removed on expiry, and a late ack is ignored.
    pub async fn emit_with_ack(&self, event: &str, data: Value, timeout: Duration) -> Result<Value> {
        self.ensure_active()?;

        let (reply, rx) = oneshot::channel();
        self.entry
            .cmd_tx
            .send(Command::EmitWithAck {
                event: event.to_string(),
                data,
                timeout,
                reply,
            })
            .map_err(|_| Error::Channel(ChannelError::Closed))?;

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::Channel(ChannelError::Closed)),
        }
    }

    /// Register a listener for an inbound event
    ///
    /// The listener lives exactly as long as the returned [`Subscription`].
    pub fn on(
        &self,
        event: &str,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        self.ensure_active()?;
        Ok(self.entry.listeners.add(event, Arc::new(callback)))
    }

    /// Release this reference to the shared connection
    ///
    /// Idempotent; the connection closes when the last reference is
    /// released.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.pool.release_ref(&self.entry);
    }

    /// Whether this handle has been released
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Whether another handle shares this handle's underlying connection
    pub fn shares_connection_with(&self, other: &ChannelHandle) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }

    /// Current connection statistics
    pub fn stats(&self) -> ChannelStatsSnapshot {
        self.entry.stats.snapshot()
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self, event: &str) -> usize {
        self.entry.listeners.count(event)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_released() {
            return Err(Error::Channel(ChannelError::Released));
        }
        if self.entry.is_closed() {
            return Err(Error::Channel(ChannelError::Closed));
        }
        Ok(())
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("endpoint", &self.entry.key)
            .field("released", &self.is_released())
            .finish()
    }
}
