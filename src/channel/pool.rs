//! Shared-channel pool
//!
//! At most one live connection exists per normalized endpoint, shared by
//! any number of callers through reference-counted handles. The pool owns
//! the connections exclusively; callers never close a shared connection,
//! they release their reference and the last release closes it.
//!
//! The pool is an explicit object with its own lifecycle rather than a
//! process-wide singleton, so tests (and embedders with more than one
//! backend) can run isolated instances.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::stats::ChannelStats;

use super::config::ChannelOptions;
use super::endpoint::EndpointKey;
use super::handle::ChannelHandle;
use super::listeners::ListenerRegistry;
use super::transport::{self, Command};

/// One pooled connection
pub(crate) struct PoolEntry {
    pub(crate) key: EndpointKey,
    pub(crate) cmd_tx: mpsc::UnboundedSender<Command>,
    pub(crate) listeners: Arc<ListenerRegistry>,
    pub(crate) refs: AtomicU32,
    pub(crate) stats: Arc<ChannelStats>,
    closed: AtomicBool,
    actor: JoinHandle<()>,
}

impl PoolEntry {
    /// Whether the connection has been closed (last release or dispose)
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let _ = self.cmd_tx.send(Command::Close);
    }
}

pub(crate) struct PoolInner {
    pub(crate) entries: Mutex<HashMap<EndpointKey, Arc<PoolEntry>>>,
    defaults: ChannelOptions,
}

impl PoolInner {
    /// Decrement an entry's reference count; at zero, remove it and close
    /// its connection. The count is adjusted under the entries lock so a
    /// concurrent acquire cannot revive an entry that is being torn down.
    pub(crate) fn release_ref(&self, entry: &Arc<PoolEntry>) {
        let remaining = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let prev = entry.refs.fetch_sub(1, Ordering::AcqRel);
            let remaining = prev.saturating_sub(1);
            if remaining == 0 {
                entries.remove(&entry.key);
            }
            remaining
        };

        if remaining == 0 {
            tracing::info!(endpoint = %entry.key, "Channel closed (last reference)");
            entry.close();
        } else {
            tracing::debug!(endpoint = %entry.key, refs = remaining, "Channel reference released");
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for (_, entry) in entries.drain() {
            entry.close();
            entry.actor.abort();
        }
    }
}

/// Reference-counted pool of shared duplex channels
pub struct ChannelPool {
    inner: Arc<PoolInner>,
}

impl ChannelPool {
    /// Create a pool whose `acquire` uses the given default options
    pub fn new(defaults: ChannelOptions) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                entries: Mutex::new(HashMap::new()),
                defaults,
            }),
        }
    }

    /// Acquire a handle for an endpoint using the pool's default options
    pub fn acquire(&self, endpoint: &str) -> Result<ChannelHandle> {
        self.acquire_with(endpoint, self.inner.defaults.clone())
    }

    /// Acquire a handle for an endpoint
    ///
    /// Equivalent endpoint spellings share one underlying connection; the
    /// first acquire for a key opens it, later acquires bump the reference
    /// count and reuse it.
    pub fn acquire_with(&self, endpoint: &str, options: ChannelOptions) -> Result<ChannelHandle> {
        let key = EndpointKey::resolve(endpoint, &options)?;

        let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = match entries.get(&key) {
            Some(entry) => {
                let refs = entry.refs.fetch_add(1, Ordering::AcqRel) + 1;
                tracing::debug!(endpoint = %key, refs = refs, "Channel reused");
                Arc::clone(entry)
            }
            None => {
                let listeners = ListenerRegistry::new();
                let stats = Arc::new(ChannelStats::new());
                let (cmd_tx, actor) = transport::spawn(
                    key.as_str().to_string(),
                    options,
                    Arc::clone(&listeners),
                    Arc::clone(&stats),
                );

                let entry = Arc::new(PoolEntry {
                    key: key.clone(),
                    cmd_tx,
                    listeners,
                    refs: AtomicU32::new(1),
                    stats,
                    closed: AtomicBool::new(false),
                    actor,
                });

                tracing::info!(endpoint = %key, "Channel opened");
                entries.insert(key, Arc::clone(&entry));
                entry
            }
        };
        drop(entries);

        Ok(ChannelHandle::new(Arc::clone(&self.inner), entry))
    }

    /// Number of live pooled connections
    pub fn connection_count(&self) -> usize {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Close every pooled connection regardless of reference counts
    ///
    /// Outstanding handles become inert: their sends fail with `Closed`.
    pub fn dispose(&self) {
        let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        for (_, entry) in entries.drain() {
            tracing::info!(endpoint = %entry.key, "Channel disposed");
            entry.close();
            entry.actor.abort();
        }
    }
}

impl Default for ChannelPool {
    fn default() -> Self {
        Self::new(ChannelOptions::default())
    }
}
