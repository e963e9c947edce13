//! Shared duplex channel pool
//!
//! Frames go out and detection results come back over one persistent
//! WebSocket per backend endpoint, shared by every part of the application
//! that talks to that endpoint.
//!
//! # Architecture
//!
//! ```text
//!                           ChannelPool
//!                  ┌──────────────────────────┐
//!                  │ entries: HashMap<Key,    │
//!                  │   PoolEntry {            │
//!                  │     cmd_tx ──────────────┼──► connection actor ◄──► WebSocket
//!                  │     listeners,           │        │
//!                  │     refs: AtomicU32,     │        │ inbound events
//!                  │   }                      │        ▼
//!                  │ >                        │   ListenerRegistry
//!                  └────────────┬─────────────┘        │
//!                               │                      │
//!               ┌───────────────┼───────────────┐      │
//!               ▼               ▼               ▼      ▼
//!          [Handle A]      [Handle B]      [Handle C]  callbacks
//!          emit(..)        emit_binary(..) on(..) ──► Subscription
//! ```
//!
//! Equivalent endpoint spellings normalize to the same key, so the pool
//! never opens a duplicate connection to one backend. Each handle is one
//! reference; the last `release()` closes the connection. Connection-level
//! failures are events (`connect`, `disconnect`, `connect_error`), not
//! errors — sends are not retried by the pool.

pub mod config;
pub mod endpoint;
pub mod handle;
pub mod listeners;
pub mod pool;
pub mod wire;

mod transport;

pub use config::ChannelOptions;
pub use endpoint::EndpointKey;
pub use handle::ChannelHandle;
pub use listeners::Subscription;
pub use pool::ChannelPool;
pub use wire::{Envelope, EVENT_CONNECT, EVENT_CONNECT_ERROR, EVENT_DISCONNECT};
