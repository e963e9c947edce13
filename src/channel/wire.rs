//! Named-event envelope codec
//!
//! The backend contract is "named event, arbitrary payload, optional ack".
//! Structured events travel as JSON text frames; encoded camera frames
//! travel as binary frames with a length-prefixed event name so the backend
//! can route them without JSON-parsing megabytes of image data.
//!
//! Binary layout:
//!
//! ```text
//! +----------------+------------------+------------------+
//! | name len (u16) | event name bytes | payload bytes    |
//! +----------------+------------------+------------------+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event dispatched when the underlying connection is established
pub const EVENT_CONNECT: &str = "connect";
/// Event dispatched when the underlying connection is lost or closed
pub const EVENT_DISCONNECT: &str = "disconnect";
/// Event dispatched when a connection attempt fails
pub const EVENT_CONNECT_ERROR: &str = "connect_error";

/// Reserved event name for acknowledgment replies
pub(crate) const ACK_EVENT: &str = "__ack";

/// A structured event envelope (text frames, both directions)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Event name
    pub event: String,
    /// Arbitrary payload
    #[serde(default)]
    pub data: Value,
    /// Acknowledgment correlation id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
}

impl Envelope {
    /// Create an envelope without an ack id
    pub fn event(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            ack: None,
        }
    }

    /// Create an envelope requesting an acknowledgment
    pub fn with_ack(event: impl Into<String>, data: Value, ack: u64) -> Self {
        Self {
            event: event.into(),
            data,
            ack: Some(ack),
        }
    }

    /// Create an acknowledgment reply for the given correlation id
    pub fn ack_reply(ack: u64, data: Value) -> Self {
        Self {
            event: ACK_EVENT.to_string(),
            data,
            ack: Some(ack),
        }
    }

    /// Whether this envelope is an acknowledgment reply
    pub fn is_ack(&self) -> bool {
        self.event == ACK_EVENT && self.ack.is_some()
    }

    /// Serialize to a JSON string
    pub fn encode(&self) -> String {
        // An envelope of (String, Value, Option<u64>) cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse an inbound text frame; malformed frames yield `None`
    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Encode a binary frame event
pub fn encode_binary(event: &str, payload: &[u8]) -> Bytes {
    let name = event.as_bytes();
    let name_len = name.len().min(u16::MAX as usize);

    let mut buf = BytesMut::with_capacity(2 + name_len + payload.len());
    buf.put_u16(name_len as u16);
    buf.put_slice(&name[..name_len]);
    buf.put_slice(payload);
    buf.freeze()
}

/// Decode a binary frame event into `(event, payload)`
///
/// Returns `None` for truncated or non-UTF-8 frames.
pub fn decode_binary(mut frame: Bytes) -> Option<(String, Bytes)> {
    if frame.len() < 2 {
        return None;
    }

    let name_len = frame.get_u16() as usize;
    if frame.len() < name_len {
        return None;
    }

    let name = frame.split_to(name_len);
    let event = std::str::from_utf8(&name).ok()?.to_string();
    Some((event, frame))
}
