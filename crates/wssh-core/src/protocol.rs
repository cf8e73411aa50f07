//! Wire protocol for the remote-terminal channel.
//!
//! One JSON object per WebSocket message:
//!
//! - `{"operation":"stdin","data":"<text>"}`
//! - `{"operation":"resize","data":null,"cols":80,"rows":24}`
//! - `{"operation":"stdout","data":"<text>"}`
//!
//! Encoding is strict: a send always produces a single well-formed object.
//! Decoding is lenient: a payload that does not parse as a protocol message
//! becomes [`Inbound::Raw`], which the caller renders as stdout data. The
//! asymmetry is deliberate and keeps interop with peers that stream
//! unframed text.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_COLS, DEFAULT_ROWS};
use crate::error::{Error, Result};

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TermSize {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }
}

/// Protocol-level tag distinguishing message purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Local keystroke or submitted line, client to server.
    Stdin,
    /// Remote output to render locally, server to client.
    Stdout,
    /// Terminal dimension change, client to server.
    Resize,
    /// Any operation this client does not recognize. Decode-only; the
    /// encoder never produces it.
    #[serde(other)]
    Unknown,
}

/// A single self-contained protocol message.
///
/// `data` is always present on the wire (possibly null); `cols`/`rows` are
/// flattened at the top level and only serialized for resize messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub operation: Operation,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u16>,
}

impl ProtocolMessage {
    /// Build a `stdin` message carrying keyboard data.
    pub fn stdin(data: impl Into<String>) -> Self {
        Self {
            operation: Operation::Stdin,
            data: Some(data.into()),
            cols: None,
            rows: None,
        }
    }

    /// Build a `stdout` message (server side and tests).
    pub fn stdout(data: impl Into<String>) -> Self {
        Self {
            operation: Operation::Stdout,
            data: Some(data.into()),
            cols: None,
            rows: None,
        }
    }

    /// Build a `resize` message for the given dimensions.
    pub fn resize(size: TermSize) -> Self {
        Self {
            operation: Operation::Resize,
            data: None,
            cols: Some(size.cols),
            rows: Some(size.rows),
        }
    }

    /// Encode to a single JSON object.
    ///
    /// Strict: any serialization failure is a codec error, never sent
    /// partially.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Codec {
            message: format!("serialization failed: {}", e),
        })
    }
}

/// Result of leniently decoding an inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Payload parsed as a protocol message.
    Message(ProtocolMessage),
    /// Payload was not protocol JSON; to be rendered as raw stdout data
    /// without re-encoding.
    Raw(String),
}

/// Decode an inbound payload.
///
/// Never fails: anything that does not parse as a protocol object comes
/// back as [`Inbound::Raw`]. No partial-message state is retained across
/// calls - every payload is decoded on its own.
pub fn decode(payload: &str) -> Inbound {
    match serde_json::from_str::<ProtocolMessage>(payload) {
        Ok(msg) => Inbound::Message(msg),
        Err(_) => Inbound::Raw(payload.to_string()),
    }
}
