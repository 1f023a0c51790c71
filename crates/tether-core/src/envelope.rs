use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChannelError;

/// One transport message, text or binary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

impl Frame {
    /// Length of the raw payload in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text content, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

/// The unit exchanged on the wire: a command plus an opaque JSON payload.
///
/// Encoded as `{"cmd": <string>, "data": <value>}`. The payload is passed
/// through untouched; content policy lives in [`crate::handler::WireHandler`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub cmd: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(cmd: impl Into<String>, data: Value) -> Self {
        Self {
            cmd: cmd.into(),
            data,
        }
    }

    /// Serialize to a text frame.
    pub fn encode(&self) -> Result<Frame, ChannelError> {
        let json = serde_json::to_string(self).map_err(|e| ChannelError::Encode(e.to_string()))?;
        Ok(Frame::Text(json))
    }

    /// Parse an inbound frame. Binary frames are accepted if they hold JSON.
    pub fn decode(frame: &Frame) -> Result<Self, ChannelError> {
        match frame {
            Frame::Text(text) => {
                serde_json::from_str(text).map_err(|e| ChannelError::Decode(e.to_string()))
            }
            Frame::Binary(bytes) => {
                serde_json::from_slice(bytes).map_err(|e| ChannelError::Decode(e.to_string()))
            }
        }
    }
}
