use serde::{Deserialize, Serialize};

use crate::constants::{FrameType, WS_MAX_FRAME_SIZE};

/// Errors from decoding a raw inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame too large ({size} bytes)")]
    TooLarge { size: usize },
}

/// Envelope for all inbound frames.
///
/// Which optional fields are present depends on the discriminator:
/// `"text"` carries `source` and `data.message`, `"message_status"`
/// carries `success` and `message`, `"search"` carries `data` with a
/// ticket ID and numeric status. Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InboundFrame {
    /// Decodes a raw text frame, rejecting oversized payloads up front.
    pub fn decode(raw: &str) -> Result<Self, WireError> {
        if raw.len() > WS_MAX_FRAME_SIZE {
            return Err(WireError::TooLarge { size: raw.len() });
        }
        Ok(serde_json::from_str(raw)?)
    }
}

/// Outbound chat frame: `{"agent_name": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub agent_name: String,
    pub message: String,
}

impl OutboundFrame {
    /// Serializes the frame for transmission.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
