//! Classification of inbound frames into typed events.

use serde::{Deserialize, Serialize};

use crate::constants::FrameType;
use crate::frames::InboundFrame;

/// Payload of a `"text"` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct TextData {
    #[serde(default)]
    message: String,
}

/// Payload of a `"search"` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct SearchData {
    search_ticket_id: String,
    status: i64,
}

/// Search ticket status as exposed to the presentation layer.
///
/// On the wire `status` is numeric: `0` means the search is still
/// pending, any other value means it completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStatus {
    pub ticket_id: String,
    pub pending: bool,
}

/// A classified inbound frame.
///
/// Constructed per frame and handed to the presentation layer; never
/// retained by the connection core.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A chat message from a remote agent.
    ChatMessage { source: String, text: String },
    /// The server acknowledged delivery of a previously sent message.
    DeliveryAck { success: bool, text: String },
    /// A search ticket changed state.
    SearchStatus(SearchStatus),
    /// The frame did not match any known discriminator, or its payload
    /// was missing required fields.
    Unrecognized,
}

impl InboundFrame {
    /// Classifies this frame into a typed event.
    ///
    /// Fails safe: anything that does not match a known discriminator with
    /// a well-formed payload yields [`InboundEvent::Unrecognized`]. Never
    /// panics, never errors.
    pub fn classify(&self) -> InboundEvent {
        match self.frame_type {
            FrameType::Text => {
                let data: TextData = match self.parse_data() {
                    Some(d) => d,
                    None => return InboundEvent::Unrecognized,
                };
                if data.message.is_empty() {
                    return InboundEvent::Unrecognized;
                }
                InboundEvent::ChatMessage {
                    source: self.source.clone().unwrap_or_default(),
                    text: data.message,
                }
            }
            FrameType::MessageStatus => {
                if self.success != Some(true) {
                    return InboundEvent::Unrecognized;
                }
                InboundEvent::DeliveryAck {
                    success: true,
                    text: self.message.clone().unwrap_or_default(),
                }
            }
            FrameType::Search => match self.parse_data::<SearchData>() {
                Some(data) => InboundEvent::SearchStatus(SearchStatus {
                    ticket_id: data.search_ticket_id,
                    pending: data.status == 0,
                }),
                None => InboundEvent::Unrecognized,
            },
            FrameType::Unknown => InboundEvent::Unrecognized,
        }
    }

    /// Deserializes the `data` field into the given payload type.
    fn parse_data<T: for<'de> Deserialize<'de>>(&self) -> Option<T> {
        self.data
            .as_ref()
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }
}
