use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often to send keepalive pings.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Time to wait for a pong response (or any incoming frame).
///
/// This acts as a read deadline: if *nothing* arrives within this window
/// (no pong, no chat frame), the connection is considered dead.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// Maximum inbound frame size in bytes (1 MB).
///
/// Chat frames are small; anything larger is dropped without parsing.
pub const WS_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// WebSocket close code for a normal, explicitly requested closure.
///
/// A close frame carrying this code suppresses reconnection; any other
/// code is treated as an unexpected disconnect.
pub const CLOSE_NORMAL: u16 = 1000;

/// Inbound frame discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameType {
    /// A chat message from a remote agent.
    #[serde(rename = "text")]
    Text,
    /// Delivery acknowledgment for a previously sent message.
    #[serde(rename = "message_status")]
    MessageStatus,
    /// Search ticket status update.
    #[serde(rename = "search")]
    Search,
    /// Forward compatibility: unknown frame types deserialize here.
    #[serde(other)]
    Unknown,
}
