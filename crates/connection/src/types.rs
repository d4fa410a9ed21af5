//! Public types for the connection manager.

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use agora_protocol::SearchStatus;

/// Label used for locally originated transcript entries.
pub const LOCAL_AGENT: &str = "user";

/// Connection state for the single server slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Manager created, no connection attempted yet.
    #[default]
    Idle,
    /// WebSocket dial in progress.
    Connecting,
    /// Connected; sends are accepted.
    Connected,
    /// Connection lost, a reconnect attempt is scheduled.
    Reconnecting { attempt: u32 },
    /// Normal closure. Terminal: no reconnection.
    Closed,
}

impl ConnectionState {
    /// Whether the channel is verified open for sends.
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Direction of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// One line of the chat transcript.
///
/// Timestamps are generated client-side at receipt; the wire contract
/// carries none.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub direction: Direction,
    pub agent: String,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl TranscriptEntry {
    /// Entry for a message the local user sent.
    pub fn sent(text: impl Into<String>) -> Self {
        Self {
            direction: Direction::Sent,
            agent: LOCAL_AGENT.into(),
            text: text.into(),
            timestamp: Local::now(),
        }
    }

    /// Entry for a message received from a remote agent.
    pub fn received(agent: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            direction: Direction::Received,
            agent: agent.into(),
            text: text.into(),
            timestamp: Local::now(),
        }
    }

    /// `HH:MM` label for rendering next to the entry.
    pub fn time_label(&self) -> String {
        self.timestamp.format("%H:%M").to_string()
    }
}

/// Events emitted by the connection manager.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The connection state changed.
    StateChanged(ConnectionState),
    /// A transcript line was produced (sent or received).
    Transcript(TranscriptEntry),
    /// The server acknowledged delivery of a sent message.
    Delivery { success: bool, text: String },
    /// A search ticket changed state.
    Search(SearchStatus),
    /// Reconnection is in progress.
    Reconnecting { attempt: u32, next_retry_secs: f64 },
}

/// A send request from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Agent identity carried on the wire.
    pub agent_name: String,
    /// Free-form message text; must be non-blank.
    pub text: String,
}

/// Errors returned by [`ConnectionManager::send`](crate::ConnectionManager::send).
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,

    #[error("empty message")]
    EmptyMessage,

    #[error(transparent)]
    Transport(#[from] crate::ws_client::WsError),
}

/// Configuration for automatic reconnection with exponential backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Delay for a given attempt number (0-based).
    ///
    /// Deterministic: the delay sequence is observable contract (1 s,
    /// 2 s, 4 s, 8 s, 16 s, then capped at 30 s), so no jitter is
    /// applied.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}
