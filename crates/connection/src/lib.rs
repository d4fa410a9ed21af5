//! Connection lifecycle manager for the Agora chat client.
//!
//! Owns the single WebSocket slot to the chat server, classifies inbound
//! frames into typed events, and reconnects automatically with
//! exponential backoff on unexpected disconnects.

pub mod manager;
pub(crate) mod pumps;
pub(crate) mod reconnection;
pub mod types;
pub mod ws_client;

pub use manager::ConnectionManager;
pub use types::{
    ConnectionEvent, ConnectionState, Direction, OutboundRequest, ReconnectConfig, SendError,
    TranscriptEntry,
};
pub use ws_client::{WsClient, WsError};
