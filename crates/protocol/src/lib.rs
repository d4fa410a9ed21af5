//! Wire protocol types for the Agora chat client.
//!
//! Defines the JSON frame shapes exchanged with the chat server and the
//! classification of inbound frames into typed events.

pub mod constants;
pub mod events;
pub mod frames;

pub use constants::FrameType;
pub use events::{InboundEvent, SearchStatus};
pub use frames::{InboundFrame, OutboundFrame, WireError};
