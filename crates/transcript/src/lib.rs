//! Chat transcript state for the presentation layer.

pub mod store;

pub use store::Transcript;
