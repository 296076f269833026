//! Scheduled events and their handlers
//!
//! - **types**: the closed set of event payloads
//! - **handler**: dispatch of each payload onto the iteration state

pub mod handler;
pub mod types;

pub use types::SimEvent;
