//! Rusty Relay - a room-based connection server
//!
//! Clients connect over TCP, UDP or HTTP, join rooms and publish messages
//! that are relayed to backend HTTP services. Backends can push messages
//! back to every member of a room through the admin API.

pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod events;
pub mod handlers;
pub mod protocol;
pub mod publish;

// Re-export main components
pub use config::*;
pub use constants::*;
