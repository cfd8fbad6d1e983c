//! Core functionality for the relay server

pub mod connection;
pub mod dispatcher;
pub mod listener;
pub mod message;
pub mod room;
pub mod server;
pub mod session;

// Re-export main components for convenience
pub use connection::{Connection, Inbound};
pub use dispatcher::Dispatcher;
pub use listener::{StreamListener, UdpListener};
pub use message::{Command, Message, Protocol};
pub use room::RoomRegistry;
pub use server::{PushRequest, RelayServer, SharedRelayServer};
pub use session::{Identity, Outbound, Session};
