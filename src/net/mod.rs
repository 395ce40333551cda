// Network layer module
// Provides async TCP networking for the proximity server

pub mod connection;
pub mod json_client;
pub mod listener;
pub mod messages;

pub use connection::Connection;
pub use json_client::{ClientState, JsonClient};
pub use listener::TcpServer;
pub use messages::{ClientMessage, ServerMessage};
