//! Network layer: server connections and TLS.

pub mod connection;
pub mod tls;

pub use connection::{
    Connection, ConnectionHandle, ConnectionSettings, ConnectionSnapshot, ConnectionState,
    DisconnectReason, QuitMessage,
};
