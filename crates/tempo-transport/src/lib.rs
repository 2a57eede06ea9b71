//! Transport abstraction layer for Tempo.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract the
//! client's single outbound connection over different network protocols.
//!
//! A [`Transport`] is a connection *factory*: the connection manager asks
//! it to dial whenever it connects or reconnects, attaching the current
//! access credential to the handshake. A [`Connection`] is one live link;
//! it is dropped wholesale on loss and a fresh one is dialed — connections
//! are never resumed.
//!
//! The trait methods return explicit `impl Future + Send` so generic
//! consumers can drive them from spawned tasks.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::future::Future;

/// Dials outbound connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Opens a connection to the server, presenting the given access
    /// credential as part of the handshake.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectFailed`] if the server is
    /// unreachable, and [`TransportError::Rejected`] if it actively
    /// refused the handshake (bad credential, closed endpoint).
    fn connect(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single live connection that can send and receive byte frames.
///
/// `send` and `recv` take `&self` so the connection actor can drive a
/// receive in one `select!` branch while other branches send; interior
/// synchronization is the implementation's business.
pub trait Connection: Send + Sync + 'static {
    /// Sends one frame to the server.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the server.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the connection.
    fn close(
        &self,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
