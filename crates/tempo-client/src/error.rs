//! Error types for the connection layer.

use tempo_protocol::ProtocolError;
use tempo_transport::TransportError;

/// Errors that can occur in the connection layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// `connect()` was called without a live session.
    #[error("no credential: sign in before connecting")]
    NoCredential,

    /// An outbound operation needs a Connected state. The frame was not
    /// sent; nothing is queued on the caller's behalf.
    #[error("not connected")]
    NotConnected,

    /// Automatic reconnection attempts are exhausted. The client stays in
    /// the Failed state until an explicit `reconnect()`.
    #[error("reconnection attempts exhausted")]
    ConnectionExhausted,

    /// A transport-level failure (dial, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A wire-format failure (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The connection actor is gone (shut down or panicked).
    #[error("connection actor unavailable")]
    Closed,
}
