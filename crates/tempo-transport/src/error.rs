/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed or lost mid-operation.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Dialing the server failed before a connection was established.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The server actively refused the handshake.
    #[error("handshake rejected: {0}")]
    Rejected(String),
}
