//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! The access credential rides on the handshake as an `access_token`
//! query parameter — the server authenticates the upgrade request itself,
//! so a connection that opens at all is an authenticated connection.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connection, Transport, TransportError};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A WebSocket-based [`Transport`] that dials a fixed server URL.
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    /// Creates a transport that will dial the given `ws://` or `wss://`
    /// URL (without credential parameters — those are attached per
    /// connection attempt).
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The server URL with the credential attached.
    fn handshake_url(&self, token: &str) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}access_token={}", self.url, sep, token)
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn connect(
        &self,
        token: &str,
    ) -> Result<Self::Connection, TransportError> {
        let url = self.handshake_url(token);
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| match e {
                tungstenite::Error::Http(resp) => TransportError::Rejected(
                    format!("server refused upgrade: {}", resp.status()),
                ),
                other => TransportError::ConnectFailed(
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        other,
                    ),
                ),
            })?;

        tracing::debug!(url = %self.url, "WebSocket connection established");

        Ok(WebSocketConnection {
            ws: Arc::new(Mutex::new(ws)),
        })
    }
}

/// A single WebSocket connection to the server.
pub struct WebSocketConnection {
    ws: Arc<Mutex<WsStream>>,
}

impl Connection for WebSocketConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        use futures_util::SinkExt;
        let msg = Message::Binary(data.to_vec().into());
        self.ws.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        use futures_util::StreamExt;
        loop {
            let msg = self.ws.lock().await.next().await;
            match msg {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.ws.lock().await.close(None).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}
