//! WebSocket transport using tungstenite.
//!
//! Connects to `{base_url}/document/{document_id}`. The relay identifies
//! the participant from its own session, so the site id is not part of the
//! URL.

use super::transport::{Connection, Transport};
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

/// Opens one websocket per document session
#[derive(Debug, Clone)]
pub struct WsTransport {
    base_url: String,
}

impl WsTransport {
    /// `base_url` is the relay root, e.g. `ws://localhost:8080/ws`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Websocket URL of a document
    pub fn document_url(&self, document_id: &str) -> String {
        format!("{}/document/{}", self.base_url.trim_end_matches('/'), document_id)
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn transport_type(&self) -> &'static str {
        "websocket"
    }

    async fn connect(&self, document_id: &str, site_id: &str) -> Result<Box<dyn Connection>> {
        let url = self.document_url(document_id);
        let (stream, response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| SyncError::ConnectionFailed {
                    address: url.clone(),
                    reason: e.to_string(),
                })?;

        debug!(%url, site = %site_id, status = %response.status(), "Websocket connected");
        Ok(Box::new(WsConnection { stream }))
    }
}

/// An open websocket
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.stream
            .send(Message::Text(frame))
            .await
            .map_err(|e| SyncError::Transport(format!("Failed to send frame: {}", e)))
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(data)) => {
                    return Some(String::from_utf8(data).map_err(|e| {
                        SyncError::Protocol(format!("Binary frame is not UTF-8: {}", e))
                    }));
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Websocket closed by relay");
                    return None;
                }
                // Pings are answered by tungstenite on the next read or write
                Ok(other) => trace!(?other, "Ignoring control frame"),
                Err(e) => {
                    return Some(Err(SyncError::Transport(format!(
                        "Failed to receive frame: {}",
                        e
                    ))))
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| SyncError::Transport(format!("Failed to close websocket: {}", e)))
    }
}
