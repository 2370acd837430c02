//! WebSocket transport: one persistent connection per worker
//!
//! The handshake carries the job's headers. Each `send` writes one text
//! frame and waits for one frame back; success reports status 200 with the
//! returned frame's size. Shutdown sends a normal-closure control frame.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::client::{build_header_map, SendOutcome};
use crate::errors::{BarrageError, ErrorContext, Result};
use crate::job::JobDescriptor;

#[derive(Debug)]
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    io_timeout: Duration,
}

impl WsTransport {
    pub async fn connect(descriptor: &JobDescriptor, url: &str) -> Result<Self> {
        let mut request = url
            .into_client_request()
            .with_transport_context(&format!("Failed to create WebSocket request for {}", url))?;
        request.headers_mut().extend(build_header_map(&descriptor.headers)?);

        let (stream, _response) = connect_async(request)
            .await
            .with_transport_context(&format!("Failed to connect to WebSocket server at {}", url))?;
        debug!("websocket connected to {}", url);

        Ok(Self {
            stream,
            io_timeout: descriptor.timeout(),
        })
    }

    pub async fn send(&mut self, body: &str) -> Result<SendOutcome> {
        match timeout(
            self.io_timeout,
            self.stream.send(Message::Text(body.to_string())),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(BarrageError::transport("websocket write timed out")),
        }

        match timeout(self.io_timeout, self.stream.next()).await {
            Ok(Some(Ok(message))) => Ok(SendOutcome {
                status_code: 200,
                bytes_read: message_bytes(&message),
            }),
            Ok(Some(Err(e))) => Err(e.into()),
            Ok(None) => Err(BarrageError::transport("websocket stream ended")),
            Err(_) => Err(BarrageError::transport("websocket read timed out")),
        }
    }

    pub async fn close(&mut self) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        if let Err(e) = self.stream.close(Some(frame)).await {
            debug!("websocket close: {}", e);
        }
    }
}

fn message_bytes(message: &Message) -> u64 {
    match message {
        Message::Text(value) => value.len() as u64,
        Message::Binary(value) => value.len() as u64,
        Message::Ping(value) => value.len() as u64,
        Message::Pong(value) => value.len() as u64,
        Message::Close(_) => 0,
        Message::Frame(_) => 0,
    }
}
