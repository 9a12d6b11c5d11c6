//! Minimal Chrome DevTools Protocol client over a single target WebSocket.
//!
//! Only what the page-ready barrier needs: numbered commands with matching
//! responses, and a queue of events that arrived while a command was pending.

use std::collections::VecDeque;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::errors::EngineError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct CdpConnection {
    socket: Socket,
    next_id: u64,
    events: VecDeque<Value>,
}

impl CdpConnection {
    pub async fn connect(ws_url: &str) -> Result<Self, EngineError> {
        let (socket, _) = connect_async(ws_url)
            .await
            .map_err(|e| EngineError::Protocol(format!("connect {}: {}", ws_url, e)))?;
        Ok(Self {
            socket,
            next_id: 0,
            events: VecDeque::new(),
        })
    }

    /// Send a command and wait for its response. Events received in the
    /// meantime are queued for [`next_event`](Self::next_event).
    pub async fn call(&mut self, method: &str, params: Value) -> Result<Value, EngineError> {
        self.next_id += 1;
        let id = self.next_id;
        let frame = json!({"id": id, "method": method, "params": params}).to_string();
        self.socket
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| EngineError::Protocol(format!("send {}: {}", method, e)))?;

        loop {
            let message = self.read_message().await?;
            if message.get("id").and_then(Value::as_u64) == Some(id) {
                if let Some(error) = message.get("error") {
                    let text = error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error");
                    return Err(EngineError::Protocol(format!("{}: {}", method, text)));
                }
                return Ok(message.get("result").cloned().unwrap_or(Value::Null));
            }
            if message.get("method").is_some() {
                self.events.push_back(message);
            }
        }
    }

    /// Next protocol event, queued ones first.
    pub async fn next_event(&mut self) -> Result<Value, EngineError> {
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }
        loop {
            let message = self.read_message().await?;
            if message.get("method").is_some() {
                return Ok(message);
            }
        }
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }

    async fn read_message(&mut self) -> Result<Value, EngineError> {
        loop {
            let frame = self
                .socket
                .next()
                .await
                .ok_or_else(|| EngineError::Protocol("DevTools socket closed".into()))?
                .map_err(|e| EngineError::Protocol(format!("read: {}", e)))?;
            match frame {
                Message::Text(text) => {
                    return serde_json::from_str(text.as_str())
                        .map_err(|e| EngineError::Protocol(format!("bad frame: {}", e)));
                }
                Message::Close(_) => {
                    return Err(EngineError::Protocol("DevTools socket closed".into()));
                }
                other => debug!(?other, "ignoring non-text DevTools frame"),
            }
        }
    }
}

/// True when `event` is the lifecycle milestone `name` for navigation `loader_id`.
pub fn is_lifecycle_event(event: &Value, name: &str, loader_id: &str) -> bool {
    event.get("method").and_then(Value::as_str) == Some("Page.lifecycleEvent")
        && event.pointer("/params/name").and_then(Value::as_str) == Some(name)
        && event.pointer("/params/loaderId").and_then(Value::as_str) == Some(loader_id)
}
