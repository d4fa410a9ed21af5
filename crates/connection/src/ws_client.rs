//! WebSocket client owning one connection to the chat server.
//!
//! One instance per connection attempt; the manager replaces the whole
//! client on reconnect rather than reusing it. Callbacks are wired at
//! dial time, before the pumps start, so frames the server pushes
//! immediately after the handshake are never lost.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

use agora_protocol::constants::WS_MAX_FRAME_SIZE;
use agora_protocol::{InboundEvent, OutboundFrame};

/// Errors from the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection closed")]
    Closed,
}

/// Callback type for classified inbound events.
pub type EventCallback = Box<dyn Fn(InboundEvent) + Send + Sync>;

/// Callback type for disconnect notification. The argument is `true`
/// when the closure was normal (close code 1000), which suppresses
/// reconnection.
pub type DisconnectCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Builds the close frame for an explicitly requested normal closure.
pub(crate) fn normal_close_frame() -> tungstenite::Message {
    tungstenite::Message::Close(Some(tungstenite::protocol::CloseFrame {
        code: tungstenite::protocol::frame::coding::CloseCode::Normal,
        reason: "".into(),
    }))
}

/// WebSocket client connected to the chat server.
pub struct WsClient {
    write_tx: mpsc::Sender<tungstenite::Message>,
    /// Once set, the disconnect callback is suppressed: the closure was
    /// requested locally and the owner handles the state transition.
    silent: Arc<AtomicBool>,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
    _ping_handle: tokio::task::JoinHandle<()>,
    cancel: tokio_util::sync::CancellationToken,
}

impl WsClient {
    /// Dials the chat endpoint and spawns the read/write/ping pumps with
    /// the given callbacks already in place.
    pub async fn connect(
        url: &str,
        on_event: EventCallback,
        on_disconnect: DisconnectCallback,
    ) -> Result<Self, WsError> {
        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_FRAME_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_FRAME_SIZE);
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false).await?;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(64);
        let silent = Arc::new(AtomicBool::new(false));
        let cancel = tokio_util::sync::CancellationToken::new();

        let write_handle = {
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::write::write_pump(write, write_rx, cancel))
        };

        let read_handle = {
            let silent = silent.clone();
            let write_tx = write_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::read::read_pump(
                read,
                on_event,
                on_disconnect,
                silent,
                write_tx,
                cancel,
            ))
        };

        let ping_handle = {
            let write_tx = write_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::ping::ping_pump(write_tx, cancel))
        };

        Ok(Self {
            write_tx,
            silent,
            _read_handle: read_handle,
            _write_handle: write_handle,
            _ping_handle: ping_handle,
            cancel,
        })
    }

    /// Sends a chat frame to the server.
    pub async fn send_chat(&self, frame: &OutboundFrame) -> Result<(), WsError> {
        let json = frame.encode()?;
        self.write_tx
            .send(tungstenite::Message::Text(json.into()))
            .await
            .map_err(|_| WsError::Closed)
    }

    /// Gracefully closes the connection with the normal closure code.
    ///
    /// The disconnect callback is suppressed: a locally requested close
    /// is never an unexpected disconnect, so the owner is responsible
    /// for any state transition.
    pub async fn close(&self) {
        self.silent.store(true, Ordering::Relaxed);
        let _ = self.write_tx.send(normal_close_frame()).await;
        self.cancel.cancel();
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        self.silent.store(true, Ordering::Relaxed);
        self.cancel.cancel();
        self._read_handle.abort();
        self._write_handle.abort();
        self._ping_handle.abort();
    }
}
