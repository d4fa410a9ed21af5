//! Connection manager owning the single server slot.
//!
//! Dials the fixed chat endpoint, forwards classified inbound frames as
//! typed events, reconnects automatically with exponential backoff on
//! unexpected disconnects, and accepts sends only while the channel is
//! verified open.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use agora_protocol::OutboundFrame;

use crate::reconnection::{WsContext, arm_reconnect, cancel_any_reconnect, open_slot};
use crate::types::{
    ConnectionEvent, ConnectionState, OutboundRequest, ReconnectConfig, SendError, TranscriptEntry,
};
use crate::ws_client::WsClient;

/// Connection manager for a single chat endpoint.
pub struct ConnectionManager {
    pub(crate) endpoint: String,
    /// The single owned connection slot. Replaced, never mutated in
    /// place, on each reconnect attempt.
    pub(crate) ws_client: Arc<Mutex<Option<WsClient>>>,
    pub(crate) state: Arc<RwLock<ConnectionState>>,
    pub(crate) events_tx: mpsc::Sender<ConnectionEvent>,
    pub(crate) events_rx: Mutex<Option<mpsc::Receiver<ConnectionEvent>>>,
    /// Cancel token for the pending reconnect loop.
    pub(crate) reconnect_cancel: Arc<std::sync::Mutex<Option<CancellationToken>>>,
    /// Set when the caller tears the connection down.
    pub(crate) manual_close: Arc<AtomicBool>,
    pub(crate) reconnect_config: ReconnectConfig,
}

impl ConnectionManager {
    /// Creates a manager for the given endpoint with default backoff.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_config(endpoint, ReconnectConfig::default())
    }

    /// Creates a manager with a custom reconnection configuration.
    pub fn with_config(endpoint: impl Into<String>, reconnect_config: ReconnectConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);

        Self {
            endpoint: endpoint.into(),
            ws_client: Arc::new(Mutex::new(None)),
            state: Arc::new(RwLock::new(ConnectionState::Idle)),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            reconnect_cancel: Arc::new(std::sync::Mutex::new(None)),
            manual_close: Arc::new(AtomicBool::new(false)),
            reconnect_config,
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<ConnectionEvent>> {
        self.events_rx.lock().await.take()
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    /// Whether the channel is open for sends.
    pub async fn is_connected(&self) -> bool {
        self.state.read().await.is_open()
    }

    /// Opens the connection to the fixed endpoint.
    ///
    /// Idempotent: while a connection attempt, an open slot, or a
    /// scheduled reconnect exists, further calls are no-ops (guards
    /// against duplicate initialization by the owning context).
    ///
    /// No return value; progress is observed via the event channel. A
    /// failed dial hands off to the backoff-driven reconnect loop.
    pub async fn connect(&self) {
        {
            let state = self.state.read().await;
            if !matches!(*state, ConnectionState::Idle | ConnectionState::Closed) {
                debug!(state = ?*state, "connect ignored — already initialized");
                return;
            }
        }
        self.manual_close.store(false, Ordering::Relaxed);
        self.set_state(ConnectionState::Connecting).await;
        info!(endpoint = %self.endpoint, "connecting");

        match open_slot(&self.ws_context()).await {
            Ok(client) => {
                *self.ws_client.lock().await = Some(client);
                self.set_state(ConnectionState::Connected).await;
                info!("connected");
            }
            Err(e) => {
                warn!(error = %e, "connection failed, scheduling reconnect");
                arm_reconnect(self.ws_context());
            }
        }
    }

    /// Sends a chat message while the channel is open.
    ///
    /// On success emits exactly one `Sent` transcript event so the
    /// transcript reflects the user's own message immediately (the
    /// server does not echo it back). Precondition failures return
    /// without transmitting and without a transcript entry.
    pub async fn send(&self, request: &OutboundRequest) -> Result<(), SendError> {
        if request.text.trim().is_empty() {
            return Err(SendError::EmptyMessage);
        }
        if !self.state.read().await.is_open() {
            return Err(SendError::NotConnected);
        }

        let frame = OutboundFrame {
            agent_name: request.agent_name.clone(),
            message: request.text.clone(),
        };
        {
            let client = self.ws_client.lock().await;
            let client = client.as_ref().ok_or(SendError::NotConnected)?;
            client.send_chat(&frame).await?;
        }

        let _ = self
            .events_tx
            .send(ConnectionEvent::Transcript(TranscriptEntry::sent(
                request.text.clone(),
            )))
            .await;
        Ok(())
    }

    /// Tears the connection down.
    ///
    /// Cancels any pending reconnect and closes the active slot with the
    /// normal closure code so the disconnect path does not reschedule.
    /// Idempotent; invoke on every exit path of the owning context.
    pub async fn teardown(&self) {
        self.manual_close.store(true, Ordering::Relaxed);
        cancel_any_reconnect(&self.reconnect_cancel);
        if let Some(client) = self.ws_client.lock().await.take() {
            client.close().await;
        }
        self.set_state(ConnectionState::Closed).await;
        info!("connection torn down");
    }

    /// Builds a [`WsContext`] sharing this manager's state.
    pub(crate) fn ws_context(&self) -> WsContext {
        WsContext {
            endpoint: self.endpoint.clone(),
            ws_client: self.ws_client.clone(),
            state: self.state.clone(),
            events_tx: self.events_tx.clone(),
            reconnect_cancel: self.reconnect_cancel.clone(),
            manual_close: self.manual_close.clone(),
            reconnect_config: self.reconnect_config.clone(),
        }
    }

    /// Updates the connection state and emits an event.
    pub(crate) async fn set_state(&self, new_state: ConnectionState) {
        *self.state.write().await = new_state.clone();
        let _ = self
            .events_tx
            .send(ConnectionEvent::StateChanged(new_state))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A loopback port with nothing listening: dials fail fast with
    // connection refused.
    const DEAD_ENDPOINT: &str = "ws://127.0.0.1:9/";

    #[tokio::test]
    async fn new_manager_is_idle() {
        let mgr = ConnectionManager::new(DEAD_ENDPOINT);
        assert_eq!(mgr.state().await, ConnectionState::Idle);
        assert!(!mgr.is_connected().await);
    }

    #[tokio::test]
    async fn take_events_once() {
        let mgr = ConnectionManager::new(DEAD_ENDPOINT);
        assert!(mgr.take_events().await.is_some());
        assert!(mgr.take_events().await.is_none());
    }

    #[tokio::test]
    async fn send_without_connection_fails() {
        let mgr = ConnectionManager::new(DEAD_ENDPOINT);
        let mut rx = mgr.take_events().await.unwrap();

        let request = OutboundRequest {
            agent_name: "researcher".into(),
            text: "hello".into(),
        };
        let result = mgr.send(&request).await;
        assert!(matches!(result, Err(SendError::NotConnected)));

        // No transcript entry for a rejected send.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_blank_message_fails() {
        let mgr = ConnectionManager::new(DEAD_ENDPOINT);
        let mut rx = mgr.take_events().await.unwrap();

        let request = OutboundRequest {
            agent_name: "researcher".into(),
            text: "   \t ".into(),
        };
        let result = mgr.send(&request).await;
        assert!(matches!(result, Err(SendError::EmptyMessage)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let mgr = ConnectionManager::new(DEAD_ENDPOINT);
        mgr.teardown().await;
        mgr.teardown().await;
        assert_eq!(mgr.state().await, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn teardown_cancels_pending_reconnect() {
        let mgr = ConnectionManager::new(DEAD_ENDPOINT);

        let token = CancellationToken::new();
        *mgr.reconnect_cancel.lock().unwrap() = Some(token.clone());

        mgr.teardown().await;

        assert!(token.is_cancelled());
        assert!(mgr.reconnect_cancel.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_dial_schedules_reconnect() {
        let mgr = ConnectionManager::new(DEAD_ENDPOINT);
        let mut rx = mgr.take_events().await.unwrap();

        mgr.connect().await;

        // Connecting, then the reconnect loop announces attempt 0 with a
        // 1 s first delay.
        let mut saw_connecting = false;
        let mut first_retry = None;
        while first_retry.is_none() {
            match tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
                .await
                .expect("event expected")
                .expect("channel open")
            {
                ConnectionEvent::StateChanged(ConnectionState::Connecting) => {
                    saw_connecting = true;
                }
                ConnectionEvent::Reconnecting {
                    attempt,
                    next_retry_secs,
                } => {
                    first_retry = Some((attempt, next_retry_secs));
                }
                _ => {}
            }
        }
        assert!(saw_connecting);
        assert_eq!(first_retry, Some((0, 1.0)));

        mgr.teardown().await;
    }

    #[tokio::test]
    async fn connect_twice_keeps_single_attempt() {
        let mgr = ConnectionManager::new(DEAD_ENDPOINT);
        let mut rx = mgr.take_events().await.unwrap();

        mgr.connect().await;
        mgr.connect().await; // No-op: already initialized.
        mgr.teardown().await;

        let mut connecting_count = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ConnectionEvent::StateChanged(ConnectionState::Connecting)) {
                connecting_count += 1;
            }
        }
        assert_eq!(connecting_count, 1);
    }
}
