//! Reconnection logic with exponential backoff.
//!
//! Contains the shared [`WsContext`], cancellation helpers, the callback
//! builders wired into each new slot, and the reconnect loop.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use agora_protocol::InboundEvent;

use crate::types::{ConnectionEvent, ConnectionState, ReconnectConfig, TranscriptEntry};
use crate::ws_client::{DisconnectCallback, EventCallback, WsClient, WsError};

/// Shared manager state passed to free functions for slot dialing and
/// reconnection. Avoids threading six separate Arc parameters.
#[derive(Clone)]
pub(crate) struct WsContext {
    pub(crate) endpoint: String,
    pub(crate) ws_client: Arc<Mutex<Option<WsClient>>>,
    pub(crate) state: Arc<RwLock<ConnectionState>>,
    pub(crate) events_tx: mpsc::Sender<ConnectionEvent>,
    /// Cancel token for the pending reconnect loop, if any.
    pub(crate) reconnect_cancel: Arc<std::sync::Mutex<Option<CancellationToken>>>,
    /// Set to true when the caller tears the connection down.
    pub(crate) manual_close: Arc<AtomicBool>,
    pub(crate) reconnect_config: ReconnectConfig,
}

/// Cancels the pending reconnect loop, if any.
pub(crate) fn cancel_any_reconnect(
    reconnect_cancel: &std::sync::Mutex<Option<CancellationToken>>,
) {
    if let Ok(mut guard) = reconnect_cancel.lock()
        && let Some(token) = guard.take()
    {
        token.cancel();
    }
}

/// Arms a fresh reconnect loop, superseding any pending one. At most one
/// pending loop exists at a time.
pub(crate) fn arm_reconnect(ctx: WsContext) {
    let cancel = CancellationToken::new();
    cancel_any_reconnect(&ctx.reconnect_cancel);
    if let Ok(mut guard) = ctx.reconnect_cancel.lock() {
        *guard = Some(cancel.clone());
    }
    tokio::spawn(reconnect_loop(ctx, cancel));
}

/// Dials the endpoint with callbacks wired before the pumps start, so
/// frames the server pushes right after the handshake are not lost.
pub(crate) async fn open_slot(ctx: &WsContext) -> Result<WsClient, WsError> {
    WsClient::connect(
        &ctx.endpoint,
        event_callback(ctx.events_tx.clone()),
        disconnect_callback(ctx.clone()),
    )
    .await
}

/// Forwards classified inbound events to the manager's event channel.
fn event_callback(events_tx: mpsc::Sender<ConnectionEvent>) -> EventCallback {
    Box::new(move |event| {
        let forwarded = match event {
            InboundEvent::ChatMessage { source, text } => {
                ConnectionEvent::Transcript(TranscriptEntry::received(source, text))
            }
            InboundEvent::DeliveryAck { success, text } => {
                debug!(success, %text, "message delivery acknowledged");
                ConnectionEvent::Delivery { success, text }
            }
            InboundEvent::SearchStatus(status) => ConnectionEvent::Search(status),
            InboundEvent::Unrecognized => {
                warn!("unrecognized inbound frame, discarding");
                return;
            }
        };
        if let Err(e) = events_tx.try_send(forwarded) {
            warn!("failed to forward inbound event: {e}");
        }
    })
}

/// Distinguishes normal closure (terminal) from unexpected closure
/// (reconnect with backoff).
fn disconnect_callback(ctx: WsContext) -> DisconnectCallback {
    Box::new(move |normal_closure| {
        let no_reconnect = normal_closure || ctx.manual_close.load(Ordering::Relaxed);

        if no_reconnect {
            // Caller- or peer-requested normal closure.
            if let Ok(mut s) = ctx.state.try_write() {
                *s = ConnectionState::Closed;
            }
            let _ = ctx
                .events_tx
                .try_send(ConnectionEvent::StateChanged(ConnectionState::Closed));
        } else {
            // Unexpected closure — arm exactly one reconnect loop.
            arm_reconnect(ctx.clone());
        }
    })
}

/// Reconnection loop with exponential backoff.
///
/// Returns a boxed future to break the recursive type cycle with
/// [`disconnect_callback`] (which arms this loop on unexpected
/// disconnects of the slot it dials).
pub(crate) fn reconnect_loop(
    ctx: WsContext,
    cancel: CancellationToken,
) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
    Box::pin(async move {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() || ctx.manual_close.load(Ordering::Relaxed) {
                return;
            }

            let delay = ctx.reconnect_config.delay_for_attempt(attempt);
            let delay_secs = delay.as_secs_f64();

            *ctx.state.write().await = ConnectionState::Reconnecting { attempt };
            let _ = ctx
                .events_tx
                .send(ConnectionEvent::StateChanged(
                    ConnectionState::Reconnecting { attempt },
                ))
                .await;
            let _ = ctx
                .events_tx
                .send(ConnectionEvent::Reconnecting {
                    attempt,
                    next_retry_secs: delay_secs,
                })
                .await;

            info!(
                attempt,
                delay_secs = format_args!("{delay_secs:.1}"),
                "reconnecting"
            );

            // Wait for the backoff delay (or cancellation).
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("reconnect cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            if cancel.is_cancelled() {
                return;
            }

            attempt = attempt.saturating_add(1);

            // Close the stale slot if one is still present.
            if let Some(stale) = ctx.ws_client.lock().await.take() {
                stale.close().await;
            }

            match open_slot(&ctx).await {
                Ok(client) => {
                    *ctx.ws_client.lock().await = Some(client);
                    *ctx.state.write().await = ConnectionState::Connected;
                    let _ = ctx
                        .events_tx
                        .send(ConnectionEvent::StateChanged(ConnectionState::Connected))
                        .await;

                    info!("reconnected");
                    break;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "reconnect attempt failed");
                    // Continue — next attempt with increased backoff.
                }
            }
        }

        // A successful reconnect spends the pending token.
        if let Ok(mut guard) = ctx.reconnect_cancel.lock() {
            *guard = None;
        }
    })
}
