//! WebSocket read pump — decodes, classifies, and dispatches inbound
//! frames in arrival order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use agora_protocol::InboundFrame;
use agora_protocol::constants::{CLOSE_NORMAL, WS_PONG_WAIT};

use crate::ws_client::{DisconnectCallback, EventCallback};

/// Reads frames from the WebSocket and dispatches them.
///
/// Uses a pong deadline to detect dead connections: if nothing arrives
/// within [`WS_PONG_WAIT`] the connection is considered dead and the
/// loop exits (triggering the disconnect path). Any incoming frame
/// resets the deadline.
///
/// On exit the disconnect callback fires with `true` if the peer closed
/// normally (code 1000), unless the closure was requested locally
/// (`silent`), in which case no callback fires at all.
pub(crate) async fn read_pump<S>(
    mut read: S,
    on_event: EventCallback,
    on_disconnect: DisconnectCallback,
    silent: Arc<AtomicBool>,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let pong_deadline = tokio::time::sleep(WS_PONG_WAIT);
    tokio::pin!(pong_deadline);

    let mut normal_closure = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut pong_deadline => {
                warn!("pong timeout — connection dead, closing");
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        pong_deadline.as_mut().reset(tokio::time::Instant::now() + WS_PONG_WAIT);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                handle_text_frame(&text, &on_event);
                            }
                            tungstenite::Message::Ping(data) => {
                                trace!("received ping, sending pong");
                                let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Pong(_) => {
                                trace!("received pong");
                            }
                            tungstenite::Message::Close(frame) => {
                                if let Some(ref f) = frame
                                    && u16::from(f.code) == CLOSE_NORMAL
                                {
                                    debug!("peer requested normal closure");
                                    normal_closure = true;
                                }
                                debug!("received close frame");
                                break;
                            }
                            _ => {} // Binary — ignore
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    if !silent.load(Ordering::Relaxed) {
        on_disconnect(normal_closure);
    }
}

/// Decodes and classifies one text frame, then hands the event to the
/// callback. Malformed frames are logged and discarded; they never abort
/// the connection.
fn handle_text_frame(text: &str, on_event: &EventCallback) {
    let frame = match InboundFrame::decode(text) {
        Ok(f) => f,
        Err(e) => {
            warn!("dropping inbound frame: {e}");
            return;
        }
    };

    let event = frame.classify();
    trace!(?event, "classified inbound frame");
    on_event(event);
}
