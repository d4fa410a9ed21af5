//! Application orchestrator — wires the connection manager, transcript
//! state, and terminal I/O together.

use tokio::io::AsyncBufReadExt;

use agora_connection::{
    ConnectionEvent, ConnectionManager, ConnectionState, OutboundRequest, SendError,
};
use agora_protocol::SearchStatus;
use agora_transcript::Transcript;

use crate::config::Config;

/// Runs the chat client until stdin closes, Ctrl-C, or normal closure.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let manager = ConnectionManager::new(config.endpoint.clone());
    let mut events = manager
        .take_events()
        .await
        .ok_or_else(|| anyhow::anyhow!("event receiver already taken"))?;

    let mut transcript = Transcript::new();

    println!("agora chat — {}", config.endpoint);
    manager.connect().await;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => {
                        transcript.apply(&event);
                        render_event(&event);
                    }
                    None => break,
                }
            }

            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        // Disabled-input behavior: blank lines and sends
                        // while disconnected are swallowed at the input
                        // level rather than surfaced as errors.
                        if line.trim().is_empty() || !transcript.is_connected() {
                            continue;
                        }
                        let request = OutboundRequest {
                            agent_name: config.agent_name.clone(),
                            text: line,
                        };
                        match manager.send(&request).await {
                            Ok(()) => {}
                            Err(SendError::NotConnected | SendError::EmptyMessage) => {}
                            Err(SendError::Transport(e)) => {
                                tracing::warn!(error = %e, "send failed");
                            }
                        }
                    }
                    None => {
                        tracing::info!("stdin closed, exiting");
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("SIGINT received, shutting down");
                break;
            }
        }

        if matches!(transcript.state(), ConnectionState::Closed) {
            break;
        }
    }

    // Guaranteed release: cancels any pending reconnect and closes the
    // slot with the normal closure code.
    manager.teardown().await;
    Ok(())
}

/// Renders one connection event as a terminal line.
fn render_event(event: &ConnectionEvent) {
    match event {
        ConnectionEvent::StateChanged(state) => match state {
            ConnectionState::Connecting => println!("· connecting..."),
            ConnectionState::Connected => println!("· connected"),
            ConnectionState::Closed => println!("· closed"),
            ConnectionState::Idle | ConnectionState::Reconnecting { .. } => {}
        },
        ConnectionEvent::Transcript(entry) => {
            println!("[{}] {}: {}", entry.time_label(), entry.agent, entry.text);
        }
        ConnectionEvent::Search(status) => {
            println!("{}", render_search(status));
        }
        ConnectionEvent::Delivery { .. } => {}
        ConnectionEvent::Reconnecting {
            attempt,
            next_retry_secs,
        } => {
            println!(
                "· disconnected — retrying in {next_retry_secs:.0}s (attempt {})",
                attempt + 1
            );
        }
    }
}

/// Renders a search ticket status line.
fn render_search(status: &SearchStatus) -> String {
    let label = if status.pending { "pending" } else { "complete" };
    format!("· search ticket {}: {label}", status.ticket_id)
}
