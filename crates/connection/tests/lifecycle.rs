//! End-to-end lifecycle tests against a local WebSocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

use agora_connection::{
    ConnectionEvent, ConnectionManager, ConnectionState, Direction, OutboundRequest,
    ReconnectConfig,
};

/// Fast backoff so reconnect tests complete quickly.
fn fast_config() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        backoff_factor: 2.0,
    }
}

async fn recv_event(rx: &mut mpsc::Receiver<ConnectionEvent>) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Waits for a specific state change, skipping unrelated events.
async fn wait_for_state(rx: &mut mpsc::Receiver<ConnectionEvent>, wanted: ConnectionState) {
    loop {
        if let ConnectionEvent::StateChanged(state) = recv_event(rx).await
            && state == wanted
        {
            return;
        }
    }
}

#[tokio::test]
async fn chat_roundtrip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Server: accept one client, push a chat frame, then hand outbound
    // frames over for inspection.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(4);
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(tungstenite::Message::Text(
            r#"{"type":"text","source":"researcher","data":{"message":"hi"}}"#.into(),
        ))
        .await
        .unwrap();

        while let Some(Ok(msg)) = ws.next().await {
            if let tungstenite::Message::Text(text) = msg {
                let _ = outbound_tx.send(text.to_string()).await;
            }
        }
    });

    let mgr = ConnectionManager::new(format!("ws://{addr}/"));
    let mut rx = mgr.take_events().await.unwrap();
    mgr.connect().await;

    // connect() returns only once the slot is installed.
    assert!(mgr.is_connected().await);

    // The server-pushed chat message lands in the transcript. It may
    // arrive before or after the Connected state event, so scan for it.
    loop {
        if let ConnectionEvent::Transcript(entry) = recv_event(&mut rx).await {
            assert_eq!(entry.direction, Direction::Received);
            assert_eq!(entry.agent, "researcher");
            assert_eq!(entry.text, "hi");
            break;
        }
    }

    // A send transmits the wire frame and emits exactly one Sent entry.
    mgr.send(&OutboundRequest {
        agent_name: "researcher".into(),
        text: "hello".into(),
    })
    .await
    .unwrap();

    loop {
        if let ConnectionEvent::Transcript(entry) = recv_event(&mut rx).await {
            assert_eq!(entry.direction, Direction::Sent);
            assert_eq!(entry.agent, "user");
            assert_eq!(entry.text, "hello");
            break;
        }
    }

    let wire = tokio::time::timeout(Duration::from_secs(5), outbound_rx.recv())
        .await
        .expect("timed out waiting for outbound frame")
        .unwrap();
    assert_eq!(wire, r#"{"agent_name":"researcher","message":"hello"}"#);

    mgr.teardown().await;
}

#[tokio::test]
async fn abnormal_close_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        // First connection: drop it without a close frame.
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        drop(ws);

        // Second connection: stay up until the client closes.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let mgr = ConnectionManager::with_config(format!("ws://{addr}/"), fast_config());
    let mut rx = mgr.take_events().await.unwrap();
    mgr.connect().await;

    wait_for_state(&mut rx, ConnectionState::Connected).await;

    // The dropped stream schedules a reconnect starting at attempt 0...
    loop {
        if let ConnectionEvent::Reconnecting { attempt, .. } = recv_event(&mut rx).await {
            assert_eq!(attempt, 0);
            break;
        }
    }

    // ...and the client comes back on its own.
    wait_for_state(&mut rx, ConnectionState::Connected).await;
    assert!(mgr.is_connected().await);

    mgr.teardown().await;
}

#[tokio::test]
async fn server_normal_close_is_terminal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.close(Some(tungstenite::protocol::CloseFrame {
            code: tungstenite::protocol::frame::coding::CloseCode::Normal,
            reason: "".into(),
        }))
        .await
        .unwrap();
        // Drain until the close handshake completes.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let mgr = ConnectionManager::with_config(format!("ws://{addr}/"), fast_config());
    let mut rx = mgr.take_events().await.unwrap();
    mgr.connect().await;

    wait_for_state(&mut rx, ConnectionState::Connected).await;
    wait_for_state(&mut rx, ConnectionState::Closed).await;

    // No reconnect follows a normal closure.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let mut reconnects = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, ConnectionEvent::Reconnecting { .. }) {
            reconnects += 1;
        }
    }
    assert_eq!(reconnects, 0);
    assert_eq!(mgr.state().await, ConnectionState::Closed);
}

#[tokio::test]
async fn teardown_cancels_scheduled_reconnect() {
    // Nothing listening: the dial fails and a reconnect is scheduled.
    let mgr = ConnectionManager::with_config("ws://127.0.0.1:9/", fast_config());
    let mut rx = mgr.take_events().await.unwrap();
    mgr.connect().await;

    loop {
        if let ConnectionEvent::Reconnecting { .. } = recv_event(&mut rx).await {
            break;
        }
    }

    mgr.teardown().await;
    wait_for_state(&mut rx, ConnectionState::Closed).await;

    // The cancelled loop never produces a connection.
    tokio::time::sleep(Duration::from_millis(300)).await;
    while let Ok(event) = rx.try_recv() {
        assert!(
            !matches!(
                event,
                ConnectionEvent::StateChanged(ConnectionState::Connected)
            ),
            "reconnect happened after teardown"
        );
    }
    assert_eq!(mgr.state().await, ConnectionState::Closed);
}
