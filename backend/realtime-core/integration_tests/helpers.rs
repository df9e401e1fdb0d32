//! Test helpers for connection integration tests.
//!
//! [`FakePushServer`] is a minimal stand-in for the push server:
//! - Greets every client with `connected`
//! - Answers `authenticate` with `authenticated` (success only for the expected token)
//! - Records every frame a client sends
//! - Pushes frames and drops connections on demand

use realtime_core::auth::AuthState;
use realtime_core::config::ConnectionConfig;
use realtime_core::connection::{ConnectionManager, ConnectionState, Diagnostic};
use realtime_core::protocol::{Frame, events};
use realtime_core::registry::EventRegistry;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const TEST_TOKEN: &str = "test-token-12345";
pub const WAIT: Duration = Duration::from_secs(5);
pub const TEST_RECONNECT_DELAY_MS: u64 = 50;

#[derive(Debug, Clone)]
enum ServerAction {
    Push(String),
    Kick,
}

pub struct FakePushServer {
    port: u16,
    received: mpsc::UnboundedReceiver<Frame>,
    actions: broadcast::Sender<ServerAction>,
    connections: Arc<AtomicUsize>,
    accept_task: JoinHandle<()>,
}

impl FakePushServer {
    pub async fn start(expected_token: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake push server");
        let port = listener.local_addr().expect("No local address").port();

        let (received_tx, received) = mpsc::unbounded_channel();
        let (actions, _) = broadcast::channel(64);
        let connections = Arc::new(AtomicUsize::new(0));

        let token = expected_token.to_string();
        let actions_tx = actions.clone();
        let counter = Arc::clone(&connections);
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_client(
                    stream,
                    token.clone(),
                    received_tx.clone(),
                    actions_tx.subscribe(),
                ));
            }
        });

        Self {
            port,
            received,
            actions,
            connections,
            accept_task,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    pub fn push(&self, event: &str, data: Value) {
        let text = Frame::new(event, data).encode().expect("Failed to encode frame");
        self.push_raw(&text);
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.actions.send(ServerAction::Push(text.to_string()));
    }

    /// Drop every open connection without a close handshake.
    pub fn kick(&self) {
        let _ = self.actions.send(ServerAction::Kick);
    }

    /// Stop listening and drop every open connection.
    pub fn stop(&self) {
        self.accept_task.abort();
        self.kick();
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Next frame sent by any client with the given event name.
    pub async fn next_frame_for(&mut self, event: &str) -> Frame {
        timeout(WAIT, async {
            loop {
                let frame = self.received.recv().await.expect("Server channel closed");
                if frame.event == event {
                    return frame;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("Timed out waiting for '{event}' frame"))
    }
}

impl Drop for FakePushServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_client(
    stream: TcpStream,
    expected_token: String,
    received: mpsc::UnboundedSender<Frame>,
    mut actions: broadcast::Receiver<ServerAction>,
) {
    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    let greeting = Frame::new(events::CONNECTED, json!({"message": "Connected to test server"}));
    if write
        .send(Message::Text(greeting.encode().unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let Ok(frame) = Frame::decode(text.as_str()) else {
                        continue;
                    };
                    if frame.event == events::AUTHENTICATE {
                        let valid = frame.data.get("token").and_then(Value::as_str)
                            == Some(expected_token.as_str());
                        let reply = if valid {
                            json!({"status": "success", "user_id": "user-1"})
                        } else {
                            json!({"status": "error", "message": "Invalid token"})
                        };
                        let reply = Frame::new(events::AUTHENTICATED, reply).encode().unwrap();
                        if write.send(Message::Text(reply.into())).await.is_err() {
                            return;
                        }
                    }
                    let _ = received.send(frame);
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
            action = actions.recv() => match action {
                Ok(ServerAction::Push(text)) => {
                    if write.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                Ok(ServerAction::Kick) | Err(broadcast::error::RecvError::Closed) => return,
                Err(broadcast::error::RecvError::Lagged(_)) => {}
            },
        }
    }
}

pub fn test_config(endpoint: String) -> ConnectionConfig {
    ConnectionConfig {
        endpoint,
        max_reconnect_attempts: 5,
        reconnect_delay_ms: TEST_RECONNECT_DELAY_MS,
    }
}

/// Manager with a logged-in [`AuthState`]. Keep the state alive for the test.
pub fn logged_in_manager(endpoint: String, token: &str) -> (ConnectionManager, AuthState) {
    let auth = AuthState::new();
    auth.login(token);
    let manager = ConnectionManager::new(test_config(endpoint), EventRegistry::new(), auth.watch());
    (manager, auth)
}

/// Endpoint on a port nothing is listening on.
pub async fn unused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let port = listener.local_addr().expect("No local address").port();
    drop(listener);
    format!("ws://127.0.0.1:{port}/ws")
}

pub async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) {
    let mut states = manager.watch_state();
    timeout(WAIT, states.wait_for(|current| *current == state))
        .await
        .unwrap_or_else(|_| panic!("Timed out waiting for state {state}"))
        .expect("State channel closed");
}

/// Collect diagnostics until `stop` matches one (inclusive).
pub async fn collect_diagnostics_until(
    diagnostics: &mut broadcast::Receiver<Diagnostic>,
    stop: impl Fn(&Diagnostic) -> bool,
) -> Vec<Diagnostic> {
    let mut seen = Vec::new();
    let finished = timeout(WAIT, async {
        loop {
            match diagnostics.recv().await {
                Ok(diagnostic) => {
                    let done = stop(&diagnostic);
                    seen.push(diagnostic);
                    if done {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("Diagnostics closed"),
            }
        }
    })
    .await;
    assert!(finished.is_ok(), "Timed out; diagnostics so far: {seen:?}");
    seen
}

/// Forward every `event` frame's data into a channel.
pub fn record_event(
    registry: &EventRegistry,
    event: &str,
) -> mpsc::UnboundedReceiver<Value> {
    let (tx, rx) = mpsc::unbounded_channel();
    registry.subscribe(event, move |data| {
        let _ = tx.send(data.clone());
        Ok(())
    });
    rx
}

pub async fn next_value(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    timeout(WAIT, rx.recv())
        .await
        .expect("Timed out waiting for event")
        .expect("Event channel closed")
}
