//! Session task: one per `connect()`.
//!
//! Owns the WebSocket stream for its whole life, including reconnects. Ends on
//! shutdown, when the manager is dropped, or once reconnect attempts run out.

use crate::connection::{ConnectionState, Diagnostic, Shared};
use crate::error::connection::ConnectionError;
use crate::protocol::payloads::{AuthenticatedPayload, ConnectedPayload};
use crate::protocol::{Frame, OutboundCommand, events};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, trace, warn};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep as TokioSleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;

enum Exit {
    Shutdown,
    Lost(String),
}

pub(crate) struct Session {
    shared: Arc<Shared>,
    generation: u64,
    commands: mpsc::UnboundedReceiver<OutboundCommand>,
    shutdown: oneshot::Receiver<()>,
    finished: Arc<AtomicBool>,
}

impl Session {
    pub(crate) fn new(
        shared: Arc<Shared>,
        generation: u64,
        commands: mpsc::UnboundedReceiver<OutboundCommand>,
        shutdown: oneshot::Receiver<()>,
        finished: Arc<AtomicBool>,
    ) -> Self {
        Self {
            shared,
            generation,
            commands,
            shutdown,
            finished,
        }
    }

    pub(crate) async fn run(mut self) {
        let endpoint = self.shared.config.endpoint.clone();
        let max_attempts = self.shared.config.max_reconnect_attempts;
        let mut pacing = Constant::new(self.shared.config.reconnect_delay());
        let mut attempt: u32 = 0;
        let mut retrying = false;

        loop {
            if retrying {
                attempt += 1;
                if attempt > max_attempts {
                    // Must precede the state change and diagnostic
                    self.finished.store(true, Ordering::SeqCst);
                    self.set_state(ConnectionState::Disconnected);
                    if self.shared.is_current(self.generation) {
                        self.shared.emit(Diagnostic::ReconnectExhausted {
                            attempts: max_attempts,
                        });
                    }
                    return;
                }

                self.shared.emit(Diagnostic::ReconnectAttempt {
                    attempt,
                    max_attempts,
                });
                let delay = pacing
                    .next_backoff()
                    .unwrap_or_else(|| self.shared.config.reconnect_delay());
                if !self.pause(delay).await {
                    return;
                }
            }
            retrying = true;

            if self.set_state(ConnectionState::Connecting).is_none() {
                return;
            }

            let opened = tokio::select! {
                _ = &mut self.shutdown => return,
                opened = connect_async(endpoint.as_str()) => opened,
            };

            match opened {
                Ok((stream, _)) => {
                    attempt = 0;
                    pacing.reset();
                    match self.serve(stream).await {
                        Exit::Shutdown => return,
                        Exit::Lost(reason) => self.lost(reason),
                    }
                }
                Err(e) => {
                    let error = ConnectionError::Connect {
                        message: format!("Failed to open {endpoint}: {e}"),
                        location: ErrorLocation::from(Location::caller()),
                    };
                    self.shared.emit(Diagnostic::TransportError {
                        message: error.to_string(),
                    });
                    self.set_state(ConnectionState::Disconnected);
                }
            }
        }
    }

    /// Read and write until the stream is lost or the session is shut down.
    async fn serve(&mut self, stream: WsStream) -> Exit {
        let (mut write, mut read) = stream.split();

        if self.set_state(ConnectionState::Connected).is_none() {
            let _ = write.close().await;
            return Exit::Shutdown;
        }
        self.shared.emit(Diagnostic::Opened {
            endpoint: self.shared.config.endpoint.clone(),
        });
        self.shared.dispatch_lifecycle(events::CONNECT);

        match self.shared.auth.token() {
            Some(token) => {
                if let Some(reason) =
                    send_command(&mut write, &OutboundCommand::Authenticate { token }).await
                {
                    return Exit::Lost(reason);
                }
            }
            None => self.shared.emit(Diagnostic::AuthenticationSkipped),
        }

        loop {
            tokio::select! {
                _ = &mut self.shutdown => {
                    let _ = write.close().await;
                    return Exit::Shutdown;
                }
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Some(reason) = send_command(&mut write, &command).await {
                            return Exit::Lost(reason);
                        }
                    }
                    None => {
                        let _ = write.close().await;
                        return Exit::Shutdown;
                    }
                },
                message = read.next() => match message {
                    Some(Ok(message)) => {
                        if let Some(reason) = self.handle_message(message) {
                            return Exit::Lost(reason);
                        }
                    }
                    Some(Err(e)) => return Exit::Lost(ConnectionError::from(e).to_string()),
                    None => return Exit::Lost("stream ended".to_string()),
                },
            }
        }
    }

    /// Returns a reason if the message closes the connection.
    fn handle_message(&self, message: Message) -> Option<String> {
        match message {
            Message::Text(text) => self.handle_text(text.as_str()),
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => self.handle_text(text),
                Err(e) => self.shared.emit(Diagnostic::MalformedFrame {
                    message: format!("Binary frame is not UTF-8: {e}"),
                }),
            },
            Message::Close(frame) => {
                return Some(match frame {
                    Some(frame) => format!(
                        "closed by server ({}): {}",
                        u16::from(frame.code),
                        frame.reason.as_str()
                    ),
                    None => "closed by server".to_string(),
                });
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
        None
    }

    fn handle_text(&self, text: &str) {
        let frame = match Frame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.shared.emit(Diagnostic::MalformedFrame {
                    message: e.to_string(),
                });
                return;
            }
        };

        trace!("Received '{}' frame", frame.event);

        match frame.event.as_str() {
            events::CONNECTED => {
                let greeting = ConnectedPayload::deserialize(&frame.data).unwrap_or_default();
                self.shared.emit(Diagnostic::ServerGreeting {
                    message: greeting.message,
                });
            }
            events::AUTHENTICATED => self.on_authenticated(&frame),
            _ => {}
        }

        self.shared.registry.dispatch(&frame.event, &frame.data);
    }

    fn on_authenticated(&self, frame: &Frame) {
        match AuthenticatedPayload::deserialize(&frame.data) {
            Ok(payload) if payload.is_success() => {
                if self.set_state(ConnectionState::Authenticated).is_some() {
                    self.shared.emit(Diagnostic::Authenticated {
                        user_id: payload.user_id,
                    });
                }
            }
            Ok(payload) => self.shared.emit(Diagnostic::AuthenticationFailed {
                message: payload.message.or(Some(payload.status)),
            }),
            Err(e) => self.shared.emit(Diagnostic::AuthenticationFailed {
                message: Some(format!("Unreadable handshake result: {e}")),
            }),
        }
    }

    fn lost(&self, reason: String) {
        if let Some(previous) = self.set_state(ConnectionState::Disconnected) {
            self.shared.emit(Diagnostic::Closed { reason });
            if previous.is_open() {
                self.shared.dispatch_lifecycle(events::DISCONNECT);
            }
        }
    }

    /// Wait out a reconnect delay. Returns `false` if shut down meanwhile.
    async fn pause(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = &mut self.shutdown => false,
            _ = TokioSleep(delay) => true,
        }
    }

    fn set_state(&self, state: ConnectionState) -> Option<ConnectionState> {
        self.shared.set_state(self.generation, state)
    }
}

/// Encode and send one command. Returns a reason if the connection is lost.
async fn send_command(write: &mut WsWrite, command: &OutboundCommand) -> Option<String> {
    let text = match command.to_frame().encode() {
        Ok(text) => text,
        Err(e) => {
            warn!("{e}");
            return None;
        }
    };

    match write.send(Message::Text(text.into())).await {
        Ok(()) => {
            debug!("Sent '{}'", command.event());
            None
        }
        Err(e) => {
            let error = ConnectionError::Send {
                message: format!("Failed to send '{}': {e}", command.event()),
                location: ErrorLocation::from(Location::caller()),
            };
            Some(error.to_string())
        }
    }
}
