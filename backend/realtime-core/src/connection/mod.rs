//! Persistent connection to the push server.
//!
//! [`ConnectionManager`] owns at most one session task at a time. The session
//! opens the WebSocket, authenticates, reads frames into the
//! [`EventRegistry`] and reconnects after unexpected loss. Callers only ever
//! observe state and [`Diagnostic`]s; nothing here returns a transport error.
//!
//! # Generations
//!
//! Every `connect()` and `disconnect()` bumps a generation counter. A session
//! only writes state while its generation is current, so a session that is
//! still winding down after `disconnect()` cannot flip the state back.

mod diagnostics;
mod session;
mod state;

pub use diagnostics::Diagnostic;
pub use state::ConnectionState;

use crate::auth::AuthWatch;
use crate::config::ConnectionConfig;
use crate::protocol::{OutboundCommand, events};
use crate::registry::EventRegistry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const DIAGNOSTICS_CAPACITY: usize = 64;

/// State shared between the manager and its session task.
///
/// The session holds only this, never the manager, so dropping every
/// [`ConnectionManager`] clone drops the session's shutdown sender and ends it.
pub(crate) struct Shared {
    pub(crate) config: ConnectionConfig,
    pub(crate) registry: EventRegistry,
    pub(crate) auth: AuthWatch,
    state: watch::Sender<ConnectionState>,
    diagnostics: broadcast::Sender<Diagnostic>,
    generation: Mutex<u64>,
}

impl Shared {
    /// Set the state if `generation` is current. Returns the previous state.
    pub(crate) fn set_state(
        &self,
        generation: u64,
        state: ConnectionState,
    ) -> Option<ConnectionState> {
        let current = self.generation();
        if *current != generation {
            return None;
        }
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Connection state {previous} -> {state}");
        }
        Some(previous)
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        *self.generation() == generation
    }

    pub(crate) fn emit(&self, diagnostic: Diagnostic) {
        diagnostic.log();
        // No receivers is fine
        let _ = self.diagnostics.send(diagnostic);
    }

    pub(crate) fn dispatch_lifecycle(&self, event: &str) {
        self.registry.dispatch(event, &Value::Null);
    }

    fn generation(&self) -> MutexGuard<'_, u64> {
        self.generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

struct SessionHandle {
    commands: mpsc::UnboundedSender<OutboundCommand>,
    shutdown: Option<oneshot::Sender<()>>,
    /// Set by the session before it reports giving up, while the task may still be unwinding.
    finished: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    fn is_running(&self) -> bool {
        !self.finished.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    fn shut_down(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

struct Inner {
    shared: Arc<Shared>,
    session: Mutex<Option<SessionHandle>>,
}

/// Handle on the single persistent connection.
///
/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, registry: EventRegistry, auth: AuthWatch) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (diagnostics, _) = broadcast::channel(DIAGNOSTICS_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                shared: Arc::new(Shared {
                    config,
                    registry,
                    auth,
                    state,
                    diagnostics,
                    generation: Mutex::new(0),
                }),
                session: Mutex::new(None),
            }),
        }
    }

    /// Open the connection in the background.
    ///
    /// No-op while a session is connecting, connected or reconnecting. Must be
    /// called from within a tokio runtime.
    pub fn connect(&self) {
        let mut session = self.session();
        if session.as_ref().is_some_and(SessionHandle::is_running) {
            debug!("connect() ignored, session already running");
            return;
        }

        let generation = {
            let mut current = self.inner.shared.generation();
            *current += 1;
            self.inner
                .shared
                .state
                .send_replace(ConnectionState::Connecting);
            *current
        };

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let finished = Arc::new(AtomicBool::new(false));

        info!(
            "Connecting to {} (session {generation})",
            self.inner.shared.config.endpoint
        );

        let task = tokio::spawn(
            session::Session::new(
                Arc::clone(&self.inner.shared),
                generation,
                commands_rx,
                shutdown_rx,
                Arc::clone(&finished),
            )
            .run(),
        );

        *session = Some(SessionHandle {
            commands: commands_tx,
            shutdown: Some(shutdown_tx),
            finished,
            task,
        });
    }

    /// Close the connection. No automatic reconnect follows. Idempotent.
    pub fn disconnect(&self) {
        let handle = self.session().take();

        let previous = {
            let mut current = self.inner.shared.generation();
            *current += 1;
            self.inner
                .shared
                .state
                .send_replace(ConnectionState::Disconnected)
        };

        if let Some(handle) = handle {
            handle.shut_down();
            self.inner.shared.emit(Diagnostic::Closed {
                reason: "client disconnect".to_string(),
            });
        }

        if previous.is_open() {
            self.inner.shared.dispatch_lifecycle(events::DISCONNECT);
        }
    }

    /// Re-send the handshake with the current token. Dropped unless open.
    pub fn authenticate(&self) -> bool {
        match self.inner.shared.auth.token() {
            Some(token) => self.send(OutboundCommand::Authenticate { token }),
            None => {
                debug!("authenticate() dropped: no token");
                false
            }
        }
    }

    pub fn subscribe_pipeline(&self, question_id: &str) -> bool {
        self.send(OutboundCommand::SubscribePipeline {
            question_id: question_id.to_string(),
        })
    }

    pub fn subscribe_station(&self, station_id: &str) -> bool {
        self.send(OutboundCommand::SubscribeStation {
            station_id: station_id.to_string(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.state.subscribe()
    }

    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.inner.shared.diagnostics.subscribe()
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.inner.shared.registry
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.shared.config.endpoint
    }

    fn send(&self, command: OutboundCommand) -> bool {
        if !self.state().is_open() {
            debug!("'{}' dropped: not connected", command.event());
            return false;
        }

        match self.session().as_ref() {
            Some(handle) => handle.commands.send(command).is_ok(),
            None => false,
        }
    }

    fn session(&self) -> MutexGuard<'_, Option<SessionHandle>> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
