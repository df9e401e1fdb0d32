//! Read-only view of the application's authentication state.
//!
//! The embedding application owns an [`AuthState`] and calls
//! [`login`](AuthState::login) / [`logout`](AuthState::logout). The core only
//! ever holds an [`AuthWatch`]: it reads the current token for handshakes and
//! requests, and observes the authenticated flag to gate the connection.

use common::RedactedToken;

use std::sync::Arc;

use log::info;
use tokio::sync::watch;

#[derive(Debug, Clone, Default)]
pub struct AuthStatus {
    pub token: Option<RedactedToken>,
    pub authenticated: bool,
}

/// Writable authentication state, owned by the application.
#[derive(Clone)]
pub struct AuthState {
    status: Arc<watch::Sender<AuthStatus>>,
}

impl AuthState {
    pub fn new() -> Self {
        let (status, _) = watch::channel(AuthStatus::default());
        Self {
            status: Arc::new(status),
        }
    }

    pub fn login(&self, token: impl Into<RedactedToken>) {
        let token = token.into();
        self.status.send_modify(|status| {
            status.token = Some(token);
            status.authenticated = true;
        });
        info!("Session authenticated");
    }

    pub fn logout(&self) {
        self.status.send_modify(|status| {
            status.token = None;
            status.authenticated = false;
        });
        info!("Session logged out");
    }

    pub fn watch(&self) -> AuthWatch {
        AuthWatch {
            status: self.status.subscribe(),
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only handle on [`AuthState`].
#[derive(Clone)]
pub struct AuthWatch {
    status: watch::Receiver<AuthStatus>,
}

impl AuthWatch {
    pub fn token(&self) -> Option<RedactedToken> {
        self.status.borrow().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status.borrow().authenticated
    }

    /// Wait for the next change. Errors once the owning [`AuthState`] is gone.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.status.changed().await
    }

    pub(crate) fn mark_seen(&mut self) {
        self.status.borrow_and_update();
    }
}
