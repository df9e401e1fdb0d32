//! Ties the connection to the application's login state.

use crate::auth::AuthWatch;
use crate::connection::ConnectionManager;

use log::{debug, info};
use tokio::task::JoinHandle;

/// Connects while authenticated, disconnects otherwise.
pub struct ActivationPolicy;

impl ActivationPolicy {
    /// Apply the current authentication state, then follow every change.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(connection: ConnectionManager, mut auth: AuthWatch) -> ActivationHandle {
        let task = tokio::spawn(async move {
            auth.mark_seen();
            let mut authenticated = auth.is_authenticated();
            apply(&connection, authenticated);

            while auth.changed().await.is_ok() {
                let now = auth.is_authenticated();
                if now != authenticated {
                    authenticated = now;
                    apply(&connection, authenticated);
                }
            }

            debug!("Authentication source dropped, activation policy stopped");
        });

        ActivationHandle { task }
    }
}

fn apply(connection: &ConnectionManager, authenticated: bool) {
    if authenticated {
        info!("Authenticated, opening realtime connection");
        connection.connect();
    } else {
        info!("Not authenticated, closing realtime connection");
        connection.disconnect();
    }
}

/// Stops the policy when stopped or dropped. The connection is left as is.
pub struct ActivationHandle {
    task: JoinHandle<()>,
}

impl ActivationHandle {
    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ActivationHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
