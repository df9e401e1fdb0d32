//! Observable connection events.
//!
//! Connection failures never surface as errors to callers. Instead the session
//! publishes a [`Diagnostic`] for every notable lifecycle event and mirrors it
//! to the log at a matching level.

use std::fmt::{Display, Formatter, Result as FmtResult};

use log::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Opened { endpoint: String },
    ServerGreeting { message: Option<String> },
    Authenticated { user_id: Option<String> },
    AuthenticationFailed { message: Option<String> },
    AuthenticationSkipped,
    Closed { reason: String },
    TransportError { message: String },
    MalformedFrame { message: String },
    ReconnectAttempt { attempt: u32, max_attempts: u32 },
    ReconnectExhausted { attempts: u32 },
}

impl Diagnostic {
    pub(crate) fn log(&self) {
        match self {
            Diagnostic::Opened { .. }
            | Diagnostic::Authenticated { .. }
            | Diagnostic::Closed { .. } => info!("{self}"),
            Diagnostic::ServerGreeting { .. } | Diagnostic::ReconnectAttempt { .. } => {
                debug!("{self}")
            }
            Diagnostic::AuthenticationFailed { .. }
            | Diagnostic::AuthenticationSkipped
            | Diagnostic::TransportError { .. }
            | Diagnostic::MalformedFrame { .. } => warn!("{self}"),
            Diagnostic::ReconnectExhausted { .. } => error!("{self}"),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Diagnostic::Opened { endpoint } => write!(f, "Connected to {endpoint}"),
            Diagnostic::ServerGreeting { message } => {
                write!(f, "Server greeting: {}", message.as_deref().unwrap_or("-"))
            }
            Diagnostic::Authenticated { user_id } => match user_id {
                Some(user_id) => write!(f, "Authenticated as {user_id}"),
                None => f.write_str("Authenticated"),
            },
            Diagnostic::AuthenticationFailed { message } => write!(
                f,
                "Authentication failed: {}",
                message.as_deref().unwrap_or("no reason given")
            ),
            Diagnostic::AuthenticationSkipped => {
                f.write_str("No token available, authentication skipped")
            }
            Diagnostic::Closed { reason } => write!(f, "Connection closed: {reason}"),
            Diagnostic::TransportError { message } => write!(f, "Transport error: {message}"),
            Diagnostic::MalformedFrame { message } => write!(f, "Dropped frame: {message}"),
            Diagnostic::ReconnectAttempt {
                attempt,
                max_attempts,
            } => write!(f, "Reconnect attempt {attempt}/{max_attempts}"),
            Diagnostic::ReconnectExhausted { attempts } => {
                write!(f, "Giving up after {attempts} reconnect attempts")
            }
        }
    }
}
