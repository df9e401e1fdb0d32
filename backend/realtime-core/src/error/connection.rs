//! Transport errors raised inside a connection session.
//!
//! These never reach callers of [`ConnectionManager`](crate::connection::ConnectionManager):
//! the session task logs them, publishes a diagnostic and applies the reconnect policy.

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;
use tokio_tungstenite::tungstenite::Error as WsError;

#[derive(Debug, ThisError)]
pub enum ConnectionError {
    #[error("Connect Error: {message} {location}")]
    Connect {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Read Error: {message} {location}")]
    Read {
        message: String,
        location: ErrorLocation,
    },

    #[error("Frame Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },

    #[error("Frame Decode Error: {message} {location}")]
    Decode {
        message: String,
        location: ErrorLocation,
    },

    #[error("Closed: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },
}

impl From<WsError> for ConnectionError {
    #[track_caller]
    fn from(error: WsError) -> Self {
        let location = ErrorLocation::from(Location::caller());
        match error {
            WsError::ConnectionClosed | WsError::AlreadyClosed => ConnectionError::Closed {
                message: error.to_string(),
                location,
            },
            other => ConnectionError::Read {
                message: other.to_string(),
                location,
            },
        }
    }
}
