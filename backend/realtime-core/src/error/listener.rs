use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Error returned by an event listener.
///
/// The registry logs it and moves on to the next listener.
#[derive(Debug, ThisError)]
pub enum ListenerError {
    #[error("Payload Error: {event}: {message} {location}")]
    Payload {
        event: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Handler Error: {message} {location}")]
    Handler {
        message: String,
        location: ErrorLocation,
    },
}

impl ListenerError {
    #[track_caller]
    pub fn payload(event: &str, message: impl Into<String>) -> Self {
        ListenerError::Payload {
            event: event.to_string(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn handler(message: impl Into<String>) -> Self {
        ListenerError::Handler {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
