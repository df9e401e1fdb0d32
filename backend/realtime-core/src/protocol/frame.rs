use crate::error::connection::ConnectionError;
use crate::protocol::events;

use common::{ErrorLocation, RedactedToken};

use std::panic::Location;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One message on the persistent connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Decode a frame from the text of a WebSocket message.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Decode`] if the text is not a JSON object with
    /// a string `event` field, or if `event` is empty.
    #[track_caller]
    pub fn decode(text: &str) -> Result<Self, ConnectionError> {
        let frame: Frame = serde_json::from_str(text).map_err(|e| ConnectionError::Decode {
            message: format!("Invalid frame: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if frame.event.is_empty() {
            return Err(ConnectionError::Decode {
                message: "Frame has an empty event name".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(frame)
    }

    /// Encode the frame as the text of a WebSocket message.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Encode`] if serialization fails.
    #[track_caller]
    pub fn encode(&self) -> Result<String, ConnectionError> {
        serde_json::to_string(self).map_err(|e| ConnectionError::Encode {
            message: format!("Failed to encode '{}' frame: {e}", self.event),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

/// Commands the client sends to the server.
#[derive(Debug, Clone)]
pub enum OutboundCommand {
    /// Authentication handshake, issued on every successful open.
    Authenticate { token: RedactedToken },

    /// Ask the server to push `pipeline_update` frames for a question.
    SubscribePipeline { question_id: String },

    /// Ask the server to push `station_alert` frames for a station.
    SubscribeStation { station_id: String },
}

impl OutboundCommand {
    pub fn event(&self) -> &'static str {
        match self {
            OutboundCommand::Authenticate { .. } => events::AUTHENTICATE,
            OutboundCommand::SubscribePipeline { .. } => events::SUBSCRIBE_PIPELINE,
            OutboundCommand::SubscribeStation { .. } => events::SUBSCRIBE_STATION,
        }
    }

    pub fn to_frame(&self) -> Frame {
        let data = match self {
            OutboundCommand::Authenticate { token } => json!({ "token": token.expose() }),
            OutboundCommand::SubscribePipeline { question_id } => {
                json!({ "question_id": question_id })
            }
            OutboundCommand::SubscribeStation { station_id } => json!({ "station_id": station_id }),
        };

        Frame::new(self.event(), data)
    }
}
