//! Typed payloads for inbound events.
//!
//! Identifiers (`question_id`, `station_id`, `user_id`) arrive as strings or
//! numbers depending on the server; both are normalised to `String`.

use crate::pipeline::{Phase, PhaseStatus};

use log::debug;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const AUTH_SUCCESS_STATUS: &str = "success";

/// `connected`: greeting sent by the server right after the socket opens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectedPayload {
    #[serde(default)]
    pub message: Option<String>,
}

/// `authenticated`: result of the authentication handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatedPayload {
    pub status: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AuthenticatedPayload {
    pub fn is_success(&self) -> bool {
        self.status == AUTH_SUCCESS_STATUS
    }
}

/// `pipeline_update`: authoritative progress for one question.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineUpdate {
    #[serde(deserialize_with = "string_or_number")]
    pub question_id: String,
    #[serde(alias = "step")]
    pub phase: Phase,
    /// `None` when the server sent no status, `null`, or one this client does
    /// not know. The phase still applies.
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<PhaseStatus>,
}

/// `station_alert`: alert raised for a monitored station.
#[derive(Debug, Clone, Deserialize)]
pub struct StationAlertPayload {
    #[serde(deserialize_with = "string_or_number")]
    pub station_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(D::Error::custom(format!(
            "expected string or number identifier, got {other}"
        ))),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(Value::Number(value)) => Ok(Some(value.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number identifier, got {other}"
        ))),
    }
}

fn lenient_status<'de, D>(deserializer: D) -> Result<Option<PhaseStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let status = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };

    match PhaseStatus::deserialize(&status) {
        Ok(status) => Ok(Some(status)),
        Err(_) => {
            debug!("Unrecognised pipeline status {status}, keeping step status");
            Ok(None)
        }
    }
}
