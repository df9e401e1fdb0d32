use common::ErrorLocation;

use realtime_core::error::{ConfigError, CoreError};

use std::panic::Location;

use thiserror::Error;

/// Errors that end the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Error from this app (directories, logger, signals)
    #[error("Monitor Error: {message} {location}")]
    Monitor {
        message: String,
        location: ErrorLocation,
    },

    /// Error from realtime-core (config, startup)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for MonitorError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        MonitorError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for MonitorError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        MonitorError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
