use realtime_monitor::error::MonitorError;
use realtime_monitor::logger::initialize as LoggerInitialize;
use realtime_monitor::monitor::{
    self, ASK_QUESTION_ENV_VAR, AUTH_TOKEN_ENV_VAR, config_dir, log_dir,
};

use realtime_core::auth::AuthState;
use realtime_core::config::RealtimeConfig;

use common::ErrorLocation;

use std::env;
use std::fs::create_dir_all;
use std::panic::Location;

use log::{info, warn};

#[tokio::main]
async fn main() -> Result<(), MonitorError> {
    let log_dir = log_dir()?;
    create_dir_all(&log_dir).map_err(|e| MonitorError::Monitor {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Logger first so config loading is logged
    LoggerInitialize(&log_dir)?;

    info!("Realtime monitor starting");
    info!("Log directory: {}", log_dir.display());

    let config = RealtimeConfig::load(&config_dir()?)?;

    let auth = AuthState::new();
    match env::var(AUTH_TOKEN_ENV_VAR) {
        Ok(token) => auth.login(token),
        Err(_) => warn!("{AUTH_TOKEN_ENV_VAR} not set, waiting without a session"),
    }

    let question = env::var(ASK_QUESTION_ENV_VAR).ok();

    monitor::run(config, auth, question, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
        }
    })
    .await
}
