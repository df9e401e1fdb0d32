//! Headless monitor: wires the realtime core and logs what it receives.

use crate::error::MonitorError;

use realtime_core::RealtimeCore;
use realtime_core::auth::AuthState;
use realtime_core::config::RealtimeConfig;
use realtime_core::notifications::{Notification, Presentation, Severity};
use realtime_core::pipeline::PipelineSnapshot;

use common::ErrorLocation;

use std::future::Future;
use std::panic::Location;
use std::path::PathBuf;

use log::{Level, debug, info, log, warn};
use uuid::Uuid;

pub const AUTH_TOKEN_ENV_VAR: &str = "REALTIME_AUTH_TOKEN";
pub const ASK_QUESTION_ENV_VAR: &str = "REALTIME_ASK_QUESTION";
const APP_DIR_NAME: &str = "realtime-monitor";
const LOG_DIR_NAME: &str = "logs";

pub fn log_dir() -> Result<PathBuf, MonitorError> {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(LOG_DIR_NAME))
        .ok_or_else(|| MonitorError::Monitor {
            message: "Could not determine local data directory".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
}

pub fn config_dir() -> Result<PathBuf, MonitorError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| MonitorError::Monitor {
            message: "Could not determine config directory".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
}

/// Log level a notification of `severity` is reported at.
pub fn level_for(severity: Severity) -> Level {
    match severity {
        Severity::Success | Severity::Info => Level::Info,
        Severity::Warning => Level::Warn,
        Severity::Error => Level::Error,
    }
}

/// Presenter handed to the core: one log line per stored notification.
pub fn present(notification: &Notification, presentation: Presentation) {
    log!(
        level_for(presentation.severity),
        "[{:?}, {}s] {}: {}",
        notification.kind,
        presentation.display_for.as_secs(),
        notification.title,
        notification.message
    );

    if let Ok(json) = serde_json::to_string(notification) {
        debug!("Notification record: {json}");
    }
}

fn describe(snapshot: &PipelineSnapshot) -> String {
    let steps: Vec<String> = snapshot
        .steps
        .iter()
        .map(|step| format!("{}:{:?}", step.phase, step.status))
        .collect();
    format!(
        "question={} outcome={:?} steps=[{}]",
        snapshot.question_id.as_deref().unwrap_or("-"),
        snapshot.outcome,
        steps.join(", ")
    )
}

/// Run the core until `shutdown` resolves.
///
/// When `question` is set it is submitted once through the pipeline driver and
/// every pipeline change is logged.
///
/// # Errors
///
/// Returns [`MonitorError::Core`] if the core cannot start.
pub async fn run<S>(
    config: RealtimeConfig,
    auth: AuthState,
    question: Option<String>,
    shutdown: S,
) -> Result<(), MonitorError>
where
    S: Future<Output = ()>,
{
    let core = RealtimeCore::start_with(config, auth.watch(), present)?;

    let mut states = core.connection().watch_state();
    let state_logger = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            info!("Connection state: {state}");
        }
    });

    let mut snapshots = core.pipeline().watch();
    let pipeline_logger = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            info!("Pipeline: {}", describe(&snapshot));
        }
    });

    let ask = question.map(|question| {
        let pipeline = core.pipeline().clone();
        let client = core.ask_client().clone();
        tokio::spawn(async move {
            let question_id = Uuid::new_v4().to_string();
            let result = pipeline
                .submit(question_id, async { client.ask(&question, None).await })
                .await;
            match result {
                Ok(response) => info!("Answer: {}", response.answer),
                Err(e) => warn!("Question failed: {e}"),
            }
        })
    });

    shutdown.await;
    info!("Shutting down");

    if let Some(ask) = ask {
        ask.abort();
    }
    state_logger.abort();
    pipeline_logger.abort();
    core.shutdown();

    Ok(())
}
