use realtime_monitor::error::MonitorError;
use realtime_monitor::monitor::run;

use realtime_core::auth::AuthState;
use realtime_core::config::RealtimeConfig;

use std::net::TcpListener;
use std::time::Duration;

use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

/// An endpoint nothing listens on.
fn unused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("ws://127.0.0.1:{port}/ws")
}

fn offline_config() -> RealtimeConfig {
    let mut config = RealtimeConfig::default();
    config.connection.endpoint = unused_endpoint();
    config.connection.max_reconnect_attempts = 1;
    config.connection.reconnect_delay_ms = 10;
    config
}

/// **VALUE**: Verifies the monitor starts, keeps running while the server is
/// unreachable and returns cleanly when shutdown resolves.
///
/// **WHY THIS MATTERS**: The monitor must survive a backend that is down and
/// still exit promptly on Ctrl-C.
///
/// **BUG THIS CATCHES**: Would catch a run loop that returns early on connection
/// failure, or one that hangs after shutdown because a logger task is awaited.
#[tokio::test]
async fn given_unreachable_server_when_shutdown_resolves_then_run_returns_ok() {
    // GIVEN: A logged-in session and a config pointing at nothing
    let auth = AuthState::new();
    auth.login("token-1");

    // WHEN: Running with a shutdown that fires shortly after start
    let result = timeout(
        WAIT,
        run(
            offline_config(),
            auth,
            None,
            sleep(Duration::from_millis(100)),
        ),
    )
    .await;

    // THEN: Run completes and reports success
    let result = result.expect("run should return after shutdown");
    assert!(result.is_ok(), "run should succeed: {result:?}");
}

/// **VALUE**: Verifies an invalid config is rejected before anything starts.
///
/// **WHY THIS MATTERS**: A typo in the endpoint should stop the monitor with an
/// error instead of retrying a URL that can never work.
///
/// **BUG THIS CATCHES**: Would catch `run` skipping config validation.
#[tokio::test]
async fn given_invalid_endpoint_when_running_then_returns_core_error() {
    // GIVEN: A config with a non-websocket endpoint
    let mut config = offline_config();
    config.connection.endpoint = String::from("http://127.0.0.1:1/ws");

    // WHEN: Running
    let result = run(config, AuthState::new(), None, async {}).await;

    // THEN: Startup fails with a core error
    assert!(
        matches!(result, Err(MonitorError::Core { .. })),
        "Expected Core error, got {result:?}"
    );
}
