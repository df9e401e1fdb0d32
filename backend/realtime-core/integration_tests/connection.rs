use crate::helpers::{
    FakePushServer, TEST_TOKEN, WAIT, collect_diagnostics_until, logged_in_manager, next_value,
    record_event, test_config, unused_endpoint, wait_for_state,
};

use realtime_core::auth::AuthState;
use realtime_core::connection::{ConnectionManager, ConnectionState, Diagnostic};
use realtime_core::protocol::events;
use realtime_core::registry::EventRegistry;

use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::{sleep, timeout};

// ============================================================================
// Public API tests for ConnectionManager against a local push server
// ============================================================================

// ----------------------------------------------------------------------------
// connect() / authentication handshake
// ----------------------------------------------------------------------------

/// **VALUE**: Connecting sends the token and ends in `Authenticated`.
///
/// **WHY THIS MATTERS**: The server only pushes user-specific events to an
/// authenticated socket. Without the handshake the client sits "connected" but
/// receives nothing.
///
/// **BUG THIS CATCHES**: Would catch a missing or misnamed `authenticate` frame, or
/// a state machine that never leaves `Connected`.
#[tokio::test]
async fn given_logged_in_user_when_connect_then_authenticates_with_token() {
    // GIVEN: A push server and a logged-in manager
    let mut server = FakePushServer::start(TEST_TOKEN).await;
    let (manager, _auth) = logged_in_manager(server.endpoint(), TEST_TOKEN);
    let mut diagnostics = manager.diagnostics();

    // WHEN: Connecting
    manager.connect();

    // THEN: The server got the token and the manager is authenticated
    let frame = server.next_frame_for(events::AUTHENTICATE).await;
    assert_eq!(frame.data, json!({"token": TEST_TOKEN}));
    wait_for_state(&manager, ConnectionState::Authenticated).await;

    let seen = collect_diagnostics_until(&mut diagnostics, |d| {
        matches!(d, Diagnostic::Authenticated { .. })
    })
    .await;
    assert!(seen.iter().any(|d| matches!(d, Diagnostic::Opened { .. })));
    assert!(seen.contains(&Diagnostic::Authenticated {
        user_id: Some("user-1".to_string())
    }));
}

/// **VALUE**: A rejected token leaves the connection open but unauthenticated.
///
/// **BUG THIS CATCHES**: Would catch treating any `authenticated` frame as success.
#[tokio::test]
async fn given_wrong_token_when_connect_then_stays_connected_with_failure_diagnostic() {
    // GIVEN: A manager with the wrong token
    let server = FakePushServer::start(TEST_TOKEN).await;
    let (manager, _auth) = logged_in_manager(server.endpoint(), "wrong-token");
    let mut diagnostics = manager.diagnostics();

    // WHEN: Connecting
    manager.connect();

    // THEN: Failure diagnostic, state Connected
    collect_diagnostics_until(&mut diagnostics, |d| {
        matches!(d, Diagnostic::AuthenticationFailed { .. })
    })
    .await;
    assert_eq!(manager.state(), ConnectionState::Connected);
}

/// **VALUE**: Without a token the handshake is skipped, not sent empty.
#[tokio::test]
async fn given_no_token_when_connect_then_authentication_skipped() {
    // GIVEN: Nobody logged in
    let server = FakePushServer::start(TEST_TOKEN).await;
    let auth = AuthState::new();
    let manager =
        ConnectionManager::new(test_config(server.endpoint()), EventRegistry::new(), auth.watch());
    let mut diagnostics = manager.diagnostics();

    // WHEN: Connecting
    manager.connect();

    // THEN: Skipped, connected
    collect_diagnostics_until(&mut diagnostics, |d| {
        matches!(d, Diagnostic::AuthenticationSkipped)
    })
    .await;
    wait_for_state(&manager, ConnectionState::Connected).await;
}

/// **VALUE**: `connect()` while a session is running does not open a second socket.
///
/// **BUG THIS CATCHES**: Would catch duplicate sockets, which double-deliver every
/// push to the registry.
#[tokio::test]
async fn given_connected_manager_when_connect_again_then_single_connection() {
    // GIVEN: An authenticated manager
    let server = FakePushServer::start(TEST_TOKEN).await;
    let (manager, _auth) = logged_in_manager(server.endpoint(), TEST_TOKEN);
    manager.connect();
    wait_for_state(&manager, ConnectionState::Authenticated).await;

    // WHEN: connect() is called again
    manager.connect();
    manager.connect();
    sleep(Duration::from_millis(200)).await;

    // THEN: Still one connection
    assert_eq!(server.connection_count(), 1);
    assert_eq!(manager.state(), ConnectionState::Authenticated);
}

// ----------------------------------------------------------------------------
// Inbound frames
// ----------------------------------------------------------------------------

/// **VALUE**: Frames reach listeners in the order the server sent them.
///
/// **WHY THIS MATTERS**: Pipeline updates for one question must be applied in
/// order or the indicator jumps backwards.
#[tokio::test]
async fn given_pushed_frames_when_received_then_dispatched_in_order() {
    // GIVEN: A listener on notification
    let server = FakePushServer::start(TEST_TOKEN).await;
    let (manager, _auth) = logged_in_manager(server.endpoint(), TEST_TOKEN);
    let mut received = record_event(manager.registry(), events::NOTIFICATION);
    manager.connect();
    wait_for_state(&manager, ConnectionState::Authenticated).await;

    // WHEN: Three frames are pushed
    for n in 1..=3 {
        server.push(events::NOTIFICATION, json!({"title": format!("n{n}")}));
    }

    // THEN: Delivered in order
    for n in 1..=3 {
        let data = next_value(&mut received).await;
        assert_eq!(data["title"], format!("n{n}"));
    }
}

/// **VALUE**: A malformed frame is dropped and the connection keeps going.
///
/// **BUG THIS CATCHES**: Would catch a decode error treated as a transport error,
/// which would reconnect (and re-authenticate) on every bad frame.
#[tokio::test]
async fn given_malformed_frame_when_received_then_dropped_and_next_frame_delivered() {
    // GIVEN: An authenticated manager with a listener
    let server = FakePushServer::start(TEST_TOKEN).await;
    let (manager, _auth) = logged_in_manager(server.endpoint(), TEST_TOKEN);
    let mut received = record_event(manager.registry(), events::STATION_ALERT);
    let mut diagnostics = manager.diagnostics();
    manager.connect();
    wait_for_state(&manager, ConnectionState::Authenticated).await;

    // WHEN: Garbage, then a valid frame
    server.push_raw("this is not a frame");
    server.push(events::STATION_ALERT, json!({"station_id": "ST-2", "message": "ok"}));

    // THEN: Valid frame delivered, malformed one reported, still one connection
    let data = next_value(&mut received).await;
    assert_eq!(data["station_id"], "ST-2");
    collect_diagnostics_until(&mut diagnostics, |d| {
        matches!(d, Diagnostic::MalformedFrame { .. })
    })
    .await;
    assert_eq!(manager.state(), ConnectionState::Authenticated);
    assert_eq!(server.connection_count(), 1);
}

/// **VALUE**: The `connect` lifecycle event is dispatched through the registry.
#[tokio::test]
async fn given_connect_listener_when_connection_opens_then_notified() {
    // GIVEN: A listener on the local connect event
    let server = FakePushServer::start(TEST_TOKEN).await;
    let (manager, _auth) = logged_in_manager(server.endpoint(), TEST_TOKEN);
    let mut connects = record_event(manager.registry(), events::CONNECT);

    // WHEN: Connecting
    manager.connect();

    // THEN: Notified once with no data
    assert_eq!(next_value(&mut connects).await, Value::Null);
}

// ----------------------------------------------------------------------------
// Outbound commands
// ----------------------------------------------------------------------------

/// **VALUE**: `subscribe_pipeline` reaches the server while connected.
#[tokio::test]
async fn given_authenticated_manager_when_subscribe_pipeline_then_server_receives_it() {
    // GIVEN: An authenticated manager
    let mut server = FakePushServer::start(TEST_TOKEN).await;
    let (manager, _auth) = logged_in_manager(server.endpoint(), TEST_TOKEN);
    manager.connect();
    wait_for_state(&manager, ConnectionState::Authenticated).await;

    // WHEN: Subscribing to a question and a station
    assert!(manager.subscribe_pipeline("q-77"));
    assert!(manager.subscribe_station("ST-9"));

    // THEN: Both arrive
    let pipeline = server.next_frame_for(events::SUBSCRIBE_PIPELINE).await;
    assert_eq!(pipeline.data, json!({"question_id": "q-77"}));
    let station = server.next_frame_for(events::SUBSCRIBE_STATION).await;
    assert_eq!(station.data, json!({"station_id": "ST-9"}));
}

// ----------------------------------------------------------------------------
// disconnect() and reconnection
// ----------------------------------------------------------------------------

/// **VALUE**: A manual disconnect is final: no reconnect follows.
///
/// **WHY THIS MATTERS**: Logout must actually close the socket for good; a
/// reconnect after logout would re-open a session for a signed-out user.
///
/// **BUG THIS CATCHES**: Would catch the reconnect policy firing after `disconnect()`.
#[tokio::test]
async fn given_authenticated_manager_when_disconnect_then_no_reconnect() {
    // GIVEN: An authenticated manager with a disconnect listener
    let server = FakePushServer::start(TEST_TOKEN).await;
    let (manager, _auth) = logged_in_manager(server.endpoint(), TEST_TOKEN);
    let mut disconnects = record_event(manager.registry(), events::DISCONNECT);
    manager.connect();
    wait_for_state(&manager, ConnectionState::Authenticated).await;

    // WHEN: Disconnecting (twice)
    manager.disconnect();
    manager.disconnect();

    // THEN: Disconnected, one disconnect event, no new connection
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    next_value(&mut disconnects).await;
    sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connection_count(), 1);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(disconnects.try_recv().is_err());
}

/// **VALUE**: After an unexpected drop the manager reconnects, re-authenticates,
/// and existing subscriptions keep receiving frames.
///
/// **BUG THIS CATCHES**: Would catch a registry cleared on reconnect, or a second
/// session that skips the handshake.
#[tokio::test]
async fn given_dropped_connection_when_reconnected_then_reauthenticates_and_listeners_survive() {
    // GIVEN: An authenticated manager with a listener
    let mut server = FakePushServer::start(TEST_TOKEN).await;
    let (manager, _auth) = logged_in_manager(server.endpoint(), TEST_TOKEN);
    let mut received = record_event(manager.registry(), events::NOTIFICATION);
    let mut disconnects = record_event(manager.registry(), events::DISCONNECT);
    manager.connect();
    server.next_frame_for(events::AUTHENTICATE).await;
    wait_for_state(&manager, ConnectionState::Authenticated).await;

    // WHEN: The server drops the connection
    server.kick();

    // THEN: disconnect dispatched, then a second handshake on a new connection
    next_value(&mut disconnects).await;
    let frame = server.next_frame_for(events::AUTHENTICATE).await;
    assert_eq!(frame.data["token"], TEST_TOKEN);
    wait_for_state(&manager, ConnectionState::Authenticated).await;
    assert_eq!(server.connection_count(), 2);

    // THEN: The old listener still receives pushes
    server.push(events::NOTIFICATION, json!({"title": "after reconnect"}));
    let data = next_value(&mut received).await;
    assert_eq!(data["title"], "after reconnect");
}

/// **VALUE**: Reconnection gives up after exactly five attempts.
///
/// **WHY THIS MATTERS**: An unreachable server must not be hammered forever.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one in the attempt cap or a retry
/// loop without a cap.
#[tokio::test]
async fn given_server_gone_when_reconnecting_then_exhausts_after_five_attempts() {
    // GIVEN: An authenticated manager
    let server = FakePushServer::start(TEST_TOKEN).await;
    let (manager, _auth) = logged_in_manager(server.endpoint(), TEST_TOKEN);
    let mut diagnostics = manager.diagnostics();
    manager.connect();
    wait_for_state(&manager, ConnectionState::Authenticated).await;

    // WHEN: The server goes away
    server.stop();

    // THEN: Five attempts, then exhausted and disconnected
    let seen = collect_diagnostics_until(&mut diagnostics, |d| {
        matches!(d, Diagnostic::ReconnectExhausted { .. })
    })
    .await;
    let attempts: Vec<u32> = seen
        .iter()
        .filter_map(|d| match d {
            Diagnostic::ReconnectAttempt { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2, 3, 4, 5]);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(server.connection_count(), 1);
}

/// **VALUE**: A failed initial open follows the same retry policy.
#[tokio::test]
async fn given_unreachable_endpoint_when_connect_then_retries_then_disconnected() {
    // GIVEN: Nothing listening
    let (manager, _auth) = logged_in_manager(unused_endpoint().await, TEST_TOKEN);
    let mut diagnostics = manager.diagnostics();

    // WHEN: Connecting
    manager.connect();

    // THEN: Exhausted after five reconnect attempts
    let seen = collect_diagnostics_until(&mut diagnostics, |d| {
        matches!(d, Diagnostic::ReconnectExhausted { .. })
    })
    .await;
    let attempts = seen
        .iter()
        .filter(|d| matches!(d, Diagnostic::ReconnectAttempt { .. }))
        .count();
    assert_eq!(attempts, 5);
    wait_for_state(&manager, ConnectionState::Disconnected).await;
}

/// **VALUE**: `connect()` after exhaustion starts a fresh session, even when
/// issued the moment `ReconnectExhausted` is observed.
///
/// **WHY THIS MATTERS**: A diagnostics consumer reacting to exhaustion with a
/// retry must not be ignored while the old task is still unwinding.
///
/// **BUG THIS CATCHES**: Would catch `connect()` treating the exhausted session
/// as running until its task has fully returned.
#[tokio::test]
async fn given_exhausted_manager_when_connect_again_then_new_session_runs() {
    // GIVEN: A manager that gave up on an unreachable endpoint
    let (manager, _auth) = logged_in_manager(unused_endpoint().await, TEST_TOKEN);
    let mut diagnostics = manager.diagnostics();
    manager.connect();
    collect_diagnostics_until(&mut diagnostics, |d| {
        matches!(d, Diagnostic::ReconnectExhausted { .. })
    })
    .await;

    // WHEN: connect() again, as soon as the diagnostic is seen
    manager.connect();

    // THEN: New attempts are made
    let next = timeout(WAIT, diagnostics.recv()).await;
    assert!(matches!(
        next,
        Ok(Ok(Diagnostic::TransportError { .. } | Diagnostic::ReconnectAttempt { .. }))
    ));
}
