use crate::helpers::{FakePushServer, TEST_TOKEN, test_config, wait_for_state};

use realtime_core::activation::ActivationPolicy;
use realtime_core::auth::AuthState;
use realtime_core::connection::{ConnectionManager, ConnectionState};
use realtime_core::registry::EventRegistry;

use std::time::Duration;

use tokio::time::sleep;

fn manager(endpoint: String, auth: &AuthState) -> ConnectionManager {
    ConnectionManager::new(test_config(endpoint), EventRegistry::new(), auth.watch())
}

/// **VALUE**: Logging in opens the connection; logging out closes it.
///
/// **WHY THIS MATTERS**: This is the only thing that starts and stops the
/// realtime connection in the app. If it misses a transition the user either
/// never gets notifications or keeps getting them after signing out.
///
/// **BUG THIS CATCHES**: Would catch a policy that only reacts to the first change.
#[tokio::test]
async fn given_activation_policy_when_login_then_logout_then_connects_then_disconnects() {
    // GIVEN: A policy on a logged-out state
    let server = FakePushServer::start(TEST_TOKEN).await;
    let auth = AuthState::new();
    let connection = manager(server.endpoint(), &auth);
    let _handle = ActivationPolicy::spawn(connection.clone(), auth.watch());

    // WHEN: Logging in
    auth.login(TEST_TOKEN);

    // THEN: Authenticated
    wait_for_state(&connection, ConnectionState::Authenticated).await;

    // WHEN: Logging out
    auth.logout();

    // THEN: Disconnected and stays so
    wait_for_state(&connection, ConnectionState::Disconnected).await;
    sleep(Duration::from_millis(200)).await;
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    // WHEN: Logging in again
    auth.login(TEST_TOKEN);

    // THEN: A second connection is made
    wait_for_state(&connection, ConnectionState::Authenticated).await;
    assert_eq!(server.connection_count(), 2);
}

/// **VALUE**: An already logged-in user is connected as soon as the policy starts.
#[tokio::test]
async fn given_logged_in_state_when_policy_spawned_then_connects_immediately() {
    // GIVEN: Logged in before the policy exists
    let server = FakePushServer::start(TEST_TOKEN).await;
    let auth = AuthState::new();
    auth.login(TEST_TOKEN);
    let connection = manager(server.endpoint(), &auth);

    // WHEN: The policy starts
    let _handle = ActivationPolicy::spawn(connection.clone(), auth.watch());

    // THEN: Connected without any further change
    wait_for_state(&connection, ConnectionState::Authenticated).await;
}

/// **VALUE**: A stopped policy no longer reacts to login.
#[tokio::test]
async fn given_stopped_policy_when_login_then_stays_disconnected() {
    // GIVEN: A stopped policy
    let server = FakePushServer::start(TEST_TOKEN).await;
    let auth = AuthState::new();
    let connection = manager(server.endpoint(), &auth);
    let handle = ActivationPolicy::spawn(connection.clone(), auth.watch());
    sleep(Duration::from_millis(50)).await;
    handle.stop();
    sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_running());

    // WHEN: Logging in
    auth.login(TEST_TOKEN);
    sleep(Duration::from_millis(200)).await;

    // THEN: Nothing happened
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert_eq!(server.connection_count(), 0);
}
