use crate::helpers::{FakePushServer, TEST_TOKEN, WAIT, test_config, wait_for_state};

use realtime_core::RealtimeCore;
use realtime_core::auth::AuthState;
use realtime_core::config::{ApiConfig, PipelineConfig, RealtimeConfig};
use realtime_core::connection::ConnectionState;
use realtime_core::error::CoreError;
use realtime_core::notifications::NotificationKind;
use realtime_core::pipeline::{Phase, PhaseStatus, RunOutcome};
use realtime_core::protocol::events;

use std::time::Duration;

use serde_json::json;
use tokio::time::{sleep, timeout};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config(endpoint: String, api_base_url: String) -> RealtimeConfig {
    RealtimeConfig {
        connection: test_config(endpoint),
        pipeline: PipelineConfig {
            phase_delays_ms: [20, 20, 20],
            cleanup_grace_ms: 100,
        },
        api: ApiConfig {
            base_url: api_base_url,
        },
        ..RealtimeConfig::default()
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Timed out waiting for condition");
}

/// **VALUE**: Login connects the core and pushed notifications land in the store.
///
/// **WHY THIS MATTERS**: This is the whole notification path end to end: auth
/// gate, socket, registry, feed, store.
#[tokio::test]
async fn given_started_core_when_login_and_push_then_notification_stored() {
    // GIVEN: A core started while logged out
    let server = FakePushServer::start(TEST_TOKEN).await;
    let auth = AuthState::new();
    let core = RealtimeCore::start(
        fast_config(server.endpoint(), "http://127.0.0.1:9/api/".to_string()),
        auth.watch(),
    )
    .unwrap();
    assert_eq!(core.connection().state(), ConnectionState::Disconnected);

    // WHEN: The user logs in and the server pushes a notification and an alert
    auth.login(TEST_TOKEN);
    wait_for_state(core.connection(), ConnectionState::Authenticated).await;
    server.push(
        events::NOTIFICATION,
        json!({"type": "ticket_escalation", "title": "Ticket #88 escalated", "message": "SLA breach"}),
    );
    server.push(events::STATION_ALERT, json!({"station_id": "ST-3", "message": "Offline"}));

    // THEN: Both stored, newest first, two unread
    let store = core.notifications().clone();
    wait_until(|| store.len() == 2).await;
    let stored = store.notifications();
    assert_eq!(stored[0].kind, NotificationKind::StationAlert);
    assert_eq!(stored[1].kind, NotificationKind::TicketEscalation);
    assert_eq!(store.unread_count(), 2);

    // WHEN: Logging out
    auth.logout();

    // THEN: Disconnected, notifications kept
    wait_for_state(core.connection(), ConnectionState::Disconnected).await;
    assert_eq!(store.len(), 2);
    core.shutdown();
}

/// **VALUE**: Asking through the core drives the pipeline to delivered and asks the
/// server for pipeline updates for that question.
#[tokio::test]
async fn given_connected_core_when_question_submitted_then_pipeline_delivered() {
    // GIVEN: A connected core and an ask endpoint
    let mut server = FakePushServer::start(TEST_TOKEN).await;
    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/ask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "q-1", "answer": "42"})))
        .mount(&api)
        .await;

    let auth = AuthState::new();
    auth.login(TEST_TOKEN);
    let core = RealtimeCore::start(
        fast_config(server.endpoint(), format!("{}/api/", api.uri())),
        auth.watch(),
    )
    .unwrap();
    wait_for_state(core.connection(), ConnectionState::Authenticated).await;

    // WHEN: A question is submitted
    let client = core.ask_client().clone();
    let answer = core
        .pipeline()
        .submit("q-1", async move { client.ask("meaning?", None).await })
        .await
        .unwrap();

    // THEN: Answer returned, run delivered, server subscribed for q-1
    assert_eq!(answer.answer, "42");
    let snapshot = core.pipeline().snapshot();
    assert_eq!(snapshot.outcome, Some(RunOutcome::Delivered));
    assert_eq!(snapshot.phases(), Phase::CANONICAL.to_vec());
    let subscribe = server.next_frame_for(events::SUBSCRIBE_PIPELINE).await;
    assert_eq!(subscribe.data["question_id"], "q-1");

    // THEN: Cleared after the grace period
    let pipeline = core.pipeline().clone();
    wait_until(|| pipeline.snapshot().outcome.is_none()).await;
    core.shutdown();
}

/// **VALUE**: Server pipeline updates for the active question reach the tracker.
#[tokio::test]
async fn given_pending_question_when_server_pushes_update_then_tracker_follows() {
    // GIVEN: A connected core with a question in flight
    let server = FakePushServer::start(TEST_TOKEN).await;
    let auth = AuthState::new();
    auth.login(TEST_TOKEN);
    let core = RealtimeCore::start(
        fast_config(server.endpoint(), "http://127.0.0.1:9/api/".to_string()),
        auth.watch(),
    )
    .unwrap();
    wait_for_state(core.connection(), ConnectionState::Authenticated).await;

    let pipeline = core.pipeline().clone();
    let pending = tokio::spawn(async move {
        pipeline
            .submit("q-5", async {
                sleep(Duration::from_secs(2)).await;
                Ok::<_, ()>(())
            })
            .await
    });
    wait_until(|| core.pipeline().snapshot().question_id.is_some()).await;

    // WHEN: The server reports routing failed for q-5
    server.push(
        events::PIPELINE_UPDATE,
        json!({"question_id": "q-5", "step": "routing", "status": "failed"}),
    );

    // THEN: The tracker reflects it
    let pipeline = core.pipeline().clone();
    wait_until(|| {
        pipeline
            .snapshot()
            .steps
            .first()
            .is_some_and(|step| step.status == PhaseStatus::Failed)
    })
    .await;

    pending.abort();
    core.shutdown();
}

/// **VALUE**: Invalid configuration is rejected before anything starts.
#[tokio::test]
async fn given_invalid_config_when_start_then_config_error() {
    // GIVEN: A zero-capacity store
    let mut config = RealtimeConfig::default();
    config.notifications.capacity = 0;

    // WHEN: Starting
    let result = RealtimeCore::start(config, AuthState::new().watch());

    // THEN: Config error
    assert!(matches!(result, Err(CoreError::Config(_))));
}
