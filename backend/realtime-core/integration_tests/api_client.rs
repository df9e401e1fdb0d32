use realtime_core::api_client::AskClient;
use realtime_core::auth::AuthState;
use realtime_core::error::ApiClientError;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// **VALUE**: `ask` posts the question with the bearer token and parses the answer.
///
/// **BUG THIS CATCHES**: Would catch a missing `Authorization` header, a wrong
/// path join (`/apiai/ask`), or a renamed body field.
#[tokio::test]
async fn given_logged_in_client_when_ask_then_posts_with_bearer_and_parses_answer() {
    // GIVEN: A mock ask endpoint expecting the token
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/ask"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_json(json!({"question": "Why is ST-4 offline?", "category": "Stations"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 311,
            "answer": "Scheduled maintenance.",
            "timestamp": "2026-03-01T12:00:00Z",
            "provenance": {"sources": ["runbook-7"]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = AuthState::new();
    auth.login("tok-1");
    let client = AskClient::new(&format!("{}/api", server.uri()), auth.watch()).unwrap();

    // WHEN: Asking
    let response = client
        .ask("Why is ST-4 offline?", Some("Stations"))
        .await
        .unwrap();

    // THEN: Parsed
    assert_eq!(response.id.as_deref(), Some("311"));
    assert_eq!(response.answer, "Scheduled maintenance.");
    assert!(response.timestamp.is_some());
    assert_eq!(response.provenance["sources"][0], "runbook-7");
}

/// **VALUE**: The category defaults to `All`.
#[tokio::test]
async fn given_no_category_when_ask_then_sends_all() {
    // GIVEN: A mock expecting category All
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/ask"))
        .and(body_json(json!({"question": "q", "category": "All"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "a"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = AskClient::new(&format!("{}/api/", server.uri()), AuthState::new().watch()).unwrap();

    // WHEN/THEN: Asking without a category succeeds
    let response = client.ask("q", None).await.unwrap();
    assert_eq!(response.answer, "a");
    assert_eq!(response.id, None);
}

/// **VALUE**: Non-2xx responses surface as `Server` errors with the status code.
///
/// **WHY THIS MATTERS**: The pipeline driver marks the run failed on `Err`; an
/// error body parsed as an empty answer would show a bogus "delivered".
#[tokio::test]
async fn given_server_error_when_ask_then_server_error_with_status() {
    // GIVEN: The endpoint returns 503
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/ask"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;
    let client = AskClient::new(&format!("{}/api", server.uri()), AuthState::new().watch()).unwrap();

    // WHEN: Asking
    let error = client.ask("q", None).await.unwrap_err();

    // THEN: Server error carrying 503 and the body
    match error {
        ApiClientError::Server {
            status, message, ..
        } => {
            assert_eq!(status.as_u16(), 503);
            assert!(status.is_server_error());
            assert_eq!(message, "overloaded");
        }
        other => panic!("Expected Server error, got {other}"),
    }
}

/// **VALUE**: An invalid base URL is rejected at construction.
#[test]
fn given_invalid_base_url_when_new_then_url_parse_error() {
    let result = AskClient::new("not a url", AuthState::new().watch());

    assert!(matches!(result, Err(ApiClientError::UrlParse { .. })));
}
