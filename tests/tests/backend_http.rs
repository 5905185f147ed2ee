//! Backend client, resolver, and tracker against a mock HTTP backend.

use analytics::AnalyticsTracker;
use backend_client::{BackendClient, BackendConfig, EventSink, UrlSigner};
use integration_tests::fixtures;
use journal_core::Error;
use local_store::MemoryStore;
use media::{MediaConfig, UrlResolver};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> BackendClient {
    BackendClient::new(BackendConfig::new(server.uri(), "anon-key")).unwrap()
}

/// Polls until the server has seen `n` requests or a second has passed.
async fn wait_for_requests(server: &MockServer, n: usize) -> Vec<wiremock::Request> {
    for _ in 0..50 {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= n {
            return received;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.received_requests().await.unwrap_or_default()
}

#[tokio::test]
async fn test_sign_request_shape_and_relative_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/sign/photos/u1/latte%20art.jpg"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .and(body_json(json!({ "expiresIn": 3600 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "signedURL": "/object/sign/photos/u1/latte%20art.jpg?token=abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let url = client(&server)
        .create_signed_url("photos", "u1/latte art.jpg", Duration::from_secs(3600))
        .await
        .unwrap();

    assert_eq!(
        url,
        format!(
            "{}/storage/v1/object/sign/photos/u1/latte%20art.jpg?token=abc",
            server.uri()
        )
    );
}

#[tokio::test]
async fn test_access_token_replaces_anon_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer user-jwt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "signedURL": "/object/sign/a/b?token=t" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.set_access_token(Some("user-jwt".into()));
    assert!(client
        .create_signed_url("a", "b", Duration::from_secs(60))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_sign_not_found_is_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "not_found", "message": "Object not found" })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .create_signed_url("photos", "missing.jpg", Duration::from_secs(3600))
        .await
        .unwrap_err();

    match &err {
        Error::Backend { status, message } => {
            assert_eq!(*status, 400);
            assert_eq!(message, "Object not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_insert_events_posts_array() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/analytics_events"))
        .and(header("prefer", "return=minimal"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let events = vec![fixtures::event("log_drink"), fixtures::event("rate_drink")];
    client(&server).insert_events(&events).await.unwrap();

    let received = server.received_requests().await.unwrap();
    let body: Vec<Value> = received[0].body_json().unwrap();
    assert_eq!(body.len(), 2);
    assert_eq!(body[0]["event_name"], "log_drink");
    assert_eq!(body[0]["event_category"], "action");
    assert_eq!(body[1]["session_id"], "sess-test");
}

#[tokio::test]
async fn test_insert_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client(&server)
        .insert_events(&[fixtures::event("log_drink")])
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let client = BackendClient::new(BackendConfig::new("http://127.0.0.1:9", "anon")).unwrap();
    let err = client
        .insert_events(&[fixtures::event("log_drink")])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NET_001");
}

#[tokio::test]
async fn test_check_connection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    assert!(backend_client::health::check_connection(&client(&server)).await);

    let down = BackendClient::new(BackendConfig::new("http://127.0.0.1:9", "anon")).unwrap();
    assert!(!backend_client::health::check_connection(&down).await);
}

#[tokio::test]
async fn test_resolver_signs_once_per_reference() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/sign/avatars/u1.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "signedURL": "/object/sign/avatars/u1.png?token=t" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let backend = client(&server);
    let resolver = UrlResolver::new(
        Arc::new(backend.clone()),
        backend.storage_host().map(str::to_string),
        &MediaConfig::default(),
    );

    let public_url = format!("{}/storage/v1/object/public/avatars/u1.png", server.uri());
    let first = resolver.resolve(&public_url).await.unwrap();
    let second = resolver.resolve(&public_url).await.unwrap();

    assert_eq!(first, second);
    assert!(first.ends_with("/storage/v1/object/sign/avatars/u1.png?token=t"));
}

#[tokio::test]
async fn test_tracker_delivers_full_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/analytics_events"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = AnalyticsTracker::new(
        fixtures::quiet_config(),
        Arc::new(client(&server)),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    );
    tracker.set_user_id(Some("user-7".into()));

    for i in 0..10 {
        tracker.track_action("log_drink", json!({ "n": i }));
    }

    let received = wait_for_requests(&server, 1).await;
    assert_eq!(received.len(), 1);

    let body: Vec<Value> = received[0].body_json().unwrap();
    assert_eq!(body.len(), 10);
    assert_eq!(body[0]["user_id"], "user-7");
    assert_eq!(body[9]["properties"]["n"], 9);
}
