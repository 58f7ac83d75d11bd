// Integration tests for `RealtimeClient` and `EventStream` using wiremock.
#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vaccimap_api::{Error, EventStream, RealtimeClient, ReconnectConfig, StreamEvent};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RealtimeClient) {
    let server = MockServer::start().await;
    let client = RealtimeClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

const SITE_PATH: &str = "/Testing%20Sites/40_713%20-74_006/site%20data.json";

// ── REST ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_site_data() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(SITE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "coordinates": "40.713 -74.006",
            "is vaccination site": false,
            "wait time": "15",
            "availability": true,
        })))
        .mount(&server)
        .await;

    let value: Option<Value> = client
        .get(&["Testing Sites", "40_713 -74_006", "site data"])
        .await
        .unwrap();

    let value = value.unwrap();
    assert_eq!(value["coordinates"], "40.713 -74.006");
    assert_eq!(value["wait time"], "15");
}

#[tokio::test]
async fn test_get_missing_location_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/Vaccination%20Sites/1_0%202_0/comments.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    let comments: Option<BTreeMap<String, String>> = client
        .get(&["Vaccination Sites", "1_0 2_0", "comments"])
        .await
        .unwrap();
    assert!(comments.is_none());
}

#[tokio::test]
async fn test_put_sends_body_and_auth() {
    let (server, client) = setup().await;
    let client = client.with_auth(SecretString::from("token-123".to_string()));

    let body = json!({
        "coordinates": "40.713 -74.006",
        "is vaccination site": false,
        "wait time": "",
        "availability": false,
    });

    Mock::given(method("PUT"))
        .and(path(SITE_PATH))
        .and(query_param("auth", "token-123"))
        .and(query_param("print", "silent"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .put(&["Testing Sites", "40_713 -74_006", "site data"], &body)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_push_returns_generated_key() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/Testing%20Sites/40_713%20-74_006/comments.json"))
        .and(body_json(json!("Line was short")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "name": "-NxAbc123" })),
        )
        .mount(&server)
        .await;

    let key = client
        .push(
            &["Testing Sites", "40_713 -74_006", "comments"],
            &"Line was short",
        )
        .await
        .unwrap();
    assert_eq!(key, "-NxAbc123");
}

#[tokio::test]
async fn test_delete() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/Testing%20Sites/40_713%20-74_006.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .expect(1)
        .mount(&server)
        .await;

    client
        .delete(&["Testing Sites", "40_713 -74_006"])
        .await
        .unwrap();
}

// ── Error handling ──────────────────────────────────────────────────

#[tokio::test]
async fn test_permission_denied() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "Permission denied" })),
        )
        .mount(&server)
        .await;

    let err = client
        .put(&["Testing Sites", "k", "site data"], &json!({}))
        .await
        .unwrap_err();

    match err {
        Error::PermissionDenied { message } => assert_eq!(message, "Permission denied"),
        other => panic!("expected PermissionDenied, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_keeps_raw_body() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = client.delete(&["Testing Sites", "k"]).await.unwrap_err();
    assert!(err.is_transient());
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "upstream unavailable");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_push_response_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;

    let err = client.push(&["x"], &"y").await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }));
}

// ── Event stream ────────────────────────────────────────────────────

#[tokio::test]
async fn test_event_stream_delivers_put_then_patch() {
    let (server, client) = setup().await;

    let body = concat!(
        "event: put\n",
        "data: {\"path\":\"/\",\"data\":{\"40_713 -74_006\":{\"site data\":{\"coordinates\":\"40.713 -74.006\"}}}}\n",
        "\n",
        "event: keep-alive\n",
        "data: null\n",
        "\n",
        "event: patch\n",
        "data: {\"path\":\"/40_713 -74_006/site data\",\"data\":{\"wait time\":\"20\"}}\n",
        "\n",
    );

    Mock::given(method("GET"))
        .and(path("/Testing%20Sites.json"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let mut stream = EventStream::connect(
        client,
        vec!["Testing Sites".into()],
        ReconnectConfig::default(),
        cancel.clone(),
    );

    let first = tokio::time::timeout(Duration::from_secs(5), stream.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.path(), "/");
    assert!(matches!(first, StreamEvent::Put { .. }));

    let second = tokio::time::timeout(Duration::from_secs(5), stream.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        second,
        StreamEvent::Patch {
            path: "/40_713 -74_006/site data".into(),
            data: json!({ "wait time": "20" }),
        }
    );

    stream.shutdown();
}

#[tokio::test]
async fn test_event_stream_gives_up_after_max_retries() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "Permission denied" })),
        )
        .mount(&server)
        .await;

    let reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        max_retries: Some(1),
    };
    let mut stream = EventStream::connect(
        client,
        vec!["Testing Sites".into()],
        reconnect,
        CancellationToken::new(),
    );

    let next = tokio::time::timeout(Duration::from_secs(5), stream.recv())
        .await
        .unwrap();
    assert!(next.is_none());
}
