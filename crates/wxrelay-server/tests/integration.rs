use axum::http::StatusCode;
use http_body_util::BodyExt;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;
use wxrelay_core::config::{CacheBackend, Config};
use wxrelay_core::Relay;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Relay wired to the mock server, with an in-memory cache.
async fn relay_for(server: &mockito::ServerGuard) -> Arc<Relay> {
    let mut config = Config::default();
    config.cache.backend = CacheBackend::Memory;
    config.cache.retry_delay_ms = 10;
    config.signals.url = format!("{}/minds/ssb", server.url());
    config.bulletins.url = format!("{}/bulletin/snapshot", server.url());
    config.webhook.url = format!("{}/hooks/relay", server.url());
    Arc::new(Relay::from_config(config).await.unwrap())
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a POST request with a JSON body via `oneshot` and return (status, parsed JSON body).
async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn signal_batch(id: u64) -> String {
    json!({
        "SignalRequestList": { "SignalRequest": [
            {
                "id": id.to_string(),
                "signalCode": "WTS",
                "signalName": "Thunderstorm Warning",
                "action": "Issue",
                "activeTime": "15/07/2025 05:15",
                "createdBy": "alice",
                "lastUpdatedBy": "bob"
            }
        ]}
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_both_jobs() {
    let server = mockito::Server::new_async().await;
    let app = wxrelay_server::build_router(relay_for(&server).await);

    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["jobs"]["signals"]["phase"], "idle");
    assert_eq!(body["jobs"]["bulletins"]["running"], false);
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn signal_job_dispatches_once_then_reports_idle() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/minds/ssb")
        .with_status(200)
        .with_body(signal_batch(21))
        .expect(2)
        .create_async()
        .await;
    let hook = server
        .mock("POST", "/hooks/relay")
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .expect(1)
        .create_async()
        .await;
    let app = wxrelay_server::build_router(relay_for(&server).await);

    let (status, body) = post_json(app.clone(), "/executeSsbJob", json!({})).await;
    assert_eq!(status.as_u16(), 210);
    assert_eq!(body["message"], "Processed 1 requests.");
    assert_eq!(body["count"], 1);

    let (status, body) = post_json(app.clone(), "/executeSsbJob", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (status, body) = get(app, "/getAllCacheData").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"]["entries"][0]["key"], "wts:21");
    assert_eq!(body["data"]["execution_disabled"], false);

    hook.assert_async().await;
}

#[tokio::test]
async fn failed_fetch_reports_aborted_with_200() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/minds/ssb")
        .with_status(503)
        .create_async()
        .await;
    let app = wxrelay_server::build_router(relay_for(&server).await);

    let (status, body) = post_json(app, "/executeSsbJob", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert_eq!(body["report"]["status"], "aborted");
}

#[tokio::test]
async fn disabled_execution_returns_220_without_fetching() {
    let mut server = mockito::Server::new_async().await;
    let feed = server
        .mock("GET", "/minds/ssb")
        .with_status(200)
        .with_body(signal_batch(5))
        .expect(0)
        .create_async()
        .await;
    let app = wxrelay_server::build_router(relay_for(&server).await);

    let (status, body) = post_json(app.clone(), "/enableExecute", json!({ "enable": false })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Execution disabled");

    let (status, body) = post_json(app.clone(), "/executeSsbJob", json!({})).await;
    assert_eq!(status.as_u16(), 220);
    assert_eq!(body["message"], "Execution is disabled.");

    let (_, body) = get(app.clone(), "/getAllCacheData").await;
    assert_eq!(body["data"]["execution_disabled"], true);

    let (_, body) = post_json(app, "/enableExecute", json!({ "enable": true })).await;
    assert_eq!(body["message"], "Execution enabled");

    feed.assert_async().await;
}

#[tokio::test]
async fn enable_body_without_flag_disables() {
    let server = mockito::Server::new_async().await;
    let relay = relay_for(&server).await;
    let app = wxrelay_server::build_router(relay.clone());

    let (status, _) = post_json(app, "/enableExecute", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!relay.is_enabled().await.unwrap());
}

#[tokio::test]
async fn enable_without_json_body_disables() {
    let server = mockito::Server::new_async().await;
    let relay = relay_for(&server).await;
    let app = wxrelay_server::build_router(relay.clone());

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/enableExecute")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["message"], "Execution disabled");
    assert!(!relay.is_enabled().await.unwrap());
}

#[tokio::test]
async fn bulletin_preview_surfaces_fetch_errors_as_502() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/bulletin/snapshot")
        .with_status(500)
        .create_async()
        .await;
    let app = wxrelay_server::build_router(relay_for(&server).await);

    let (status, body) = post_json(app, "/getSpecialWeatherTips", json!({})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("500"));
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clearing_signal_caches_keeps_kill_switch() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/minds/ssb")
        .with_status(200)
        .with_body(signal_batch(9))
        .create_async()
        .await;
    server
        .mock("POST", "/hooks/relay")
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .create_async()
        .await;
    let relay = relay_for(&server).await;
    let app = wxrelay_server::build_router(relay.clone());

    post_json(app.clone(), "/executeSsbJob", json!({})).await;
    relay.set_enabled(false).await.unwrap();

    let (status, body) = post_json(app.clone(), "/clearRequestCaches", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["message"], "Cleared 1 request caches.");

    let (_, body) = post_json(app.clone(), "/clearTipCaches", json!({})).await;
    assert_eq!(body["count"], 0);

    let (_, body) = get(app, "/getAllCacheData").await;
    assert_eq!(body["count"], 0);
    assert_eq!(body["data"]["execution_disabled"], true);
}

#[tokio::test]
async fn serve_on_answers_over_tcp() {
    let server = mockito::Server::new_async().await;
    let relay = relay_for(&server).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(wxrelay_server::serve_on(relay, listener));

    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("\"status\":\"ok\""));

    handle.abort();
}
