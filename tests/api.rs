//! API endpoint integration tests

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

mod common;
use common::{RecordingBackend, Setup, build, default_app};

async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = default_app();
    let (status, json) = call(app.router(), "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_before_any_backend_call() {
    let app = default_app();
    let (status, json) = call(app.router(), "GET", "/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["checks"]["backend"]["status"], "unknown");
    assert_eq!(json["checks"]["song_catalog"]["status"], "ok");
}

#[tokio::test]
async fn test_ready_degrades_after_timeout() {
    let app = build(
        RecordingBackend::slow(std::time::Duration::from_millis(200)),
        Setup {
            gateway: kairos_gateway::gateway::GatewayConfig {
                deadline: std::time::Duration::from_millis(10),
                ..Setup::default().gateway
            },
            ..Setup::default()
        },
    );

    let (status, json) = call(
        app.router(),
        "POST",
        "/api/intent",
        Some(json!({ "name": "next-slide" })),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["error"]["code"], "timeout");

    let (status, json) = call(app.router(), "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["backend"]["status"], "fail");
}

#[tokio::test]
async fn test_status_reports_policy_and_adapters() {
    let app = default_app();
    let (status, json) = call(app.router(), "GET", "/api/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ai_enabled"], true);
    assert_eq!(json["thresholds"]["high"], 0.8);
    assert_eq!(json["disabled_mode"], "block");
    assert_eq!(json["pending"], 0);
    assert_eq!(json["adapters"]["nlu"], "rule-based");
    assert_eq!(json["adapters"]["song_catalog"], true);
    assert_eq!(json["backend"]["backend"], "recording");
}

#[tokio::test]
async fn test_structured_intent_auto_executes() {
    let app = default_app();
    let (status, json) = call(
        app.router(),
        "POST",
        "/api/intent",
        Some(json!({ "name": "go-to-slide", "parameters": { "slide": 4 }, "confidence": 0.95 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "executed");
    assert_eq!(json["result"]["ok"], true);
    assert_eq!(app.backend.sent().len(), 1);
}

#[tokio::test]
async fn test_invalid_intent_is_unprocessable() {
    let app = default_app();
    let (status, json) = call(
        app.router(),
        "POST",
        "/api/intent",
        Some(json!({ "name": "go-to-slide", "confidence": 0.95 })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["code"], "invalid_intent");
    assert!(app.backend.sent().is_empty());
}

#[tokio::test]
async fn test_pending_confirm_flow() {
    let app = default_app();
    let (_, json) = call(
        app.router(),
        "POST",
        "/api/intent",
        Some(json!({ "name": "next-slide", "confidence": 0.5 })),
    )
    .await;
    assert_eq!(json["outcome"], "pending");
    let id = json["pending"]["id"].as_str().unwrap().to_string();

    let (status, json) = call(app.router(), "GET", "/api/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pending"].as_array().unwrap().len(), 1);

    let (status, json) = call(app.router(), "GET", &format!("/api/pending/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "pending");

    let uri = format!("/api/pending/{id}/confirm");
    let (status, json) = call(app.router(), "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["status"], "executed");

    let (status, json) = call(app.router(), "POST", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "already_handled");
    assert_eq!(app.backend.sent().len(), 1);
}

#[tokio::test]
async fn test_confirm_rejected_by_backend_is_502() {
    let app = build(RecordingBackend::rejecting(), Setup::default());
    let (_, json) = call(
        app.router(),
        "POST",
        "/api/intent",
        Some(json!({ "name": "next-slide", "confidence": 0.5 })),
    )
    .await;
    let id = json["pending"]["id"].as_str().unwrap().to_string();

    let (status, json) = call(app.router(), "POST", &format!("/api/pending/{id}/confirm"), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "backend_failure");
    assert!(json["error"]["message"].as_str().unwrap().contains("no presentation loaded"));

    let (_, json) = call(app.router(), "GET", &format!("/api/pending/{id}"), None).await;
    assert_eq!(json["state"], "failed");
}

#[tokio::test]
async fn test_overloaded_gateway_is_503() {
    let app = build(
        RecordingBackend::slow(std::time::Duration::from_millis(200)),
        Setup {
            gateway: kairos_gateway::gateway::GatewayConfig {
                max_concurrency: 1,
                admission: kairos_gateway::gateway::AdmissionMode::FailFast,
                ..Setup::default().gateway
            },
            ..Setup::default()
        },
    );
    let body = json!({ "name": "next-slide", "confidence": 0.95 });

    let first = tokio::spawn(call(app.router(), "POST", "/api/intent", Some(body.clone())));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let (status, json) = call(app.router(), "POST", "/api/intent", Some(body)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "overloaded");

    let (status, _) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.backend.sent().len(), 1);
}

#[tokio::test]
async fn test_pending_cancel() {
    let app = default_app();
    let (_, json) = call(
        app.router(),
        "POST",
        "/api/intent",
        Some(json!({ "name": "clear-screen", "confidence": 0.5 })),
    )
    .await;
    let id = json["pending"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(app.router(), "POST", &format!("/api/pending/{id}/cancel"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(app.router(), "POST", &format!("/api/pending/{id}/confirm"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.backend.sent().is_empty());
}

#[tokio::test]
async fn test_unknown_pending_is_not_found() {
    let app = default_app();
    let id = uuid::Uuid::new_v4();
    let (status, _) = call(app.router(), "GET", &format!("/api/pending/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_capacity_exceeded_is_429() {
    let app = build(
        RecordingBackend::new(),
        Setup {
            store: kairos_gateway::hitl::StoreConfig {
                max_pending: 1,
                ..kairos_gateway::hitl::StoreConfig::default()
            },
            ..Setup::default()
        },
    );
    let body = json!({ "name": "next-slide", "confidence": 0.5 });

    let (status, _) = call(app.router(), "POST", "/api/intent", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, json) = call(app.router(), "POST", "/api/intent", Some(body)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "capacity_exceeded");
}

#[tokio::test]
async fn test_nlu_detect_routes_text() {
    let app = default_app();
    let (status, json) = call(
        app.router(),
        "POST",
        "/api/nlu/detect",
        Some(json!({ "text": "next slide please" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["intent"]["name"], "next-slide");
    assert_eq!(json["outcome"]["outcome"], "executed");
}

#[tokio::test]
async fn test_nlu_detect_unrecognized_text() {
    let app = default_app();
    let (status, json) = call(
        app.router(),
        "POST",
        "/api/nlu/detect",
        Some(json!({ "text": "what a lovely morning" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["outcome"].is_null());
    assert!(app.backend.sent().is_empty());
}

#[tokio::test]
async fn test_stt_without_transcriber_is_unavailable() {
    let app = default_app();
    let (status, json) = call(
        app.router(),
        "POST",
        "/api/stt/recognize",
        Some(json!({ "audio": "AQID", "mime": "audio/wav" })),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "not_configured");
}

#[tokio::test]
async fn test_simulated_music_match_resolves_catalog() {
    let app = default_app();
    app.songs
        .upsert("Amazing Grace", "Library/Amazing Grace.pro", None)
        .unwrap();

    let (status, json) = call(
        app.router(),
        "POST",
        "/api/music/identify",
        Some(json!({ "title": "amazing grace", "confidence": 0.95 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"]["outcome"], "executed");
    let sent = app.backend.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].parameters["identifier"], "Library/Amazing Grace.pro");
}

#[tokio::test]
async fn test_unknown_song_is_recognition_failure() {
    let app = default_app();
    let (status, json) = call(
        app.router(),
        "POST",
        "/api/music/identify",
        Some(json!({ "title": "Not In Catalog" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["code"], "recognition_failed");
    assert!(app.backend.sent().is_empty());
}

#[tokio::test]
async fn test_state_toggle_and_thresholds() {
    let app = default_app();

    let (status, json) = call(
        app.router(),
        "POST",
        "/api/state",
        Some(json!({ "ai_enabled": false, "high_threshold": 0.9 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ai_enabled"], false);
    assert_eq!(json["thresholds"]["high"], 0.9);

    let (_, json) = call(
        app.router(),
        "POST",
        "/api/intent",
        Some(json!({ "name": "next-slide", "confidence": 0.99 })),
    )
    .await;
    assert_eq!(json["outcome"], "rejected");
    assert_eq!(json["reason"], "ai_disabled");

    let (status, _) = call(
        app.router(),
        "POST",
        "/api/state",
        Some(json!({ "low_threshold": 0.95 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, json) = call(app.router(), "GET", "/api/state", None).await;
    assert_eq!(json["thresholds"]["low"], 0.3);
}

#[tokio::test]
async fn test_song_catalog_crud() {
    let app = default_app();

    let (status, json) = call(
        app.router(),
        "POST",
        "/api/songs",
        Some(json!({ "title": "Oceans", "identifier": "Library/Oceans.pro" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = json["id"].as_i64().unwrap();

    let (_, json) = call(app.router(), "GET", "/api/songs", None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (status, _) = call(app.router(), "DELETE", &format!("/api/songs/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(app.router(), "DELETE", &format!("/api/songs/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_applies_to_intake_only() {
    let app = default_app();
    let router = app.router_with_rate_limit(1);
    let body = json!({ "text": "clear the screen" });

    let (status, _) = call(router.clone(), "POST", "/api/nlu/detect", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(router.clone(), "POST", "/api/nlu/detect", Some(body)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = call(router, "GET", "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
}
