//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use tablesync_api::state::AppState;
use tablesync_core::clock::Clock;
use tablesync_core::id::SessionId;
use tablesync_core::store::{SessionRecord, SessionStore};
use tablesync_session::{Orchestrator, OrchestratorConfig};
use tablesync_test_support::{FixedClock, InMemorySessionStore, ScriptedNarrator, SequenceRng};
use tower::ServiceExt;

/// Fixed timestamp used across all integration tests.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// A running orchestrator plus the one session its store knows about.
pub struct TestApp {
    pub router: Router,
    pub orchestrator: Arc<Orchestrator>,
    pub session_id: SessionId,
}

/// Build the full app with deterministic collaborators and no dice scripted.
pub fn build_test_app() -> TestApp {
    build_test_app_with_rolls(Vec::new())
}

/// Build the full app with a `SequenceRng` for tests that roll dice.
pub fn build_test_app_with_rolls(rolls: Vec<u32>) -> TestApp {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(fixed_time()));
    let session_id = SessionId::new();
    let store = InMemorySessionStore::with_sessions([SessionRecord::new(
        session_id,
        "The Sunken Keep",
        fixed_time(),
    )]);
    let orchestrator = Arc::new(Orchestrator::new(
        OrchestratorConfig::default(),
        clock,
        Arc::new(Mutex::new(SequenceRng::new(rolls))),
        Arc::new(store) as Arc<dyn SessionStore>,
        Arc::new(ScriptedNarrator::new("The torches gutter.")),
    ));
    let router = tablesync_api::app(AppState::new(Arc::clone(&orchestrator)));
    TestApp {
        router,
        orchestrator,
        session_id,
    }
}

/// Send a GET request and parse the JSON response body.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    get_json_with_headers(app, uri, &[]).await
}

/// Send a GET request with extra headers and parse the JSON response body.
pub async fn get_json_with_headers(
    app: Router,
    uri: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}
