// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use awards_night::config::Config;
use awards_night::db::FirestoreDb;
use awards_night::host::RecordingNavigator;
use awards_night::services::{IdentityClient, SessionManager};
use awards_night::storage::MemoryStorage;
use awards_night::time_utils::ManualClock;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Fixed start of time for session tests.
#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 19, 0, 0).unwrap()
}

struct MockIdentityState {
    status: StatusCode,
    authorizations: Mutex<Vec<String>>,
}

/// Userinfo endpoint served from a local port.
#[allow(dead_code)]
pub struct MockIdentity {
    pub userinfo_url: String,
    state: Arc<MockIdentityState>,
}

#[allow(dead_code)]
impl MockIdentity {
    /// `Authorization` header values of every request received so far.
    pub fn authorizations(&self) -> Vec<String> {
        self.state.authorizations.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.state.authorizations.lock().unwrap().len()
    }
}

async fn userinfo(State(state): State<Arc<MockIdentityState>>, headers: HeaderMap) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.authorizations.lock().unwrap().push(authorization);

    if state.status != StatusCode::OK {
        return (state.status, "identity provider unavailable").into_response();
    }

    Json(serde_json::json!({
        "sub": "1098765",
        "email": "ada@example.com",
        "email_verified": true,
        "name": "Ada Lovelace",
        "picture": "https://lh3.example.com/ada.png"
    }))
    .into_response()
}

/// Start a userinfo endpoint that answers every request with `status`.
#[allow(dead_code)]
pub async fn spawn_identity(status: StatusCode) -> MockIdentity {
    let state = Arc::new(MockIdentityState {
        status,
        authorizations: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/userinfo", get(userinfo))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock identity provider");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockIdentity {
        userinfo_url: format!("http://{}/userinfo", addr),
        state,
    }
}

/// A session manager wired to in-memory collaborators.
#[allow(dead_code)]
pub struct Harness {
    pub manager: Arc<SessionManager>,
    pub storage: Arc<MemoryStorage>,
    pub navigator: Arc<RecordingNavigator>,
    pub clock: Arc<ManualClock>,
    pub identity: MockIdentity,
}

/// Build a harness positioned at `start_url` whose identity provider answers
/// with `status`.
#[allow(dead_code)]
pub async fn harness(start_url: &str, status: StatusCode) -> Harness {
    let identity = spawn_identity(status).await;
    let config = Config {
        oauth_userinfo_url: identity.userinfo_url.clone(),
        ..Config::default()
    };

    let storage = Arc::new(MemoryStorage::new());
    let navigator = Arc::new(RecordingNavigator::at(start_url).expect("valid start URL"));
    let clock = Arc::new(ManualClock::new(t0()));

    let manager = Arc::new(SessionManager::new(
        IdentityClient::new(&config),
        storage.clone(),
        navigator.clone(),
        clock.clone(),
    ));

    Harness {
        manager,
        storage,
        navigator,
        clock,
        identity,
    }
}
