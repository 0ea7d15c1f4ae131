// In-process stand-in for the provider's auth REST API.
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use session_bridge::domain::{Notice, Notifier, Session, SessionStorage, User};
use session_bridge::interface_adapters::clients::{ProviderClient, ProviderSettings};
use session_bridge::interface_adapters::storage::InMemorySessionStorage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ANON_KEY: &str = "test-anon-key";
pub const EMAIL: &str = "a@b.com";
pub const PASSWORD: &str = "correct-horse";

#[derive(Default)]
pub struct MockState {
    pub logout_calls: AtomicUsize,
    pub last_logout_token: Mutex<Option<String>>,
    // Zero means "answer normally".
    pub logout_status: AtomicU16,
    pub health_status: AtomicU16,
    pub refresh_status: AtomicU16,
    pub refresh_calls: AtomicUsize,
    pub refresh_delay_ms: AtomicU64,
}

pub struct MockProvider {
    pub base_url: String,
    pub state: Arc<MockState>,
}

pub async fn spawn_mock_provider() -> MockProvider {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/logout", post(logout))
        .route("/rest/v1/", get(health))
        .with_state(state.clone());

    // Bind to an ephemeral port to avoid collisions with local services.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock provider failed");
    });

    MockProvider {
        base_url: format!("http://{addr}"),
        state,
    }
}

// Address that refuses connections: bind, read the port, then let it go.
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    drop(listener);
    format!("http://{addr}")
}

pub fn settings(base_url: &str) -> ProviderSettings {
    ProviderSettings {
        base_url: base_url.parse().expect("valid base url"),
        anon_key: ANON_KEY.to_string(),
        request_timeout: Duration::from_secs(2),
        storage_key: "test-auth".to_string(),
        refresh_margin: Duration::from_secs(60),
        health_path: "rest/v1/".to_string(),
        event_capacity: 16,
    }
}

pub fn client(base_url: &str, storage: Arc<InMemorySessionStorage>) -> ProviderClient {
    let storage: Arc<dyn SessionStorage> = storage;
    ProviderClient::new(settings(base_url), storage).expect("client should build")
}

pub fn stored_session(access_token: &str, refresh_token: &str, expires_at: u64) -> Session {
    Session {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        token_type: "bearer".to_string(),
        expires_in: 3600,
        expires_at: Some(expires_at),
        user: User {
            id: "user-1".to_string(),
            email: Some(EMAIL.to_string()),
            role: Some("authenticated".to_string()),
            app_metadata: serde_json::Map::new(),
            user_metadata: serde_json::Map::new(),
        },
    }
}

// Same double as the crate's unit-test support, which is not visible from
// integration tests.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notices mutex poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .expect("notices mutex poisoned")
            .push(notice);
    }
}

fn token_body(access_token: &str, refresh_token: &str, role: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": refresh_token,
        "user": {
            "id": "user-1",
            "email": EMAIL,
            "role": "authenticated",
            "app_metadata": { "provider": "email", "role": role },
            "user_metadata": {}
        }
    })
}

fn has_api_key(headers: &HeaderMap) -> bool {
    headers
        .get("apikey")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == ANON_KEY)
}

async fn token(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    if !has_api_key(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "No API key found" })))
            .into_response();
    }

    match query.get("grant_type").map(String::as_str) {
        Some("password") => {
            if body["email"] == EMAIL && body["password"] == PASSWORD {
                return Json(token_body("access-1", "refresh-1", "member")).into_response();
            }
            if body["email"] == "admin@b.com" && body["password"] == PASSWORD {
                return Json(token_body("access-admin", "refresh-admin", "admin")).into_response();
            }
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "code": 400,
                    "error_code": "invalid_credentials",
                    "msg": "Invalid login credentials"
                })),
            )
                .into_response()
        }
        Some("refresh_token") => {
            state.refresh_calls.fetch_add(1, Ordering::SeqCst);
            let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            let status = state.refresh_status.load(Ordering::SeqCst);
            if status != 0 {
                return StatusCode::from_u16(status)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                    .into_response();
            }
            if body["refresh_token"] == "refresh-1" {
                return Json(token_body("access-2", "refresh-2", "member")).into_response();
            }
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "invalid_grant",
                    "error_description": "Invalid Refresh Token: Refresh Token Not Found"
                })),
            )
                .into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn logout(State(state): State<Arc<MockState>>, headers: HeaderMap) -> StatusCode {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    let token = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);
    *state
        .last_logout_token
        .lock()
        .expect("logout token mutex poisoned") = token;

    match state.logout_status.load(Ordering::SeqCst) {
        0 => StatusCode::NO_CONTENT,
        code => StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

async fn health(State(state): State<Arc<MockState>>) -> StatusCode {
    match state.health_status.load(Ordering::SeqCst) {
        0 => StatusCode::OK,
        code => StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
