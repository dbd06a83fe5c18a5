//! In-process portal backend for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{Duration as TimeDelta, Utc};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};

use water_portal_gateway::auth::ROLE_CLAIM;
use water_portal_gateway::gateway::SessionGateway;
use water_portal_gateway::navigation::RecordingNavigator;
use water_portal_gateway::session::{Credential, MemoryStorage};

const SIGNING_SECRET: &[u8] = b"integration-test-secret";
pub const PASSWORD: &str = "secret";

#[derive(Debug, Clone)]
pub struct MockBackend {
    pub base_url: String,
    state: Arc<BackendState>,
}

#[derive(Debug, Default)]
struct BackendState {
    /// The only token `/registration` accepts.
    current_token: Mutex<String>,
    issued: AtomicUsize,
    refresh_calls: AtomicUsize,
    refresh_delay: Mutex<Duration>,
    refresh_failure: Mutex<Option<StatusCode>>,
    /// Applied to `/registration` before the token is checked.
    resource_delay: Mutex<Duration>,
    /// Decoded path parameters of the last parameterized call, keyed by route.
    last_params: Mutex<HashMap<&'static str, Vec<String>>>,
    last_body: Mutex<Option<Value>>,
    hits: Mutex<HashMap<&'static str, usize>>,
    last_authorization: Mutex<HashMap<&'static str, Option<String>>>,
}

impl BackendState {
    fn record(&self, path: &'static str, headers: &HeaderMap) -> Option<String> {
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        *self.hits.lock().unwrap().entry(path).or_default() += 1;
        self.last_authorization
            .lock()
            .unwrap()
            .insert(path, authorization.clone());
        authorization
    }

    fn mint(&self, roles: &[&str]) -> String {
        let serial = self.issued.fetch_add(1, Ordering::SeqCst);
        let claims = json!({
            "sub": format!("user-{serial}"),
            "name": "Operador",
            "exp": (Utc::now() + TimeDelta::hours(1)).timestamp(),
            "jti": serial,
            (ROLE_CLAIM): roles,
        });
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SIGNING_SECRET),
        )
        .unwrap()
    }
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());

        let api = Router::new()
            .route("/account/login", post(login))
            .route("/account/refresh-token", post(refresh_token))
            .route("/report", get(reports))
            .route("/registration", get(registrations))
            .route("/flaky", get(flaky))
            .route("/forbidden", get(forbidden))
            .route("/boom", get(boom))
            .route("/state", get(states))
            .route("/UploadReceipt/all", get(receipts))
            .route("/block", get(blocks))
            .route("/neighborhood-colony", get(neighborhoods))
            .route("/neighborhood-colony/block/{block_id}", get(block_neighborhoods))
            .route("/account/remove-role/{user_id}/{role}", delete(remove_role))
            .route("/report/{id}/state/{state_id}", put(update_report_state))
            .with_state(state.clone());
        let app = Router::new().nest("/api", api);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/api"),
            state,
        }
    }

    /// A credential the backend currently accepts.
    pub fn valid_credential(&self, roles: &[&str]) -> Credential {
        let token = self.state.mint(roles);
        *self.state.current_token.lock().unwrap() = token.clone();
        credential(token, Utc::now() + TimeDelta::hours(1), roles)
    }

    /// A well-formed, locally unexpired credential the backend rejects with 401.
    pub fn stale_credential(&self, roles: &[&str]) -> Credential {
        credential(self.state.mint(roles), Utc::now() + TimeDelta::hours(1), roles)
    }

    pub fn expired_credential(&self, roles: &[&str]) -> Credential {
        credential(self.state.mint(roles), Utc::now() - TimeDelta::minutes(5), roles)
    }

    pub fn current_token(&self) -> String {
        self.state.current_token.lock().unwrap().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock().unwrap() = delay;
    }

    pub fn set_resource_delay(&self, delay: Duration) {
        *self.state.resource_delay.lock().unwrap() = delay;
    }

    pub fn last_params(&self, route: &str) -> Option<Vec<String>> {
        self.state.last_params.lock().unwrap().get(route).cloned()
    }

    pub fn last_body(&self) -> Option<Value> {
        self.state.last_body.lock().unwrap().clone()
    }

    pub fn fail_refresh_with(&self, status: StatusCode) {
        *self.state.refresh_failure.lock().unwrap() = Some(status);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state
            .hits
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn last_authorization(&self, path: &str) -> Option<String> {
        self.state
            .last_authorization
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .flatten()
    }

    /// Gateway over in-memory storage primed with `credential`.
    pub async fn gateway(
        &self,
        credential: Option<Credential>,
    ) -> (SessionGateway, RecordingNavigator) {
        let storage = match credential {
            Some(credential) => MemoryStorage::with_credential(credential),
            None => MemoryStorage::new(),
        };
        let navigator = RecordingNavigator::new();
        let gateway = SessionGateway::builder(self.base_url.clone())
            .storage(Arc::new(storage))
            .navigator(Arc::new(navigator.clone()))
            .build()
            .await
            .unwrap();
        (gateway, navigator)
    }
}

fn credential(token: String, expires_at: chrono::DateTime<Utc>, roles: &[&str]) -> Credential {
    Credential::new(token, "refresh-token", expires_at, roles.iter().copied())
}

async fn login(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    if body["password"] != PASSWORD {
        return (StatusCode::BAD_REQUEST, "Invalid username or password").into_response();
    }
    let token = state.mint(&["Admin"]);
    *state.current_token.lock().unwrap() = token.clone();
    Json(json!({
        "data": {
            "token": token,
            "refreshToken": "login-refresh-token",
            "tokenExpiration": (Utc::now() + TimeDelta::hours(1)).to_rfc3339(),
            "roles": ["Admin"],
        }
    }))
    .into_response()
}

async fn refresh_token(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *state.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let failure = *state.refresh_failure.lock().unwrap();
    if let Some(status) = failure {
        return (status, "Refresh token rejected").into_response();
    }
    if body["refreshToken"].as_str().is_none() {
        return (StatusCode::BAD_REQUEST, "missing refreshToken").into_response();
    }

    let token = state.mint(&["Admin"]);
    *state.current_token.lock().unwrap() = token.clone();
    // Zone-less timestamp, as the backend serializes it.
    let expiration = (Utc::now() + TimeDelta::hours(1))
        .naive_utc()
        .format("%Y-%m-%dT%H:%M:%S%.f")
        .to_string();
    Json(json!({
        "data": {
            "token": token,
            "refreshToken": "rotated-refresh-token",
            "tokenExpiration": expiration,
        }
    }))
    .into_response()
}

async fn reports(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/report", &headers);
    Json(json!({
        "data": [{
            "id": "r-1",
            "name": "Fuga en la calle 5",
            "date": "2024-05-01",
            "report": "Tuberia rota",
            "observation": "",
            "state": "Pendiente",
            "address": "Calle 5"
        }]
    }))
    .into_response()
}

async fn registrations(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    let authorization = state.record("/registration", &headers);
    let delay = *state.resource_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let expected = format!("Bearer {}", state.current_token.lock().unwrap());
    if authorization.as_deref() != Some(expected.as_str()) {
        return (StatusCode::UNAUTHORIZED, "token expired").into_response();
    }
    Json(json!({
        "data": [{ "id": "s-1", "date": "2024-05-01", "observation": "Sin servicio 8-14h" }]
    }))
    .into_response()
}

async fn flaky(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/flaky", &headers);
    (StatusCode::UNAUTHORIZED, "never authorized").into_response()
}

async fn forbidden(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/forbidden", &headers);
    (StatusCode::FORBIDDEN, "forbidden").into_response()
}

async fn boom(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/boom", &headers);
    (StatusCode::INTERNAL_SERVER_ERROR, "kaboom").into_response()
}

async fn states(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/state", &headers);
    Json(json!({
        "data": [{ "id": 1, "name": "no asignado" }, { "id": 2, "name": "asignado" }]
    }))
    .into_response()
}

async fn receipts(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/UploadReceipt/all", &headers);
    Json(json!({
        "data": [{
            "id": "u-1",
            "clave": "A-12",
            "fechaSubida": "2024-05-02",
            "urls": ["https://files.example/a.pdf"]
        }]
    }))
    .into_response()
}

async fn blocks(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/block", &headers);
    Json(json!({ "data": [{ "id": 3, "name": "Bloque Norte" }] })).into_response()
}

async fn neighborhoods(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/neighborhood-colony", &headers);
    Json(json!({ "data": [{ "id": "c-1", "name": "Centro" }, { "id": "c-2", "name": "Lomas" }] }))
        .into_response()
}

async fn block_neighborhoods(
    State(state): State<Arc<BackendState>>,
    Path(block_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.record("/neighborhood-colony/block", &headers);
    state
        .last_params
        .lock()
        .unwrap()
        .insert("/neighborhood-colony/block", vec![block_id]);
    Json(json!({ "status": true, "data": [{ "id": "c-2", "name": "Lomas", "blockId": 3 }] }))
        .into_response()
}

async fn remove_role(
    State(state): State<Arc<BackendState>>,
    Path((user_id, role)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    state.record("/account/remove-role", &headers);
    state
        .last_params
        .lock()
        .unwrap()
        .insert("/account/remove-role", vec![user_id, role]);
    StatusCode::NO_CONTENT.into_response()
}

async fn update_report_state(
    State(state): State<Arc<BackendState>>,
    Path((id, state_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("/report/state", &headers);
    state
        .last_params
        .lock()
        .unwrap()
        .insert("/report/state", vec![id, state_id]);
    *state.last_body.lock().unwrap() = Some(body);
    StatusCode::NO_CONTENT.into_response()
}
