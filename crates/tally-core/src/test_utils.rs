//! Test utilities for tally-core
//!
//! This module provides testing infrastructure including a mock identity
//! provider that can be used for development and integration tests. It speaks
//! just enough of the provider's HTTP surface for the auth delegate and the
//! bearer middleware, and counts calls so tests can assert that validation
//! failures short-circuit before any provider traffic.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// Mock identity provider for testing
pub struct MockProviderServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    counters: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    signup_calls: AtomicUsize,
    token_calls: AtomicUsize,
    user_calls: AtomicUsize,
}

impl MockProviderServer {
    /// Access token the mock issues and accepts
    pub const ACCESS_TOKEN: &'static str = "mock-access-token";

    /// A second accepted token, belonging to a different user
    pub const SECOND_ACCESS_TOKEN: &'static str = "mock-access-token-2";

    /// Refresh token the mock issues and accepts
    pub const REFRESH_TOKEN: &'static str = "mock-refresh-token";

    /// Password that makes sign-in fail with invalid credentials
    pub const WRONG_PASSWORD: &'static str = "wrong-password";

    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let counters = Arc::new(Counters::default());

        let app = Router::new()
            .route("/auth/v1/signup", post(handle_signup))
            .route("/auth/v1/token", post(handle_token))
            .route("/auth/v1/user", get(handle_user))
            .with_state(counters.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            counters,
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of sign-up requests received
    pub fn signup_calls(&self) -> usize {
        self.counters.signup_calls.load(Ordering::SeqCst)
    }

    /// Number of token-grant requests received (password + refresh)
    pub fn token_calls(&self) -> usize {
        self.counters.token_calls.load(Ordering::SeqCst)
    }

    /// Number of user-lookup (token validation) requests received
    pub fn user_calls(&self) -> usize {
        self.counters.user_calls.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockProviderServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn session_json(email: &str, full_name: Option<&str>) -> Value {
    json!({
        "access_token": MockProviderServer::ACCESS_TOKEN,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": MockProviderServer::REFRESH_TOKEN,
        "user": user_json(email, full_name),
    })
}

fn user_json(email: &str, full_name: Option<&str>) -> Value {
    json!({
        "id": format!("mock-user-{}", email),
        "email": email,
        "email_confirmed_at": "2024-01-01T00:00:00Z",
        "user_metadata": { "full_name": full_name },
    })
}

#[derive(Deserialize)]
struct SignupBody {
    email: String,
    #[allow(dead_code)]
    password: String,
    #[serde(default)]
    data: Option<Value>,
}

async fn handle_signup(
    State(counters): State<Arc<Counters>>,
    Json(body): Json<SignupBody>,
) -> (StatusCode, Json<Value>) {
    counters.signup_calls.fetch_add(1, Ordering::SeqCst);

    if body.email == "taken@example.com" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "msg": "User already registered" })),
        );
    }

    let full_name = body
        .data
        .as_ref()
        .and_then(|d| d.get("full_name"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    (
        StatusCode::OK,
        Json(session_json(&body.email, full_name.as_deref())),
    )
}

#[derive(Deserialize)]
struct TokenQuery {
    grant_type: String,
}

#[derive(Deserialize)]
struct TokenBody {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

async fn handle_token(
    State(counters): State<Arc<Counters>>,
    Query(query): Query<TokenQuery>,
    Json(body): Json<TokenBody>,
) -> (StatusCode, Json<Value>) {
    counters.token_calls.fetch_add(1, Ordering::SeqCst);

    match query.grant_type.as_str() {
        "password" => {
            let email = body.email.unwrap_or_default();
            if body.password.as_deref() == Some(MockProviderServer::WRONG_PASSWORD) {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error_description": "Invalid login credentials" })),
                )
            } else {
                (StatusCode::OK, Json(session_json(&email, None)))
            }
        }
        "refresh_token" => {
            if body.refresh_token.as_deref() == Some(MockProviderServer::REFRESH_TOKEN) {
                (
                    StatusCode::OK,
                    Json(session_json("refreshed@example.com", None)),
                )
            } else {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error_description": "Invalid Refresh Token" })),
                )
            }
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported_grant_type" })),
        ),
    }
}

async fn handle_user(
    State(counters): State<Arc<Counters>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    counters.user_calls.fetch_add(1, Ordering::SeqCst);

    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "));

    match bearer {
        Some(MockProviderServer::ACCESS_TOKEN) => (
            StatusCode::OK,
            Json(user_json("alice@example.com", Some("Alice Example"))),
        ),
        Some(MockProviderServer::SECOND_ACCESS_TOKEN) => (
            StatusCode::OK,
            Json(user_json("bob@example.com", Some("Bob Example"))),
        ),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "msg": "Invalid token" })),
        ),
    }
}
