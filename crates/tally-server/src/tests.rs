//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tally_core::db::Database;
use tally_core::models::NewExpense;
use tally_core::test_utils::MockProviderServer;
use tower::ServiceExt;

/// Provider user id the mock issues for `ACCESS_TOKEN`
const ALICE: &str = "mock-user-alice@example.com";

/// Provider user id the mock issues for `SECOND_ACCESS_TOKEN`
const BOB: &str = "mock-user-bob@example.com";

struct TestContext {
    app: Router,
    db: Database,
    mock: MockProviderServer,
}

async fn setup() -> TestContext {
    setup_with(ServerConfig::default()).await
}

async fn setup_with(config: ServerConfig) -> TestContext {
    let db = Database::in_memory().unwrap();
    db.seed_system_categories().unwrap();
    let mock = MockProviderServer::start().await;
    let provider = AuthProvider::new(&mock.url(), "anon-key");
    let app = create_router(db.clone(), provider, config);
    TestContext { app, db, mock }
}

fn configured_oauth() -> OAuthConfig {
    OAuthConfig {
        github: OAuthApp {
            client_id: "real-github-id".to_string(),
            client_secret: "real-github-secret".to_string(),
        },
        google: OAuthApp {
            client_id: "real-google-id".to_string(),
            client_secret: "real-google-secret".to_string(),
        },
    }
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_authed(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

fn post_json_authed(uri: &str, body: &serde_json::Value, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

fn alice_expense(amount: f64) -> NewExpense {
    NewExpense {
        user_id: ALICE.to_string(),
        group_id: None,
        category_id: None,
        description: format!("expense {}", amount),
        amount,
        expense_date: None,
    }
}

// ========== Liveness ==========

#[tokio::test]
async fn test_liveness_probe() {
    let ctx = setup().await;

    let response = ctx.app.oneshot(get("/api/v1/test")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Test endpoint working");
    let timestamp = json["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

// ========== Signup ==========

#[tokio::test]
async fn test_signup_missing_fields() {
    let ctx = setup().await;

    let response = ctx
        .app
        .oneshot(post_json("/api/v1/auth/signup", &serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    let details = &json["error"]["details"];
    assert!(details.get("email").is_some());
    assert!(details.get("password").is_some());
    assert_eq!(ctx.mock.signup_calls(), 0);
}

#[tokio::test]
async fn test_signup_invalid_email() {
    let ctx = setup().await;

    let body = serde_json::json!({
        "email": "not-an-email",
        "password": "long-enough-pw",
    });
    let response = ctx
        .app
        .oneshot(post_json("/api/v1/auth/signup", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_body_json(response).await;
    assert!(json["error"]["details"].get("email").is_some());
}

#[tokio::test]
async fn test_signup_password_mismatch_never_calls_provider() {
    let ctx = setup().await;

    let body = serde_json::json!({
        "email": "new@example.com",
        "password": "secret-one",
        "confirm_password": "secret-two",
    });
    let response = ctx
        .app
        .oneshot(post_json("/api/v1/auth/signup", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_body_json(response).await;
    assert!(json["error"]["details"].get("confirm_password").is_some());
    assert_eq!(ctx.mock.signup_calls(), 0);
}

#[tokio::test]
async fn test_signup_success() {
    let ctx = setup().await;

    let body = serde_json::json!({
        "email": "new@example.com",
        "password": "long-enough-pw",
        "confirm_password": "long-enough-pw",
        "full_name": "New User",
    });
    let response = ctx
        .app
        .oneshot(post_json("/api/v1/auth/signup", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(
        json["data"]["access_token"],
        MockProviderServer::ACCESS_TOKEN
    );
    assert_eq!(json["data"]["user"]["email"], "new@example.com");
    assert_eq!(ctx.mock.signup_calls(), 1);
}

#[tokio::test]
async fn test_signup_duplicate_email() {
    let ctx = setup().await;

    let body = serde_json::json!({
        "email": "taken@example.com",
        "password": "long-enough-pw",
    });
    let response = ctx
        .app
        .oneshot(post_json("/api/v1/auth/signup", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_body_json(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("already registered"));
}

// ========== Signin ==========

#[tokio::test]
async fn test_signin_missing_password() {
    let ctx = setup().await;

    let body = serde_json::json!({ "email": "a@example.com" });
    let response = ctx
        .app
        .oneshot(post_json("/api/v1/auth/signin", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_body_json(response).await;
    assert!(json["error"]["details"].get("password").is_some());
    assert_eq!(ctx.mock.token_calls(), 0);
}

#[tokio::test]
async fn test_signin_invalid_credentials() {
    let ctx = setup().await;

    let body = serde_json::json!({
        "email": "a@example.com",
        "password": MockProviderServer::WRONG_PASSWORD,
    });
    let response = ctx
        .app
        .oneshot(post_json("/api/v1/auth/signin", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = get_body_json(response).await;
    assert_eq!(json["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_signin_success() {
    let ctx = setup().await;

    let body = serde_json::json!({
        "email": "a@example.com",
        "password": "correct-horse",
    });
    let response = ctx
        .app
        .oneshot(post_json("/api/v1/auth/signin", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["data"]["refresh_token"], MockProviderServer::REFRESH_TOKEN);
}

// ========== Refresh ==========

#[tokio::test]
async fn test_refresh_missing_token() {
    let ctx = setup().await;

    let response = ctx
        .app
        .oneshot(post_json("/api/v1/auth/refresh", &serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_body_json(response).await;
    assert!(json["error"]["details"].get("refresh_token").is_some());
}

#[tokio::test]
async fn test_refresh_invalid_token() {
    let ctx = setup().await;

    let body = serde_json::json!({ "refresh_token": "stale-token" });
    let response = ctx
        .app
        .oneshot(post_json("/api/v1/auth/refresh", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_success() {
    let ctx = setup().await;

    let body = serde_json::json!({ "refresh_token": MockProviderServer::REFRESH_TOKEN });
    let response = ctx
        .app
        .oneshot(post_json("/api/v1/auth/refresh", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(
        json["data"]["access_token"],
        MockProviderServer::ACCESS_TOKEN
    );
}

// ========== OAuth ==========

#[tokio::test]
async fn test_oauth_provider_listing() {
    let ctx = setup().await;

    let response = ctx.app.oneshot(get("/api/v1/auth/oauth")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let providers = json["data"].as_array().unwrap();
    assert_eq!(providers.len(), 2);
    assert!(providers.iter().all(|p| p["enabled"] == false));
}

#[tokio::test]
async fn test_oauth_initiate_unconfigured() {
    let ctx = setup().await;

    let response = ctx
        .app
        .oneshot(get("/api/v1/auth/oauth/github"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);

    let json = get_body_json(response).await;
    assert_eq!(json["error"]["code"], "OAUTH_NOT_CONFIGURED");
    // Short-circuits before any provider traffic
    assert_eq!(ctx.mock.user_calls(), 0);
    assert_eq!(ctx.mock.token_calls(), 0);
}

#[tokio::test]
async fn test_oauth_initiate_placeholder_credentials() {
    let mut config = ServerConfig::default();
    config.oauth.github = OAuthApp {
        client_id: "your-github-client-id".to_string(),
        client_secret: "your-github-client-secret".to_string(),
    };
    let ctx = setup_with(config).await;

    let response = ctx
        .app
        .oneshot(get("/api/v1/auth/oauth/github"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);

    let json = get_body_json(response).await;
    assert_eq!(json["error"]["code"], "OAUTH_NOT_CONFIGURED");
}

#[tokio::test]
async fn test_oauth_initiate_redirects() {
    let config = ServerConfig {
        oauth: configured_oauth(),
        ..Default::default()
    };
    let ctx = setup_with(config).await;

    let response = ctx
        .app
        .oneshot(get(
            "/api/v1/auth/oauth/github?redirect_to=https://app.example.com/done",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(location.contains("/auth/v1/authorize?provider=github"));
    assert!(location.contains("redirect_to=https%3A%2F%2Fapp.example.com%2Fdone"));
}

#[tokio::test]
async fn test_oauth_initiate_unknown_provider() {
    let ctx = setup().await;

    let response = ctx
        .app
        .oneshot(get("/api/v1/auth/oauth/facebook"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_link_provider_requires_auth() {
    let ctx = setup().await;

    let body = serde_json::json!({ "provider": "github" });
    let response = ctx
        .app
        .oneshot(post_json("/api/v1/auth/oauth/link-provider", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_link_provider() {
    let config = ServerConfig {
        oauth: configured_oauth(),
        ..Default::default()
    };
    let ctx = setup_with(config).await;

    let body = serde_json::json!({
        "provider": "google",
        "redirectTo": "https://app.example.com/settings",
    });
    let response = ctx
        .app
        .oneshot(post_json_authed(
            "/api/v1/auth/oauth/link-provider",
            &body,
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["data"]["provider"], "google");
    let url = json["data"]["url"].as_str().unwrap();
    assert!(url.contains("provider=google"));
    assert!(url.contains("redirect_to=https%3A%2F%2Fapp.example.com%2Fsettings"));
}

#[tokio::test]
async fn test_link_provider_unconfigured() {
    let ctx = setup().await;

    let body = serde_json::json!({ "provider": "github" });
    let response = ctx
        .app
        .oneshot(post_json_authed(
            "/api/v1/auth/oauth/link-provider",
            &body,
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

// ========== Admin migrate ==========

fn migrate_request(key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/api/admin/migrate");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_admin_migrate_without_configured_key() {
    let ctx = setup().await;

    let response = ctx
        .app
        .oneshot(migrate_request(Some("anything")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    // Startup ran migrations once; the rejected request must not add a run
    assert_eq!(ctx.db.migration_run_count().unwrap(), 1);
}

#[tokio::test]
async fn test_admin_migrate_wrong_key() {
    let config = ServerConfig {
        admin_api_key: Some("super-secret".to_string()),
        ..Default::default()
    };
    let ctx = setup_with(config).await;

    let response = ctx
        .app
        .oneshot(migrate_request(Some("not-the-key")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.db.migration_run_count().unwrap(), 1);
}

#[tokio::test]
async fn test_admin_migrate_missing_header() {
    let config = ServerConfig {
        admin_api_key: Some("super-secret".to_string()),
        ..Default::default()
    };
    let ctx = setup_with(config).await;

    let response = ctx.app.oneshot(migrate_request(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_migrate_success_runs_exactly_once() {
    let config = ServerConfig {
        admin_api_key: Some("super-secret".to_string()),
        ..Default::default()
    };
    let ctx = setup_with(config).await;

    let response = ctx
        .app
        .oneshot(migrate_request(Some("super-secret")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Migrations completed");
    assert_eq!(json["data"]["migration_runs"], 2);
    assert_eq!(ctx.db.migration_run_count().unwrap(), 2);
}

// ========== Auth middleware ==========

#[tokio::test]
async fn test_protected_route_requires_bearer() {
    let ctx = setup().await;

    let response = ctx.app.oneshot(get("/api/v1/expenses")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = get_body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_protected_route_rejects_bad_token() {
    let ctx = setup().await;

    let response = ctx
        .app
        .oneshot(get_authed("/api/v1/expenses", "garbage-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.mock.user_calls(), 1);
}

#[tokio::test]
async fn test_auth_mirrors_user_locally() {
    let ctx = setup().await;

    let response = ctx
        .app
        .oneshot(get_authed(
            "/api/v1/expenses",
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user = ctx.db.get_user(ALICE).unwrap().unwrap();
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.full_name.as_deref(), Some("Alice Example"));
}

// ========== Expenses ==========

#[tokio::test]
async fn test_expense_crud_flow() {
    let ctx = setup().await;
    let token = MockProviderServer::ACCESS_TOKEN;

    // Create
    let body = serde_json::json!({
        "description": "Groceries",
        "amount": 42.5,
        "expense_date": "2025-08-01",
    });
    let response = ctx
        .app
        .clone()
        .oneshot(post_json_authed("/api/v1/expenses", &body, token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["data"]["description"], "Groceries");
    assert_eq!(json["data"]["amount"], 42.5);
    let id = json["data"]["id"].as_i64().unwrap();

    // Read
    let response = ctx
        .app
        .clone()
        .oneshot(get_authed(&format!("/api/v1/expenses/{}", id), token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Update
    let body = serde_json::json!({ "amount": 50.0 });
    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/v1/expenses/{}", id))
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["data"]["amount"], 50.0);

    // Delete
    let response = ctx
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/expenses/{}", id))
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Gone
    let response = ctx
        .app
        .oneshot(get_authed(&format!("/api/v1/expenses/{}", id), token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expense_create_missing_fields() {
    let ctx = setup().await;

    let response = ctx
        .app
        .oneshot(post_json_authed(
            "/api/v1/expenses",
            &serde_json::json!({}),
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = get_body_json(response).await;
    let details = &json["error"]["details"];
    assert!(details.get("description").is_some());
    assert!(details.get("amount").is_some());
}

#[tokio::test]
async fn test_expense_pagination_has_more() {
    let ctx = setup().await;
    for i in 0..25 {
        ctx.db.create_expense(&alice_expense(i as f64)).unwrap();
    }

    // total=25, limit=10, offset=10 -> more pages remain
    let response = ctx
        .app
        .clone()
        .oneshot(get_authed(
            "/api/v1/expenses?limit=10&offset=10",
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["data"]["total"], 25);
    assert_eq!(json["data"]["has_more"], true);

    // total=25, limit=10, offset=20 -> last page
    let response = ctx
        .app
        .oneshot(get_authed(
            "/api/v1/expenses?limit=10&offset=20",
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["data"]["items"].as_array().unwrap().len(), 5);
    assert_eq!(json["data"]["has_more"], false);
}

#[tokio::test]
async fn test_expense_default_pagination() {
    let ctx = setup().await;
    for i in 0..15 {
        ctx.db.create_expense(&alice_expense(i as f64)).unwrap();
    }

    let response = ctx
        .app
        .oneshot(get_authed(
            "/api/v1/expenses",
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["data"]["limit"], 10);
    assert_eq!(json["data"]["offset"], 0);
    assert_eq!(json["data"]["items"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_expense_sort_by_amount() {
    let ctx = setup().await;
    for amount in [5.0, 50.0, 20.0] {
        ctx.db.create_expense(&alice_expense(amount)).unwrap();
    }

    let response = ctx
        .app
        .oneshot(get_authed(
            "/api/v1/expenses?sort=amount&order=asc",
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let items = json["data"]["items"].as_array().unwrap();
    assert_eq!(items[0]["amount"], 5.0);
    assert_eq!(items[2]["amount"], 50.0);
}

// ========== Categories ==========

#[tokio::test]
async fn test_list_seeded_categories() {
    let ctx = setup().await;

    let response = ctx
        .app
        .oneshot(get_authed(
            "/api/v1/categories?limit=50",
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let items = json["data"]["items"].as_array().unwrap();
    assert!(!items.is_empty());
    assert!(items.iter().all(|c| c["is_system"] == true));
}

#[tokio::test]
async fn test_create_category() {
    let ctx = setup().await;

    let body = serde_json::json!({ "name": "Side projects" });
    let response = ctx
        .app
        .oneshot(post_json_authed(
            "/api/v1/categories",
            &body,
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["data"]["name"], "Side projects");
    assert_eq!(json["data"]["is_system"], false);
    assert_eq!(json["data"]["user_id"], ALICE);
}

// ========== Groups ==========

#[tokio::test]
async fn test_group_create_and_join_flow() {
    let ctx = setup().await;

    // Alice creates a group
    let body = serde_json::json!({ "name": "Ski trip" });
    let response = ctx
        .app
        .clone()
        .oneshot(post_json_authed(
            "/api/v1/groups",
            &body,
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let join_code = json["data"]["join_code"].as_str().unwrap().to_string();
    let group_id = json["data"]["id"].as_i64().unwrap();
    assert_eq!(join_code.len(), 8);

    // Bob joins with the code
    let body = serde_json::json!({ "join_code": join_code });
    let response = ctx
        .app
        .clone()
        .oneshot(post_json_authed(
            "/api/v1/groups/join",
            &body,
            MockProviderServer::SECOND_ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["data"]["member_count"], 2);

    // Joining again is a business error
    let response = ctx
        .app
        .clone()
        .oneshot(post_json_authed(
            "/api/v1/groups/join",
            &body,
            MockProviderServer::SECOND_ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Members listing shows both, with mirrored emails
    let response = ctx
        .app
        .oneshot(get_authed(
            &format!("/api/v1/groups/{}/members", group_id),
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let members = json["data"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.iter().any(|m| m["email"] == "alice@example.com"));
    assert!(members.iter().any(|m| m["role"] == "owner"));
}

#[tokio::test]
async fn test_group_join_unknown_code() {
    let ctx = setup().await;

    let body = serde_json::json!({ "join_code": "NOPE1234" });
    let response = ctx
        .app
        .oneshot(post_json_authed(
            "/api/v1/groups/join",
            &body,
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_group_hidden_from_non_members() {
    let ctx = setup().await;
    let group = ctx.db.create_group("Private", ALICE).unwrap();

    let response = ctx
        .app
        .oneshot(get_authed(
            &format!("/api/v1/groups/{}", group.id),
            MockProviderServer::SECOND_ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_group_balances() {
    let ctx = setup().await;
    let group = ctx.db.create_group("Flat", ALICE).unwrap();
    ctx.db.add_group_member(group.id, BOB).unwrap();

    let mut expense = alice_expense(30.0);
    expense.group_id = Some(group.id);
    ctx.db.create_expense(&expense).unwrap();

    let mut expense = alice_expense(10.0);
    expense.user_id = BOB.to_string();
    expense.group_id = Some(group.id);
    ctx.db.create_expense(&expense).unwrap();

    let response = ctx
        .app
        .oneshot(get_authed(
            &format!("/api/v1/groups/{}/balances", group.id),
            MockProviderServer::ACCESS_TOKEN,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let balances = json["data"].as_array().unwrap();
    let alice = balances.iter().find(|b| b["user_id"] == ALICE).unwrap();
    let bob = balances.iter().find(|b| b["user_id"] == BOB).unwrap();
    assert_eq!(alice["paid"], 30.0);
    assert_eq!(alice["net"], 10.0);
    assert_eq!(bob["net"], -10.0);
}

// ========== Demo endpoints ==========

#[tokio::test]
async fn test_demo_expenses_empty_database() {
    let ctx = setup().await;

    let response = ctx.app.oneshot(get("/api/v1/expenses/test")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_demo_expenses_first_user() {
    let ctx = setup().await;
    ctx.db.upsert_user(ALICE, "alice@example.com", None, true).unwrap();
    ctx.db.create_expense(&alice_expense(12.0)).unwrap();

    let response = ctx.app.oneshot(get("/api/v1/expenses/test")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["data"]["user"]["email"], "alice@example.com");
    assert_eq!(json["data"]["expenses"]["total"], 1);
    assert_eq!(json["message"], "Test endpoint - not for production");
}

#[tokio::test]
async fn test_demo_categories_first_user() {
    let ctx = setup().await;
    ctx.db.upsert_user(ALICE, "alice@example.com", None, true).unwrap();

    let response = ctx
        .app
        .oneshot(get("/api/v1/expenses/test/categories"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert!(!json["data"]["items"].as_array().unwrap().is_empty());
}
