//! Tally Web Server
//!
//! Axum-based REST API for the Tally expense-tracking backend.
//!
//! Request handling is thin glue: handlers validate input, delegate to the
//! external identity provider or the SQLite layer, and wrap the result in a
//! uniform JSON envelope `{success, data|error, message?}`.
//!
//! Security features:
//! - Bearer sessions validated against the identity provider on every request
//! - Constant-time admin API key comparison, no default key
//! - Restrictive CORS policy and security headers
//! - Input validation with field-level error maps
//! - Sanitized error responses (internals are logged, never returned)

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use tally_core::db::Database;
use tally_core::provider::AuthProvider;

mod handlers;
mod validate;

/// Default pagination limit
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Header carrying the admin API key
pub const ADMIN_KEY_HEADER: &str = "x-api-key";

/// Environment variable for the admin API key (no default; unset disables
/// the admin surface entirely)
pub const ADMIN_KEY_ENV: &str = "TALLY_ADMIN_API_KEY";

/// OAuth application credentials for one provider
#[derive(Clone, Default)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthApp {
    /// Whether this app was ever truly set up
    ///
    /// Deployment templates ship placeholder values; treating those as
    /// configured would redirect users into a broken OAuth dance, so the
    /// initiate endpoint short-circuits with 501 instead.
    pub fn is_configured(&self) -> bool {
        !is_placeholder(&self.client_id) && !is_placeholder(&self.client_secret)
    }
}

fn is_placeholder(value: &str) -> bool {
    value.is_empty() || value.starts_with("your-") || value == "changeme"
}

/// OAuth provider configuration
#[derive(Clone, Default)]
pub struct OAuthConfig {
    pub github: OAuthApp,
    pub google: OAuthApp,
}

impl OAuthConfig {
    /// Look up a provider by its URL segment name
    pub fn app(&self, provider: &str) -> Option<&OAuthApp> {
        match provider {
            "github" => Some(&self.github),
            "google" => Some(&self.google),
            _ => None,
        }
    }

    /// Providers this deployment knows about, with their enabled state
    pub fn providers(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("github", self.github.is_configured()),
            ("google", self.google.is_configured()),
        ]
    }

    pub fn from_env() -> Self {
        let env = |name: &str| std::env::var(name).unwrap_or_default();
        Self {
            github: OAuthApp {
                client_id: env("GITHUB_CLIENT_ID"),
                client_secret: env("GITHUB_CLIENT_SECRET"),
            },
            google: OAuthApp {
                client_id: env("GOOGLE_CLIENT_ID"),
                client_secret: env("GOOGLE_CLIENT_SECRET"),
            },
        }
    }
}

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Admin API key for the migration endpoint. None means the endpoint
    /// always answers 401 - there is deliberately no fallback value.
    pub admin_api_key: Option<String>,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// OAuth provider credentials
    pub oauth: OAuthConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let admin_api_key = std::env::var(ADMIN_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty());
        if admin_api_key.is_none() {
            warn!(
                "{} not set - the admin migration endpoint will reject all requests",
                ADMIN_KEY_ENV
            );
        }

        let allowed_origins = std::env::var("TALLY_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            admin_api_key,
            allowed_origins,
            oauth: OAuthConfig::from_env(),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub provider: AuthProvider,
    pub config: ServerConfig,
}

/// The authenticated caller, injected into request extensions by the
/// bearer middleware
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub access_token: String,
}

/// Authentication middleware for bearer-protected routes
///
/// Extracts the bearer token, asks the identity provider who it belongs to,
/// and mirrors the user locally so group membership and demo lookups have a
/// row to reference. Validation is entirely the provider's job; this service
/// performs no token cryptography of its own.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|t| t.to_string());

    let Some(token) = token else {
        warn!(path = %request.uri().path(), "Unauthorized request - missing bearer token");
        return AppError::unauthorized("Authentication required").into_response();
    };

    match state.provider.get_user(&token).await {
        Ok(user) => {
            if let Err(e) = state.db.upsert_user(
                &user.id,
                &user.email,
                user.full_name().as_deref(),
                user.is_confirmed(),
            ) {
                warn!(error = %e, "Failed to mirror provider user");
            }
            info!(user = %user.email, path = %request.uri().path(), "Authenticated via provider session");
            request.extensions_mut().insert(CurrentUser {
                id: user.id,
                email: user.email,
                access_token: token,
            });
            next.run(request).await
        }
        Err(e) => {
            warn!(error = %e, path = %request.uri().path(), "Invalid bearer token");
            AppError::unauthorized("Invalid or expired session").into_response()
        }
    }
}

/// Validate the admin API key using constant-time comparison to prevent
/// timing attacks. An unconfigured key never matches.
fn validate_admin_key(provided: &str, configured: Option<&str>) -> bool {
    use subtle::ConstantTimeEq;

    let Some(key) = configured else {
        return false;
    };

    let provided_bytes = provided.as_bytes();
    let key_bytes = key.as_bytes();
    // Only compare if lengths match (constant-time for same-length keys)
    provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
}

// ============================================================================
// JSON envelope
// ============================================================================

/// Success envelope wrapping every 2xx JSON response
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: None,
        })
    }

    pub fn ok_with_message(data: T, message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: Some(message.to_string()),
        })
    }
}

/// A page of results
#[derive(Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, total: i64, limit: i64, offset: i64) -> Self {
        Self {
            items,
            total,
            limit,
            offset,
            has_more: total > offset + limit,
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
///
/// Every handler failure funnels through here; the response body is always
/// the error envelope and internals never leak past `message`.
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<BTreeMap<String, String>>,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: msg.to_string(),
            details: None,
            internal: None,
        }
    }

    /// Field-level validation failure (400 with a `details` map)
    pub fn validation(details: BTreeMap<String, String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR",
            message: "Request validation failed".to_string(),
            details: Some(details),
            internal: None,
        }
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "UNAUTHORIZED",
            message: msg.to_string(),
            details: None,
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: msg.to_string(),
            details: None,
            internal: None,
        }
    }

    /// OAuth provider credentials are placeholders or absent
    pub fn oauth_not_configured(provider: &str) -> Self {
        Self {
            status: StatusCode::NOT_IMPLEMENTED,
            code: "OAUTH_NOT_CONFIGURED",
            message: format!("OAuth provider '{}' is not configured", provider),
            details: None,
            internal: None,
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL",
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            details: None,
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let mut error_body = serde_json::json!({
            "code": self.code,
            "message": self.message,
        });
        if let Some(details) = &self.details {
            error_body["details"] = serde_json::json!(details);
        }

        let body = Json(serde_json::json!({
            "success": false,
            "error": error_body,
        }));

        (self.status, body).into_response()
    }
}

impl From<tally_core::Error> for AppError {
    fn from(err: tally_core::Error) -> Self {
        use tally_core::Error;
        match err {
            Error::NotFound(msg) => Self::not_found(&msg),
            Error::InvalidData(msg) => Self::bad_request(&msg),
            // Provider rejections of credentials or tokens surface as 401;
            // 422 is the provider's business-rule rejection (e.g. duplicate
            // signup) and maps to a 400
            Error::Provider { status, message } if status == 422 => Self::bad_request(&message),
            Error::Provider { status, message } if (400..500).contains(&status) => Self {
                status: StatusCode::UNAUTHORIZED,
                code: "INVALID_CREDENTIALS",
                message,
                details: None,
                internal: None,
            },
            other => Self::internal(other.into()),
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the application router
pub fn create_router(db: Database, provider: AuthProvider, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        db,
        provider,
        config: config.clone(),
    });

    let public_routes = Router::new()
        // Liveness probe
        .route("/api/v1/test", get(handlers::liveness))
        // Auth
        .route("/api/v1/auth/signup", post(handlers::signup))
        .route("/api/v1/auth/signin", post(handlers::signin))
        .route("/api/v1/auth/refresh", post(handlers::refresh))
        // OAuth
        .route("/api/v1/auth/oauth", get(handlers::list_oauth_providers))
        .route("/api/v1/auth/oauth/:provider", get(handlers::oauth_initiate))
        // Unauthenticated demo lookups - not for production
        .route("/api/v1/expenses/test", get(handlers::test_expenses))
        .route(
            "/api/v1/expenses/test/categories",
            get(handlers::test_categories),
        )
        // Admin (does its own API key check)
        .route("/api/admin/migrate", post(handlers::run_migrations));

    let protected_routes = Router::new()
        // OAuth provider linking (needs an authenticated session)
        .route(
            "/api/v1/auth/oauth/link-provider",
            post(handlers::link_provider),
        )
        // Expenses
        .route(
            "/api/v1/expenses",
            get(handlers::list_expenses).post(handlers::create_expense),
        )
        .route(
            "/api/v1/expenses/:id",
            get(handlers::get_expense)
                .put(handlers::update_expense)
                .delete(handlers::delete_expense),
        )
        // Categories
        .route(
            "/api/v1/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        // Groups
        .route(
            "/api/v1/groups",
            get(handlers::list_groups).post(handlers::create_group),
        )
        .route("/api/v1/groups/join", post(handlers::join_group))
        .route("/api/v1/groups/:id", get(handlers::get_group))
        .route("/api/v1/groups/:id/members", get(handlers::list_group_members))
        .route(
            "/api/v1/groups/:id/balances",
            get(handlers::get_group_balances),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(
    db: Database,
    provider: AuthProvider,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let app = create_router(db, provider, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests;
