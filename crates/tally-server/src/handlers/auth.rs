//! Authentication handlers: signup, signin, refresh
//!
//! All credential and token handling is delegated to the external identity
//! provider; these handlers validate request shapes and reshape provider
//! responses into the JSON envelope.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::validate::{check, error_details};
use crate::{ApiResponse, AppError, AppState};
use tally_core::provider::Session;

/// Request body for POST /api/v1/auth/signup
///
/// Required fields are Options so a missing field surfaces as a field-level
/// validation error rather than a parse failure.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(
        required(message = "email is required"),
        email(message = "invalid email address")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "password is required"),
        length(min = 8, message = "password must be at least 8 characters")
    )]
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub confirm_password: Option<String>,
}

/// POST /api/v1/auth/signup - Register a new user with the identity provider
pub async fn signup(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ApiResponse<Session>>, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: SignupRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;

    // Field rules plus the cross-field password confirmation check, all
    // before any provider traffic
    let mut details = match req.validate() {
        Ok(()) => Default::default(),
        Err(errors) => error_details(&errors),
    };
    if let (Some(password), Some(confirm)) = (&req.password, &req.confirm_password) {
        if password != confirm {
            details.insert(
                "confirm_password".to_string(),
                "password confirmation does not match".to_string(),
            );
        }
    }
    if !details.is_empty() {
        return Err(AppError::validation(details));
    }

    let email = req.email.as_deref().unwrap_or_default();
    let password = req.password.as_deref().unwrap_or_default();
    let session = state
        .provider
        .sign_up(email, password, req.full_name.as_deref())
        .await?;

    Ok(ApiResponse::ok(session))
}

/// Request body for POST /api/v1/auth/signin
#[derive(Debug, Deserialize, Validate)]
pub struct SigninRequest {
    #[validate(
        required(message = "email is required"),
        email(message = "invalid email address")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "password is required"),
        length(min = 1, message = "password is required")
    )]
    pub password: Option<String>,
}

/// POST /api/v1/auth/signin - Exchange credentials for a session
pub async fn signin(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ApiResponse<Session>>, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: SigninRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;
    check(&req)?;

    let session = state
        .provider
        .sign_in(
            req.email.as_deref().unwrap_or_default(),
            req.password.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(ApiResponse::ok(session))
}

/// Request body for POST /api/v1/auth/refresh
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(
        required(message = "refresh_token is required"),
        length(min = 1, message = "refresh_token is required")
    )]
    pub refresh_token: Option<String>,
}

/// POST /api/v1/auth/refresh - Exchange a refresh token for a fresh session
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ApiResponse<Session>>, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: RefreshRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;
    check(&req)?;

    let session = state
        .provider
        .refresh(req.refresh_token.as_deref().unwrap_or_default())
        .await?;

    Ok(ApiResponse::ok(session))
}
