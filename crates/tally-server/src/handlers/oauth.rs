//! OAuth handlers: provider listing, sign-in initiation, identity linking
//!
//! The identity provider runs the actual OAuth dance; these handlers only
//! build redirect URLs. A provider whose credentials are placeholders
//! short-circuits with 501 before anything leaves this process.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    response::Redirect,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::validate::check;
use crate::{ApiResponse, AppError, AppState, CurrentUser};

/// One entry in the provider listing
#[derive(Serialize)]
pub struct OAuthProviderInfo {
    pub name: &'static str,
    pub enabled: bool,
}

/// GET /api/v1/auth/oauth - List known OAuth providers and their state
pub async fn list_oauth_providers(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<OAuthProviderInfo>>> {
    let providers = state
        .config
        .oauth
        .providers()
        .into_iter()
        .map(|(name, enabled)| OAuthProviderInfo { name, enabled })
        .collect();
    ApiResponse::ok(providers)
}

/// Query parameters for OAuth initiation
#[derive(Debug, Deserialize)]
pub struct OAuthInitiateQuery {
    /// Where the provider should send the browser after the dance
    pub redirect_to: Option<String>,
}

/// GET /api/v1/auth/oauth/:provider - Redirect the browser into an OAuth sign-in
pub async fn oauth_initiate(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthInitiateQuery>,
) -> Result<Redirect, AppError> {
    let app = state
        .config
        .oauth
        .app(&provider)
        .ok_or_else(|| AppError::not_found(&format!("Unknown OAuth provider '{}'", provider)))?;

    if !app.is_configured() {
        return Err(AppError::oauth_not_configured(&provider));
    }

    let url = state
        .provider
        .authorize_url(&provider, query.redirect_to.as_deref());
    info!(provider = %provider, "OAuth sign-in initiated");
    Ok(Redirect::temporary(&url))
}

/// Request body for POST /api/v1/auth/oauth/link-provider
#[derive(Debug, Deserialize, Validate)]
pub struct LinkProviderRequest {
    #[validate(required(message = "provider is required"))]
    pub provider: Option<String>,
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

/// Response body for the link-provider endpoint
#[derive(Serialize)]
pub struct LinkProviderResponse {
    pub url: String,
    pub provider: String,
}

/// POST /api/v1/auth/oauth/link-provider - Attach an OAuth identity to the
/// signed-in user
pub async fn link_provider(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    request: Request,
) -> Result<Json<ApiResponse<LinkProviderResponse>>, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: LinkProviderRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;
    check(&req)?;

    let provider = req.provider.as_deref().unwrap_or_default();
    let app = state
        .config
        .oauth
        .app(provider)
        .ok_or_else(|| AppError::not_found(&format!("Unknown OAuth provider '{}'", provider)))?;
    if !app.is_configured() {
        return Err(AppError::oauth_not_configured(provider));
    }

    let url = state.provider.link_identity_url(
        &user.access_token,
        provider,
        req.redirect_to.as_deref(),
    );
    info!(user = %user.email, provider = %provider, "OAuth identity link initiated");

    Ok(ApiResponse::ok(LinkProviderResponse {
        url,
        provider: provider.to_string(),
    }))
}
