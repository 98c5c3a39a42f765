//! Identity-provider client (the auth delegate)
//!
//! HTTP client for the external authentication-as-a-service provider. All
//! session and credential handling is the provider's job; this client forwards
//! requests and reshapes responses. No cryptographic work happens here.
//!
//! # Configuration
//!
//! Environment variables:
//! - `TALLY_AUTH_URL`: Provider base URL (required)
//! - `TALLY_AUTH_KEY`: Public API key sent as the `apikey` header (required)

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable for the provider base URL
pub const AUTH_URL_ENV: &str = "TALLY_AUTH_URL";

/// Environment variable for the provider public API key
pub const AUTH_KEY_ENV: &str = "TALLY_AUTH_KEY";

/// A session issued by the identity provider
///
/// Tokens are opaque strings; expiry and validation semantics live entirely
/// with the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: String,
    pub user: ProviderUser,
}

/// A user record as the provider shapes it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl ProviderUser {
    /// Display name from the provider's free-form metadata, if present
    pub fn full_name(&self) -> Option<String> {
        self.user_metadata
            .get("full_name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// Error body shapes the provider returns on non-2xx responses
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the external identity provider
#[derive(Clone)]
pub struct AuthProvider {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl AuthProvider {
    /// Create a new provider client
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Create from environment variables
    ///
    /// Returns an error rather than None: the server cannot run without a
    /// provider, unlike optional integrations.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(AUTH_URL_ENV)
            .map_err(|_| Error::Config(format!("{} is not set", AUTH_URL_ENV)))?;
        let api_key = std::env::var(AUTH_KEY_ENV)
            .map_err(|_| Error::Config(format!("{} is not set", AUTH_KEY_ENV)))?;
        Ok(Self::new(&base_url, &api_key))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register a new user with email and password
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<Session> {
        let mut body = json!({
            "email": email,
            "password": password,
        });
        if let Some(name) = full_name {
            body["data"] = json!({ "full_name": name });
        }

        let response = self
            .http_client
            .post(format!("{}/auth/v1/signup", self.base_url))
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;

        self.parse_session(response).await
    }

    /// Exchange email/password credentials for a session
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .http_client
            .post(format!(
                "{}/auth/v1/token?grant_type=password",
                self.base_url
            ))
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        self.parse_session(response).await
    }

    /// Exchange a refresh token for a fresh session
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let response = self
            .http_client
            .post(format!(
                "{}/auth/v1/token?grant_type=refresh_token",
                self.base_url
            ))
            .header("apikey", &self.api_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        self.parse_session(response).await
    }

    /// Validate an access token and return the user it belongs to
    pub async fn get_user(&self, access_token: &str) -> Result<ProviderUser> {
        let response = self
            .http_client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        Ok(response.json::<ProviderUser>().await?)
    }

    /// Build the authorize URL that starts an OAuth sign-in with `provider`
    ///
    /// Pure string construction; the provider handles the OAuth dance once the
    /// browser follows the redirect.
    pub fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> String {
        let mut url = format!("{}/auth/v1/authorize?provider={}", self.base_url, provider);
        if let Some(target) = redirect_to {
            url.push_str("&redirect_to=");
            url.push_str(&urlencoding::encode(target));
        }
        url
    }

    /// Build the authorize URL that links `provider` to an existing account
    ///
    /// The caller's session token rides along so the provider attaches the
    /// new identity to the signed-in user instead of creating a fresh one.
    pub fn link_identity_url(
        &self,
        access_token: &str,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> String {
        let mut url = format!(
            "{}/auth/v1/authorize?provider={}&skip_http_redirect=false&access_token={}",
            self.base_url,
            provider,
            urlencoding::encode(access_token)
        );
        if let Some(target) = redirect_to {
            url.push_str("&redirect_to=");
            url.push_str(&urlencoding::encode(target));
        }
        url
    }

    async fn parse_session(&self, response: reqwest::Response) -> Result<Session> {
        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }
        debug!("Provider session response received");
        Ok(response.json::<Session>().await?)
    }

    /// Translate a non-2xx provider response into `Error::Provider`
    async fn provider_error(response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let message = match response.json::<ProviderErrorBody>().await {
            Ok(body) => body
                .error_description
                .or(body.msg)
                .or(body.error)
                .unwrap_or_else(|| "Unknown provider error".to_string()),
            Err(_) => "Unknown provider error".to_string(),
        };
        Error::Provider { status, message }
    }
}
