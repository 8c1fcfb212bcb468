//! HTTP client for the prediction and history API.
//!
//! The API owns authentication, classification and storage; this client
//! only shapes requests and maps failures into [`ApiError`].

use crate::models::{RawRecord, RecordId};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors returned by the API client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not logged in; run with --login first")]
    MissingToken,

    #[error("session expired, please log in again")]
    SessionExpired,

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to API at {0}")]
    Connect(String),

    #[error("API error {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Configuration for the API client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl From<&crate::config::ApiSettings> for ApiConfig {
    fn from(config: &crate::config::ApiSettings) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout_seconds: config.timeout_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    password: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct PasswordChangeRequest<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

/// A new account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub profile: Profile,
}

/// Token issued on login.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[allow(dead_code)] // Always "bearer"
    pub token_type: String,
}

/// Profile of the logged-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl Profile {
    /// This profile with the given fields replaced.
    pub fn with_changes(
        &self,
        first_name: Option<&str>,
        last_name: Option<&str>,
        email: Option<&str>,
    ) -> Profile {
        Profile {
            first_name: first_name.unwrap_or(&self.first_name).to_string(),
            last_name: last_name.unwrap_or(&self.last_name).to_string(),
            email: email.unwrap_or(&self.email).to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileUpdateResponse {
    user: Profile,
}

/// Classification result for one uploaded image.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: RecordId,
    pub verdict: String,
    pub probability: f64,
    pub confidence: String,
    #[allow(dead_code)] // Echo of the uploaded name
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Client for the external API.
pub struct ApiClient {
    config: ApiConfig,
    http_client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Full URL for an API path.
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn map_send_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.config.timeout_seconds)
        } else if e.is_connect() {
            ApiError::Connect(self.config.base_url.clone())
        } else {
            ApiError::Request(e)
        }
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::SessionExpired);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            detail: error_detail(&body, status),
        })
    }

    fn require_token(token: &str) -> Result<(), ApiError> {
        if token.is_empty() {
            Err(ApiError::MissingToken)
        } else {
            Ok(())
        }
    }

    /// Exchange credentials for an access token.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        info!("Logging in as {}", username);

        let response = self
            .http_client
            .post(self.endpoint("auth/login"))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// Create an account. The API logs the new user in right away.
    pub async fn register(&self, registration: &Registration) -> Result<TokenResponse, ApiError> {
        info!("Registering {}", registration.username);

        let response = self
            .http_client
            .post(self.endpoint("auth/register"))
            .json(&RegisterRequest {
                username: &registration.username,
                password: &registration.password,
                first_name: &registration.profile.first_name,
                last_name: &registration.profile.last_name,
                email: &registration.profile.email,
            })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// Replace the user's name and email. Returns the profile as stored.
    pub async fn update_profile(&self, token: &str, profile: &Profile) -> Result<Profile, ApiError> {
        Self::require_token(token)?;

        let response = self
            .http_client
            .put(self.endpoint("auth/update-profile"))
            .bearer_auth(token)
            .json(profile)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let body: ProfileUpdateResponse = Self::check(response).await?.json().await?;
        Ok(body.user)
    }

    /// Change the user's password.
    pub async fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        Self::require_token(token)?;

        let response = self
            .http_client
            .put(self.endpoint("auth/change-password"))
            .bearer_auth(token)
            .json(&PasswordChangeRequest {
                current_password,
                new_password,
            })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Self::check(response).await?;
        Ok(())
    }

    /// Fetch the logged-in user's profile.
    pub async fn profile(&self, token: &str) -> Result<Profile, ApiError> {
        Self::require_token(token)?;

        let response = self
            .http_client
            .get(self.endpoint("auth/me"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// Fetch the user's analysis history.
    pub async fn fetch_history(&self, token: &str) -> Result<Vec<RawRecord>, ApiError> {
        Self::require_token(token)?;

        let response = self
            .http_client
            .get(self.endpoint("history/"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let records: Vec<RawRecord> = Self::check(response).await?.json().await?;
        debug!("Fetched {} history records", records.len());
        Ok(records)
    }

    /// Submit one image for classification.
    pub async fn predict(&self, token: &str, image: &Path) -> Result<Prediction, ApiError> {
        Self::require_token(token)?;

        let bytes = tokio::fs::read(image).await.map_err(|source| ApiError::Io {
            path: image.display().to_string(),
            source,
        })?;
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.jpg".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(mime_for(image))?;
        let form = Form::new().part("file", part);

        debug!("Submitting {} for prediction", file_name);

        let response = self
            .http_client
            .post(self.endpoint("predictions/predict"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Ok(Self::check(response).await?.json().await?)
    }
}

/// MIME type from the image extension.
fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Extract the `detail` message from an error body, falling back to the status text.
fn error_detail(body: &str, status: StatusCode) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    }
}
