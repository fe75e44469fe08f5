//! Microsoft Graph API client bound to one credential.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::models::{DriveItem, NewDriveItem, Page, User};
use crate::auth::{AccessToken, TokenCredential};
use crate::error::{ApiError, AppError, AuthError};

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Whose drive the drive calls address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveTarget {
    /// `/me/drive`
    Me,
    /// `/users/{id or UPN}/drive`
    User(String),
}

impl DriveTarget {
    fn path(&self) -> String {
        match self {
            Self::Me => "/me/drive".to_string(),
            Self::User(owner) => format!("/users/{}/drive", urlencoding::encode(owner)),
        }
    }
}

/// Microsoft Graph API client.
///
/// Every request carries a bearer token for `scopes` from `credential`.
pub struct GraphClient {
    http_client: reqwest::Client,
    base_url: String,
    credential: Arc<dyn TokenCredential>,
    scopes: Vec<String>,
    drive: DriveTarget,
}

impl GraphClient {
    /// Create a new Graph client.
    pub fn new(
        base_url: &str,
        credential: Arc<dyn TokenCredential>,
        scopes: Vec<String>,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
            scopes,
            drive: DriveTarget::Me,
        })
    }

    /// Address another user's drive instead of `/me/drive`.
    pub fn with_drive(mut self, drive: DriveTarget) -> Self {
        self.drive = drive;
        self
    }

    /// Get a token for this client's scopes.
    pub async fn access_token(&self) -> Result<AccessToken, AuthError> {
        self.credential.get_token(&self.scopes).await
    }

    /// Fetch the signed-in user's profile, limited to `fields`.
    pub async fn get_me(&self, fields: &[&str]) -> Result<User, AppError> {
        let url = format!("{}/me", self.base_url);
        let request = self
            .http_client
            .get(&url)
            .query(&[("$select", fields.join(","))]);
        self.send(request).await
    }

    /// List the children of the drive's root folder (first page only).
    pub async fn list_root_children(&self) -> Result<Page<DriveItem>, AppError> {
        let url = format!("{}{}/root/children", self.base_url, self.drive.path());
        self.send(self.http_client.get(&url)).await
    }

    /// List recently used files (first page only).
    pub async fn list_recent(&self) -> Result<Page<DriveItem>, AppError> {
        let url = format!("{}{}/recent", self.base_url, self.drive.path());
        self.send(self.http_client.get(&url)).await
    }

    /// Create an item in the drive's root folder.
    pub async fn create_root_child(&self, item: &NewDriveItem) -> Result<DriveItem, AppError> {
        let url = format!("{}{}/root/children", self.base_url, self.drive.path());
        self.send(self.http_client.post(&url).json(item)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AppError> {
        let token = self.access_token().await?;

        let response = request
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let status = response.status();
        debug!("Graph {} -> HTTP {}", response.url().path(), status.as_u16());

        if status.is_success() {
            let body = response
                .json()
                .await
                .map_err(|e| ApiError::ParseFailed(e.to_string()))?;
            return Ok(body);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        warn!("Graph request failed: HTTP {} - {}", status.as_u16(), message);

        Err(match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            429 => ApiError::RateLimited(message),
            status => ApiError::Status { status, message },
        }
        .into())
    }
}

/// Graph error envelope: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorResponse>(body) {
        let ErrorBody { code, message } = envelope.error;
        return if message.is_empty() {
            code
        } else {
            format!("{}: {}", code, message)
        };
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        body.to_string()
    }
}
