//! Device-code credential (OAuth 2.0 Device Authorization Grant, RFC 8628).
//!
//! The first token request asks the identity provider for a device code,
//! hands the sign-in instructions to the challenge callback and polls the
//! token endpoint until the user finishes signing in. Later requests are
//! served from the cache or the refresh token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::cache::TokenCache;
use super::credential::{build_http_client, request_token, TokenCredential, TokenOutcome};
use super::token::{AccessToken, TokenResponse};
use crate::config::Config;
use crate::error::AuthError;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Seconds added to the polling interval on `slow_down`.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Callback that shows the sign-in instructions to the user.
pub type ChallengeCallback = Arc<dyn Fn(&DeviceCodeInfo) + Send + Sync>;

/// Device authorization response.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeInfo {
    pub user_code: String,
    pub device_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    message: String,
}

fn default_interval() -> u64 {
    5
}

impl DeviceCodeInfo {
    /// Human-readable sign-in instruction, as worded by the identity provider.
    pub fn message(&self) -> String {
        if self.message.is_empty() {
            format!(
                "To sign in, use a web browser to open the page {} and enter the code {} to authenticate.",
                self.verification_uri, self.user_code
            )
        } else {
            self.message.clone()
        }
    }
}

/// Credential for a user signing in through the device-code flow.
pub struct DeviceCodeCredential {
    http_client: reqwest::Client,
    client_id: String,
    device_code_url: String,
    token_url: String,
    refresh_margin: chrono::Duration,
    on_challenge: ChallengeCallback,
    cache: Mutex<TokenCache>,
}

impl DeviceCodeCredential {
    /// Create a credential for the configured client and sign-in tenant.
    pub fn new(config: &Config, on_challenge: ChallengeCallback) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: build_http_client()?,
            client_id: config.app.client_id.clone(),
            device_code_url: config.device_code_url(&config.app.auth_tenant),
            token_url: config.token_url(&config.app.auth_tenant),
            refresh_margin: chrono::Duration::seconds(
                config.token.refresh_before_expiry_seconds as i64,
            ),
            on_challenge,
            cache: Mutex::new(TokenCache::new()),
        })
    }

    /// Run one full device-code round for `scopes`.
    pub async fn authenticate(&self, scopes: &[String]) -> Result<TokenResponse, AuthError> {
        let info = self.request_device_code(&scopes.join(" ")).await?;
        (self.on_challenge)(&info);
        self.poll_for_token(&info).await
    }

    async fn request_device_code(&self, scope: &str) -> Result<DeviceCodeInfo, AuthError> {
        let params = [("client_id", self.client_id.as_str()), ("scope", scope)];

        let response = self
            .http_client
            .post(&self.device_code_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::DeviceCodeRequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!("Device code request failed: HTTP {} - {}", status, error_body);
            return Err(AuthError::DeviceCodeRequestFailed(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }

        let info: DeviceCodeInfo = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        debug!(
            "Device code issued, expires in {}s, polling every {}s",
            info.expires_in, info.interval
        );
        Ok(info)
    }

    /// Poll the token endpoint until the user completes sign-in or the code expires.
    async fn poll_for_token(&self, info: &DeviceCodeInfo) -> Result<TokenResponse, AuthError> {
        let deadline = Instant::now()
            .checked_add(Duration::from_secs(info.expires_in))
            .ok_or_else(|| {
                AuthError::InvalidResponse(format!("expires_in out of range: {}", info.expires_in))
            })?;
        let mut interval = Duration::from_secs(info.interval);

        let params = [
            ("grant_type", DEVICE_CODE_GRANT),
            ("client_id", self.client_id.as_str()),
            ("device_code", info.device_code.as_str()),
        ];

        loop {
            time::sleep(interval).await;

            if Instant::now() >= deadline {
                return Err(AuthError::DeviceCodeExpired);
            }

            match request_token(&self.http_client, &self.token_url, &params).await? {
                TokenOutcome::Issued(response) => {
                    info!("Device code sign-in completed");
                    return Ok(response);
                }
                TokenOutcome::Rejected(error) => match error.error.as_str() {
                    "authorization_pending" => continue,
                    "slow_down" => {
                        interval += SLOW_DOWN_STEP;
                        debug!("Asked to slow down, polling every {:?}", interval);
                    }
                    "authorization_declined" | "access_denied" => {
                        return Err(AuthError::AuthorizationDeclined);
                    }
                    "expired_token" | "code_expired" => return Err(AuthError::DeviceCodeExpired),
                    _ => return Err(AuthError::TokenRequestFailed(error.describe())),
                },
            }
        }
    }

    /// Redeem a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str, scopes: &[String]) -> Result<TokenResponse, AuthError> {
        let scope = scopes.join(" ");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ];

        match request_token(&self.http_client, &self.token_url, &params).await {
            Ok(TokenOutcome::Issued(response)) => Ok(response),
            Ok(TokenOutcome::Rejected(error)) => Err(AuthError::TokenRefreshFailed(error.describe())),
            Err(e) => Err(AuthError::TokenRefreshFailed(e.to_string())),
        }
    }
}

#[async_trait]
impl TokenCredential for DeviceCodeCredential {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, AuthError> {
        // Held across the network calls so concurrent callers share one sign-in
        let mut cache = self.cache.lock().await;

        if let Some(token) = cache.get(scopes, self.refresh_margin) {
            return Ok(token);
        }

        if let Some(refresh_token) = cache.refresh_token() {
            match self.refresh(refresh_token.as_str(), scopes).await {
                Ok(response) => {
                    info!("Access token refreshed");
                    return cache.store(scopes, response);
                }
                Err(e) => {
                    warn!("{}, signing in again", e);
                    cache.invalidate();
                }
            }
        }

        let response = self.authenticate(scopes).await?;
        cache.store(scopes, response)
    }
}
