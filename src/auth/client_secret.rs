//! Client-secret credential for app-only auth (OAuth 2.0 client credentials grant).

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use super::cache::TokenCache;
use super::credential::{build_http_client, request_token, TokenCredential, TokenOutcome};
use super::token::AccessToken;
use crate::config::{AppAuthSettings, Config};
use crate::error::AuthError;
use crate::secure::SecureString;

/// Credential for the application itself, authenticated with a client secret.
pub struct ClientSecretCredential {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: SecureString,
    token_url: String,
    refresh_margin: chrono::Duration,
    cache: Mutex<TokenCache>,
}

impl ClientSecretCredential {
    pub fn new(config: &Config, settings: AppAuthSettings) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: build_http_client()?,
            token_url: config.token_url(&settings.tenant),
            client_id: settings.client_id,
            client_secret: settings.client_secret,
            refresh_margin: chrono::Duration::seconds(
                config.token.refresh_before_expiry_seconds as i64,
            ),
            cache: Mutex::new(TokenCache::new()),
        })
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, AuthError> {
        let mut cache = self.cache.lock().await;

        if let Some(token) = cache.get(scopes, self.refresh_margin) {
            return Ok(token);
        }

        let scope = scopes.join(" ");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", scope.as_str()),
        ];

        match request_token(&self.http_client, &self.token_url, &params).await? {
            TokenOutcome::Issued(response) => {
                info!("Acquired app-only token");
                cache.store(scopes, response)
            }
            TokenOutcome::Rejected(error) => Err(AuthError::TokenRequestFailed(error.describe())),
        }
    }
}
