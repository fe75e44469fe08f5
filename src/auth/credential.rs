//! The token credential abstraction and the shared token endpoint call.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::token::{AccessToken, OAuthErrorResponse, TokenResponse};
use crate::error::AuthError;

/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can mint bearer tokens for a set of scopes.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Get a currently valid token for `scopes`, from cache or from the provider.
    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, AuthError>;
}

/// Outcome of a call to the token endpoint.
#[derive(Debug)]
pub enum TokenOutcome {
    Issued(TokenResponse),
    Rejected(OAuthErrorResponse),
}

/// Create the HTTP client used to talk to the identity provider.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

/// POST a form to the token endpoint.
///
/// OAuth error bodies come back as [`TokenOutcome::Rejected`] so callers can
/// react to codes like `authorization_pending`.
pub async fn request_token(
    http_client: &reqwest::Client,
    token_url: &str,
    params: &[(&str, &str)],
) -> Result<TokenOutcome, AuthError> {
    let response = http_client
        .post(token_url)
        .form(params)
        .send()
        .await
        .map_err(|e| AuthError::TokenRequestFailed(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        debug!(
            "Token issued ({} token, scopes: {})",
            token_response.token_type, token_response.scope
        );
        return Ok(TokenOutcome::Issued(token_response));
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<OAuthErrorResponse>(&body) {
        Ok(error) => {
            debug!("Token endpoint returned HTTP {}: {}", status, error.error);
            Ok(TokenOutcome::Rejected(error))
        }
        Err(_) => {
            tracing::error!("Token request failed: HTTP {} - {}", status, body);
            Err(AuthError::TokenRequestFailed(format!(
                "HTTP {}",
                status.as_u16()
            )))
        }
    }
}
