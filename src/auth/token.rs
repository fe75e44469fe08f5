//! Access token values and token endpoint payloads.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::AuthError;
use crate::secure::SecureString;

/// A bearer token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct AccessToken {
    token: SecureString,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: SecureString, expires_at: DateTime<Utc>) -> Self {
        Self { token, expires_at }
    }

    /// Build from a token endpoint response received just now.
    ///
    /// Fails when `expires_in` does not fit a timestamp.
    pub fn from_response(response: &TokenResponse) -> Result<Self, AuthError> {
        let expires_at = i64::try_from(response.expires_in)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::InvalidResponse(format!(
                    "expires_in out of range: {}",
                    response.expires_in
                ))
            })?;

        Ok(Self::new(response.access_token.clone(), expires_at))
    }

    /// The raw token string, for the `Authorization` header.
    pub fn secret(&self) -> &str {
        self.token.as_str()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True if the token expires within `margin` from now.
    pub fn is_expiring(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }

    /// Remaining lifetime, or `None` once expired.
    pub fn expires_in(&self) -> Option<Duration> {
        let now = Utc::now();
        if self.expires_at > now {
            Some(self.expires_at - now)
        } else {
            None
        }
    }
}

/// Successful token response from the identity provider.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: SecureString,
    #[serde(default)]
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: Option<SecureString>,
    #[serde(default)]
    pub scope: String,
}

/// OAuth error body (`{"error": "...", "error_description": "..."}`).
#[derive(Debug, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl OAuthErrorResponse {
    /// The description if the provider sent one, otherwise the error code.
    pub fn describe(&self) -> String {
        match &self.error_description {
            Some(description) if !description.is_empty() => {
                format!("{}: {}", self.error, description)
            }
            _ => self.error.clone(),
        }
    }
}

/// Format duration as human-readable string (e.g., "45 min", "1 hour").
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes();

    if total_minutes < 1 {
        "< 1 min".to_string()
    } else if total_minutes < 60 {
        format!("{} min", total_minutes)
    } else {
        let hours = total_minutes / 60;
        let mins = total_minutes % 60;
        if mins == 0 {
            format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}
