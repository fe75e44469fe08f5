//! In-memory token cache used by the credentials.

use chrono::Duration;

use super::token::{AccessToken, TokenResponse};
use crate::error::AuthError;
use crate::secure::SecureString;

/// Last issued token with the scopes it was requested for.
#[derive(Debug, Clone)]
struct CachedToken {
    token: AccessToken,
    refresh_token: Option<SecureString>,
    scopes: Vec<String>,
}

/// Holds at most one token per credential.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    cached: Option<CachedToken>,
}

impl TokenCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached token if it was issued for `scopes` and is not within `margin` of expiry.
    pub fn get(&self, scopes: &[String], margin: Duration) -> Option<AccessToken> {
        self.cached.as_ref().and_then(|cached| {
            if cached.scopes == scopes && !cached.token.is_expiring(margin) {
                Some(cached.token.clone())
            } else {
                None
            }
        })
    }

    /// Refresh token from the last response, if the provider issued one.
    pub fn refresh_token(&self) -> Option<SecureString> {
        self.cached.as_ref().and_then(|c| c.refresh_token.clone())
    }

    /// Store a token response, keeping the previous refresh token when none was returned.
    ///
    /// A response with an unusable lifetime leaves the cache unchanged.
    pub fn store(&mut self, scopes: &[String], response: TokenResponse) -> Result<AccessToken, AuthError> {
        let token = AccessToken::from_response(&response)?;
        let refresh_token = response.refresh_token.or_else(|| self.refresh_token());

        self.cached = Some(CachedToken {
            token: token.clone(),
            refresh_token,
            scopes: scopes.to_vec(),
        });

        Ok(token)
    }

    /// Invalidate the cache.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
