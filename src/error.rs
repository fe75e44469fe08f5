//! Error types for the graphtutorial application.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::AuthMode;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Graph has not been initialized for {0}")]
    NotInitialized(AuthMode),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to create HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("`{0}` is not configured")]
    Missing(&'static str),

    #[error("`{0}` still has its placeholder value")]
    Placeholder(&'static str),

    #[error("`{key}` is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No configuration has been loaded")]
    NotLoaded,
}

/// Errors talking to the identity provider.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Device code request failed: {0}")]
    DeviceCodeRequestFailed(String),

    #[error("Token request failed: {0}")]
    TokenRequestFailed(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("The user declined the authorization request")]
    AuthorizationDeclined,

    #[error("The device code expired before sign-in completed")]
    DeviceCodeExpired,

    #[error("Invalid response from identity provider: {0}")]
    InvalidResponse(String),
}

/// Microsoft Graph API errors.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Graph API request failed: {0}")]
    RequestFailed(String),

    #[error("Graph API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unauthorized (401): {0}")]
    Unauthorized(String),

    #[error("Forbidden (403): {0}")]
    Forbidden(String),

    #[error("Rate limited (429): {0}")]
    RateLimited(String),

    #[error("Failed to parse API response: {0}")]
    ParseFailed(String),
}

impl AppError {
    /// Returns a short message for the console, printed above the error text.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Config(_) => "Configuration error. Please check oauth.toml.",
            Self::NotInitialized(AuthMode::User) => "Sign in before using this option.",
            Self::NotInitialized(AuthMode::App) => "App-only auth is not set up.",
            Self::Auth(AuthError::AuthorizationDeclined) => "Sign-in was declined.",
            Self::Auth(AuthError::DeviceCodeExpired) => "Sign-in timed out. Please try again.",
            Self::Auth(_) => "Sign-in failed.",
            Self::Api(ApiError::Unauthorized(_)) => "Authentication expired. Sign in again.",
            Self::Api(ApiError::Forbidden(_)) => "Insufficient permissions for this operation.",
            Self::Api(ApiError::RateLimited(_)) => "Too many requests. Please wait a moment.",
            Self::Api(_) => "Microsoft Graph call failed.",
            Self::InvalidInput(_) => "Invalid input.",
            Self::Http(_) => "Network setup failed.",
        }
    }

    /// True when the failure came from a remote call (identity provider or Graph).
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Api(_))
    }
}
