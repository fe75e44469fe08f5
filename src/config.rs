//! Configuration loading and management.
//!
//! Loads the embedded config.toml, overlays an optional `oauth.toml` and then
//! applies environment variable overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::ConfigError;
use crate::secure::SecureString;

/// Embedded configuration file content.
const CONFIG_TOML: &str = include_str!("../config.toml");

/// Name of the user configuration file.
const USER_CONFIG_FILE: &str = "oauth.toml";

const PLACEHOLDER_CLIENT_ID: &str = "YOUR_CLIENT_ID";
const PLACEHOLDER_TENANT_ID: &str = "YOUR_TENANT_ID";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub api: ApiConfig,
    pub token: TokenConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub client_id: String,
    /// Tenant used for the device-code sign-in (`common`, `organizations` or a tenant id).
    pub auth_tenant: String,
    /// Tenant used for app-only auth. Falls back to `auth_tenant`.
    pub tenant_id: Option<String>,
    /// Comma-separated list of delegated scopes.
    pub graph_user_scopes: String,
    pub client_secret: Option<SecureString>,
    /// User id or UPN whose drive app-only calls target instead of `/me`.
    pub drive_owner: Option<String>,
    pub open_browser: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub graph_base_url: String,
    pub authority_host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            graph_base_url: "https://graph.microsoft.com/v1.0".into(),
            authority_host: "https://login.microsoftonline.com".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub refresh_before_expiry_seconds: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_before_expiry_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

/// Settings needed to build the client-secret credential.
#[derive(Debug, Clone)]
pub struct AppAuthSettings {
    pub client_id: String,
    pub tenant: String,
    pub client_secret: SecureString,
}

impl Config {
    /// Load configuration from the embedded defaults, the user file and the environment.
    ///
    /// `explicit` must exist when given. Without it `./oauth.toml` and then the
    /// platform config directory are tried.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let overlay = match find_config_file(explicit)? {
            Some(path) => {
                debug!("Reading configuration from {:?}", path);
                let content = fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path, source })?;
                Some(content)
            }
            None => None,
        };

        let mut config = Self::parse(overlay.as_deref())?;
        config.apply_overrides(|key| env::var(key).ok());

        // Validate required fields
        config.validate_user_auth()?;

        Ok(config)
    }

    /// Parse the embedded defaults with `overlay` merged on top.
    pub fn parse(overlay: Option<&str>) -> Result<Self, ConfigError> {
        let mut table: toml::Table = toml::from_str(CONFIG_TOML)?;
        if let Some(overlay) = overlay {
            merge_tables(&mut table, toml::from_str(overlay)?);
        }
        Ok(toml::Value::Table(table).try_into()?)
    }

    /// Apply environment variable overrides using `lookup` to read variables.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(client_id) = lookup("AZURE_CLIENT_ID") {
            self.app.client_id = client_id;
        }

        if let Some(tenant) = lookup("AZURE_AUTH_TENANT") {
            self.app.auth_tenant = tenant;
        }

        if let Some(tenant_id) = lookup("AZURE_TENANT_ID") {
            self.app.tenant_id = Some(tenant_id);
        }

        if let Some(secret) = lookup("AZURE_CLIENT_SECRET") {
            self.app.client_secret = Some(SecureString::from(secret));
        }

        if let Some(scopes) = lookup("GRAPH_USER_SCOPES") {
            self.app.graph_user_scopes = scopes;
        }

        if let Some(owner) = lookup("GRAPH_DRIVE_OWNER") {
            self.app.drive_owner = Some(owner);
        }

        if let Some(url) = lookup("GRAPH_BASE_URL") {
            self.api.graph_base_url = url;
        }

        if let Some(host) = lookup("AZURE_AUTHORITY_HOST") {
            self.api.authority_host = host;
        }

        if let Some(log_level) = lookup("RUST_LOG") {
            self.logging.level = log_level;
        }
    }

    /// Delegated scopes in configured order, trimmed, with empty entries dropped.
    pub fn scopes(&self) -> Vec<String> {
        self.app
            .graph_user_scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    /// Validate the settings the device-code sign-in needs.
    pub fn validate_user_auth(&self) -> Result<(), ConfigError> {
        if self.app.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("app.client_id"));
        }
        if self.app.client_id == PLACEHOLDER_CLIENT_ID {
            return Err(ConfigError::Placeholder("app.client_id"));
        }
        if self.app.auth_tenant.trim().is_empty() {
            return Err(ConfigError::Missing("app.auth_tenant"));
        }
        if self.scopes().is_empty() {
            return Err(ConfigError::Missing("app.graph_user_scopes"));
        }

        check_url("api.authority_host", &self.api.authority_host)?;
        check_url("api.graph_base_url", &self.api.graph_base_url)?;

        Ok(())
    }

    /// Settings for app-only auth, validated.
    pub fn app_auth(&self) -> Result<AppAuthSettings, ConfigError> {
        if self.app.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("app.client_id"));
        }

        let tenant = match non_empty(self.app.tenant_id.as_deref()) {
            Some(tenant) if tenant == PLACEHOLDER_TENANT_ID => {
                return Err(ConfigError::Placeholder("app.tenant_id"));
            }
            Some(tenant) => tenant.to_string(),
            None if !self.app.auth_tenant.trim().is_empty() => self.app.auth_tenant.clone(),
            None => return Err(ConfigError::Missing("app.tenant_id")),
        };

        let client_secret = self
            .app
            .client_secret
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("app.client_secret"))?;

        Ok(AppAuthSettings {
            client_id: self.app.client_id.clone(),
            tenant,
            client_secret,
        })
    }

    /// User id or UPN whose drive app-only calls target, if configured.
    pub fn drive_owner(&self) -> Option<&str> {
        non_empty(self.app.drive_owner.as_deref())
    }

    /// Get the device authorization URL for a tenant.
    pub fn device_code_url(&self, tenant: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/devicecode",
            self.api.authority_host.trim_end_matches('/'),
            tenant
        )
    }

    /// Get the token URL for a tenant.
    pub fn token_url(&self, tenant: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.api.authority_host.trim_end_matches('/'),
            tenant
        )
    }

    /// Graph base URL without a trailing slash.
    pub fn graph_base_url(&self) -> &str {
        self.api.graph_base_url.trim_end_matches('/')
    }
}

/// Locate the user configuration file, if any.
fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = PathBuf::from(USER_CONFIG_FILE);
    if local.is_file() {
        return Ok(Some(local));
    }

    Ok(user_config_path().filter(|p| p.is_file()))
}

/// Path of `oauth.toml` in the platform config directory.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "graphtutorial").map(|dirs| dirs.config_dir().join(USER_CONFIG_FILE))
}

/// Recursively merge `overlay` into `base`; overlay values win.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) =
            (base.get_mut(&key), &value)
        {
            merge_tables(existing, incoming.clone());
            continue;
        }
        base.insert(key, value);
    }
}

fn check_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
