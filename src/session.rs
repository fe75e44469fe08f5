//! The credential session: configuration plus the user and app-only identities.
//!
//! The user identity is set up explicitly with [`CredentialSession::initialize_user_auth`].
//! The app-only identity is built on first use of
//! [`CredentialSession::ensure_app_auth`] and then reused.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::info;

use crate::auth::{AccessToken, ClientSecretCredential, DeviceCodeCredential, DeviceCodeInfo};
use crate::config::Config;
use crate::error::{AppError, ConfigError};
use crate::graph::{DriveTarget, GraphClient, User};

/// Scope requested by the app-only identity.
const APP_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Profile fields fetched for the signed-in user.
const USER_FIELDS: &[&str] = &["displayName", "mail", "userPrincipalName"];

/// Which identity an operation runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    User,
    App,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user auth"),
            Self::App => f.write_str("app-only auth"),
        }
    }
}

/// Owns the configuration and one Graph client per identity.
#[derive(Default)]
pub struct CredentialSession {
    config: Option<Config>,
    user_client: Option<GraphClient>,
    app_client: OnceCell<GraphClient>,
}

impl CredentialSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set up the device-code identity.
    ///
    /// `on_challenge` receives the sign-in instructions whenever the device-code
    /// flow needs the user. On error the session is left untouched. Calling this
    /// again replaces the configuration and drops any app-only client.
    pub fn initialize_user_auth<F>(&mut self, config: Config, on_challenge: F) -> Result<(), AppError>
    where
        F: Fn(&DeviceCodeInfo) + Send + Sync + 'static,
    {
        config.validate_user_auth()?;

        let credential = DeviceCodeCredential::new(&config, Arc::new(on_challenge))?;
        let client = GraphClient::new(config.graph_base_url(), Arc::new(credential), config.scopes())?;

        info!(
            "Initialized user auth for client {} in tenant {}",
            config.app.client_id, config.app.auth_tenant
        );

        self.user_client = Some(client);
        self.app_client = OnceCell::new();
        self.config = Some(config);
        Ok(())
    }

    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    /// Client for the signed-in user.
    pub fn user_client(&self) -> Result<&GraphClient, AppError> {
        self.user_client
            .as_ref()
            .ok_or(AppError::NotInitialized(AuthMode::User))
    }

    /// Client for the app-only identity, if [`Self::ensure_app_auth`] has run.
    pub fn app_client(&self) -> Result<&GraphClient, AppError> {
        self.app_client
            .get()
            .ok_or(AppError::NotInitialized(AuthMode::App))
    }

    /// Get a token for the configured user scopes.
    ///
    /// May prompt through the challenge callback on first use.
    pub async fn user_token(&self) -> Result<AccessToken, AppError> {
        Ok(self.user_client()?.access_token().await?)
    }

    /// Fetch the signed-in user's display name, mail and UPN.
    pub async fn current_user(&self) -> Result<User, AppError> {
        self.user_client()?.get_me(USER_FIELDS).await
    }

    /// Build the client-secret credential and app client on first call.
    ///
    /// Later calls return the same client.
    pub fn ensure_app_auth(&self) -> Result<&GraphClient, AppError> {
        let config = self.config.as_ref().ok_or(ConfigError::NotLoaded)?;

        self.app_client.get_or_try_init(|| -> Result<GraphClient, AppError> {
            let settings = config.app_auth()?;
            let tenant = settings.tenant.clone();
            let credential = ClientSecretCredential::new(config, settings)?;

            let drive = match config.drive_owner() {
                Some(owner) => DriveTarget::User(owner.to_string()),
                None => DriveTarget::Me,
            };
            let client = GraphClient::new(
                config.graph_base_url(),
                Arc::new(credential),
                vec![APP_SCOPE.to_string()],
            )?
            .with_drive(drive);

            info!("Initialized app-only auth in tenant {}", tenant);
            Ok(client)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::secure::SecureString;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn noop(_: &DeviceCodeInfo) {}

    async fn mount_device_flow(server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path("/t1/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user_code": "ABCD-EFGH",
                "device_code": "device-123",
                "verification_uri": "https://microsoft.com/devicelogin",
                "expires_in": 900,
                "interval": 0,
                "message": "Enter ABCD-EFGH"
            })))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/t1/oauth2/v2.0/token"))
            .and(body_string_contains("device_code=device-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3600,
                "access_token": token
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_operations_before_init_fail() {
        let session = CredentialSession::new();

        assert!(matches!(
            session.user_token().await,
            Err(AppError::NotInitialized(AuthMode::User))
        ));
        assert!(matches!(
            session.current_user().await,
            Err(AppError::NotInitialized(AuthMode::User))
        ));
        assert!(matches!(
            session.app_client(),
            Err(AppError::NotInitialized(AuthMode::App))
        ));
        assert!(matches!(
            session.ensure_app_auth(),
            Err(AppError::Config(ConfigError::NotLoaded))
        ));
    }

    #[test]
    fn test_invalid_config_leaves_session_unset() {
        let mut session = CredentialSession::new();
        let mut config = test_config("https://login.example.com");
        config.app.client_id = String::new();

        let result = session.initialize_user_auth(config, noop);

        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::Missing("app.client_id")))
        ));
        assert!(session.config().is_none());
        assert!(session.user_client().is_err());
    }

    #[tokio::test]
    async fn test_user_token_requests_configured_scopes_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/t1/oauth2/v2.0/devicecode"))
            .and(body_string_contains("scope=User.Read+Files.Read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user_code": "ABCD-EFGH",
                "device_code": "device-123",
                "verification_uri": "https://microsoft.com/devicelogin",
                "expires_in": 900,
                "interval": 0
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/t1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3600,
                "access_token": "user-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = CredentialSession::new();
        session
            .initialize_user_auth(test_config(&server.uri()), noop)
            .unwrap();

        let first = session.user_token().await.unwrap();
        assert!(!first.secret().is_empty());
        let second = session.user_token().await.unwrap();
        assert_eq!(second.secret(), "user-token");
    }

    #[tokio::test]
    async fn test_current_user() {
        let server = MockServer::start().await;
        mount_device_flow(&server, "user-token").await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me"))
            .and(query_param("$select", "displayName,mail,userPrincipalName"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "displayName": "Megan Bowen",
                "mail": null,
                "userPrincipalName": "megan@contoso.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = CredentialSession::new();
        session
            .initialize_user_auth(test_config(&server.uri()), noop)
            .unwrap();

        let user = session.current_user().await.unwrap();
        assert_eq!(user.display_name_or_upn(), "Megan Bowen");
        assert_eq!(user.email(), "megan@contoso.com");
    }

    #[tokio::test]
    async fn test_ensure_app_auth_builds_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app-tenant/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3600,
                "access_token": "app-token"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me/drive/recent"))
            .and(header("authorization", "Bearer app-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
            .expect(2)
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.app.tenant_id = Some("app-tenant".into());
        config.app.client_secret = Some(SecureString::new("shh"));

        let mut session = CredentialSession::new();
        session.initialize_user_auth(config, noop).unwrap();

        let first = session.ensure_app_auth().unwrap();
        let second = session.ensure_app_auth().unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(first, session.app_client().unwrap()));

        first.list_recent().await.unwrap();
        second.list_recent().await.unwrap();
    }

    #[test]
    fn test_ensure_app_auth_without_secret_is_config_error() {
        let mut session = CredentialSession::new();
        session
            .initialize_user_auth(test_config("https://login.example.com"), noop)
            .unwrap();

        assert!(matches!(
            session.ensure_app_auth(),
            Err(AppError::Config(ConfigError::Missing("app.client_secret")))
        ));
        // A failed attempt leaves the app client unset
        assert!(session.app_client().is_err());
    }

    #[test]
    fn test_reinitialize_drops_app_client() {
        let mut config = test_config("https://login.example.com");
        config.app.client_secret = Some(SecureString::new("shh"));

        let mut session = CredentialSession::new();
        session.initialize_user_auth(config.clone(), noop).unwrap();
        session.ensure_app_auth().unwrap();
        assert!(session.app_client().is_ok());

        session.initialize_user_auth(config, noop).unwrap();
        assert!(matches!(
            session.app_client(),
            Err(AppError::NotInitialized(AuthMode::App))
        ));
    }
}
