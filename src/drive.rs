//! OneDrive operations on top of the session's clients.
//!
//! Each call fetches one page and never follows `@odata.nextLink`.
//! App-only operations need [`CredentialSession::ensure_app_auth`] to have run.

use tracing::info;

use crate::error::AppError;
use crate::graph::{DriveItem, NewDriveItem, Page};
use crate::session::CredentialSession;

/// List the signed-in user's root folder.
pub async fn list_root_children(session: &CredentialSession) -> Result<Page<DriveItem>, AppError> {
    let page = session.user_client()?.list_root_children().await?;
    info!("Listed {} root items", page.value.len());
    Ok(page)
}

/// Create a folder named `name` in the root folder, as the app.
pub async fn create_folder(session: &CredentialSession, name: &str) -> Result<DriveItem, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("folder name is empty".into()));
    }

    let client = session.app_client()?;
    let item = client.create_root_child(&NewDriveItem::folder(name)).await?;
    info!("Created folder {}", name);
    Ok(item)
}

/// Recently used files, as the app.
pub async fn get_recent_files(session: &CredentialSession) -> Result<Page<DriveItem>, AppError> {
    session.app_client()?.list_recent().await
}

/// Root folder children, as the app. Returns the first page untouched.
pub async fn get_all_files(session: &CredentialSession) -> Result<Page<DriveItem>, AppError> {
    session.app_client()?.list_root_children().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DeviceCodeInfo;
    use crate::config::tests::test_config;
    use crate::error::ApiError;
    use crate::secure::SecureString;
    use crate::session::AuthMode;
    use serde_json::json;
    use wiremock::matchers::{any, body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn noop(_: &DeviceCodeInfo) {}

    /// Session whose user token endpoint hands out `user-token` and app token endpoint `app-token`.
    async fn session_with_tokens(server: &MockServer) -> CredentialSession {
        Mock::given(method("POST"))
            .and(path("/t1/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user_code": "ABCD-EFGH",
                "device_code": "device-123",
                "verification_uri": "https://microsoft.com/devicelogin",
                "expires_in": 900,
                "interval": 0
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/t1/oauth2/v2.0/token"))
            .and(body_string_contains("device_code=device-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3600,
                "access_token": "user-token"
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/t1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3600,
                "access_token": "app-token"
            })))
            .mount(server)
            .await;

        let mut config = test_config(&server.uri());
        config.app.client_secret = Some(SecureString::new("shh"));

        let mut session = CredentialSession::new();
        session.initialize_user_auth(config, noop).unwrap();
        session
    }

    #[tokio::test]
    async fn test_list_root_children_returns_item_urls() {
        let server = MockServer::start().await;
        let session = session_with_tokens(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me/drive/root/children"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{ "name": "a.txt", "webUrl": "https://x/a.txt" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = list_root_children(&session).await.unwrap();
        assert_eq!(page.web_urls(), vec!["https://x/a.txt"]);
    }

    #[tokio::test]
    async fn test_list_root_children_surfaces_remote_error() {
        let server = MockServer::start().await;
        let session = session_with_tokens(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me/drive/root/children"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": "itemNotFound", "message": "The resource could not be found." }
            })))
            .mount(&server)
            .await;

        let err = list_root_children(&session).await.unwrap_err();
        assert!(err.is_remote());
        assert!(matches!(
            err,
            AppError::Api(ApiError::Status { status: 404, ref message })
                if message.contains("The resource could not be found.")
        ));
    }

    #[tokio::test]
    async fn test_app_operations_require_ensure() {
        let server = MockServer::start().await;
        Mock::given(any()).respond_with(ResponseTemplate::new(500)).expect(0).mount(&server).await;

        let mut session = CredentialSession::new();
        let mut config = test_config(&server.uri());
        config.app.client_secret = Some(SecureString::new("shh"));
        session.initialize_user_auth(config, noop).unwrap();

        for result in [
            get_recent_files(&session).await.map(|_| ()),
            get_all_files(&session).await.map(|_| ()),
            create_folder(&session, "New Folder").await.map(|_| ()),
        ] {
            assert!(matches!(result, Err(AppError::NotInitialized(AuthMode::App))));
        }
    }

    #[tokio::test]
    async fn test_user_operation_before_init_sends_nothing() {
        let session = CredentialSession::new();
        assert!(matches!(
            list_root_children(&session).await,
            Err(AppError::NotInitialized(AuthMode::User))
        ));
    }

    #[tokio::test]
    async fn test_app_operations_use_app_token() {
        let server = MockServer::start().await;
        let session = session_with_tokens(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me/drive/recent"))
            .and(header("authorization", "Bearer app-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{ "name": "recent.docx", "webUrl": "https://x/recent.docx" }],
                "@odata.nextLink": "https://graph/next"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me/drive/root/children"))
            .and(header("authorization", "Bearer app-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1.0/me/drive/root/children"))
            .and(body_json(json!({ "name": "Reports", "folder": {} })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "01F", "name": "Reports", "folder": { "childCount": 0 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        session.ensure_app_auth().unwrap();

        let recent = get_recent_files(&session).await.unwrap();
        assert_eq!(recent.web_urls(), vec!["https://x/recent.docx"]);
        assert!(recent.has_more());

        assert!(get_all_files(&session).await.unwrap().value.is_empty());

        let folder = create_folder(&session, "  Reports ").await.unwrap();
        assert_eq!(folder.name.as_deref(), Some("Reports"));
    }

    #[tokio::test]
    async fn test_create_folder_rejects_empty_name() {
        let session = CredentialSession::new();
        assert!(matches!(
            create_folder(&session, "   ").await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
