//! Microsoft Graph payloads used by the tutorial.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User profile from Microsoft Graph /me endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User's display name.
    pub display_name: Option<String>,

    /// User's email address. Set for work/school accounts.
    pub mail: Option<String>,

    /// User Principal Name. Holds the email for personal accounts.
    pub user_principal_name: Option<String>,
}

impl User {
    /// Get the best available display name.
    pub fn display_name_or_upn(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.user_principal_name.clone())
            .unwrap_or_else(|| "Unknown User".to_string())
    }

    /// Get the best available email.
    pub fn email(&self) -> String {
        self.mail
            .clone()
            .or_else(|| self.user_principal_name.clone())
            .unwrap_or_else(|| "No email".to_string())
    }
}

/// A file or folder in a drive.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: Option<String>,
    pub name: Option<String>,
    pub web_url: Option<String>,
    pub size: Option<u64>,
    pub folder: Option<Folder>,
    pub file: Option<File>,
    pub last_modified_date_time: Option<DateTime<Utc>>,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }
}

/// Folder facet. Serializes to `{}` when empty, which marks a new item as a folder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_count: Option<u32>,
}

/// File facet, present on files only.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub mime_type: Option<String>,
}

/// Request body for creating a drive item.
#[derive(Debug, Clone, Serialize)]
pub struct NewDriveItem {
    pub name: String,
    pub folder: Folder,
}

impl NewDriveItem {
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            folder: Folder::default(),
        }
    }
}

/// One page of a collection response.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default)]
    pub value: Vec<T>,

    /// Link to the next page. Never followed.
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.next_link.is_some()
    }
}

impl Page<DriveItem> {
    /// Web URLs of the items on this page, skipping items without one.
    pub fn web_urls(&self) -> Vec<&str> {
        self.value
            .iter()
            .filter_map(|item| item.web_url.as_deref())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_email_fallback() {
        let user: User = serde_json::from_value(json!({
            "displayName": null,
            "mail": null,
            "userPrincipalName": "user@tenant.com"
        }))
        .unwrap();

        assert_eq!(user.display_name_or_upn(), "user@tenant.com");
        assert_eq!(user.email(), "user@tenant.com");
    }

    #[test]
    fn test_new_folder_body() {
        let body = serde_json::to_value(NewDriveItem::folder("Reports")).unwrap();
        assert_eq!(body, json!({ "name": "Reports", "folder": {} }));
    }

    #[test]
    fn test_page_parsing() {
        let page: Page<DriveItem> = serde_json::from_value(json!({
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#...",
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/me/drive/root/children?$skiptoken=x",
            "value": [
                { "id": "1", "name": "a.txt", "webUrl": "https://x/a.txt", "size": 12,
                  "lastModifiedDateTime": "2024-01-02T03:04:05Z", "file": { "mimeType": "text/plain" } },
                { "id": "2", "name": "Docs", "folder": { "childCount": 3 } }
            ]
        }))
        .unwrap();

        assert!(page.has_more());
        assert_eq!(page.web_urls(), vec!["https://x/a.txt"]);
        assert!(!page.value[0].is_folder());
        assert_eq!(
            page.value[0].file.as_ref().unwrap().mime_type.as_deref(),
            Some("text/plain")
        );
        assert!(page.value[1].is_folder());
        assert!(page.value[1].file.is_none());
        assert_eq!(page.value[1].folder.as_ref().unwrap().child_count, Some(3));
    }
}
