use crate::file::{File, Folder, Role};
use gapi_helper::constants::DRIVE_SCOPES;
use gapi_helper::{
    Access, ApiClient, Endpoints, GapiConfig, GapiResult, ServiceAccountCredentials,
    TokenProvider,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const FILE_FIELDS: &str = "id, name, mimeType, parents";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, parents)";

/// Metadata of a Drive item as returned by `files.list` / `files.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Permission<'a> {
    role: Role,
    #[serde(rename = "type")]
    grantee_type: &'a str,
    email_address: &'a str,
}

/// Drive v3 client bound to one user.
#[derive(Debug, Clone)]
pub struct DriveService {
    client: ApiClient,
    endpoints: Endpoints,
}

/// Quotes a value for use in a Drive search query.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl DriveService {
    /// Creates a service acting as the service account, or as `user` when given.
    pub fn new(
        config: &GapiConfig,
        credentials: &ServiceAccountCredentials,
        user: Option<&str>,
    ) -> Self {
        let client =
            ApiClient::service_account(credentials, DRIVE_SCOPES, user, config.retry.clone());
        Self::with_client(config, client)
    }

    pub fn with_token_provider(config: &GapiConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_client(config, ApiClient::new(tokens, config.retry.clone()))
    }

    fn with_client(config: &GapiConfig, client: ApiClient) -> Self {
        Self {
            client,
            endpoints: config.endpoints.clone(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Drops the cached access token.
    pub async fn reset(&self) {
        self.client.reset().await;
    }

    /// A handle on an existing file. `name` is only used for logging.
    pub fn file(&self, name: &str, id: &str) -> File {
        File::new(name, id, self.clone())
    }

    /// A handle on an existing folder. `name` is only used for logging.
    pub fn folder(&self, name: &str, id: &str) -> Folder {
        Folder::new(name, id, self.clone())
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.endpoints.drive_api)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.endpoints.drive_api, file_id)
    }

    // --- Permissions ---

    pub(crate) async fn create_permission(
        &self,
        file_id: &str,
        user: &str,
        role: Role,
        notify: bool,
    ) -> GapiResult<()> {
        let url = format!("{}/permissions", self.file_url(file_id));
        let body = Permission {
            role,
            grantee_type: "user",
            email_address: user,
        };
        let flag = if role == Role::Owner {
            ("transferOwnership", "true")
        } else {
            ("sendNotificationEmail", if notify { "true" } else { "false" })
        };
        let _: serde_json::Value = self
            .client
            .send_json(Access::Write, Method::POST, &url, &[flag], &body)
            .await?;
        Ok(())
    }

    // --- Files ---

    pub async fn delete_file(&self, file_id: &str) -> GapiResult<()> {
        self.client.delete(&self.file_url(file_id)).await
    }

    pub async fn copy_file(
        &self,
        file_id: &str,
        name: &str,
        parent_id: &str,
    ) -> GapiResult<DriveFile> {
        let url = format!("{}/copy", self.file_url(file_id));
        let body = json!({"name": name, "parents": [parent_id]});
        self.client
            .send_json(
                Access::Write,
                Method::POST,
                &url,
                &[("fields", FILE_FIELDS)],
                &body,
            )
            .await
    }

    /// Lists every file matching a Drive search query, following `nextPageToken`.
    pub async fn search(&self, query: &str) -> GapiResult<Vec<DriveFile>> {
        let url = self.files_url();
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![("q", query.to_string()), ("fields", LIST_FIELDS.to_string())];
            if let Some(token) = page_token.take() {
                params.push(("pageToken", token));
            }
            let page: FileList = self.client.get_json(&url, &params).await?;
            debug!("Received {} files", page.files.len());
            files.extend(page.files);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(files),
            }
        }
    }

    /// Files named `name` directly inside `parent_id`.
    pub async fn find_files(&self, name: &str, parent_id: &str) -> GapiResult<Vec<DriveFile>> {
        self.search(&format!(
            "name = {} and {} in parents",
            quote(name),
            quote(parent_id)
        ))
        .await
    }

    pub async fn list_files(&self, parent_id: &str) -> GapiResult<Vec<DriveFile>> {
        self.search(&format!("{} in parents", quote(parent_id))).await
    }

    /// Files owned by `user`.
    pub async fn list_owned_files(&self, user: &str) -> GapiResult<Vec<DriveFile>> {
        info!("Retrieving files owned by {user}...");
        self.search(&format!("{} in owners", quote(user))).await
    }

    /// Downloads the content of a file to `destination`.
    pub async fn download_file(&self, file_id: &str, destination: &Path) -> GapiResult<PathBuf> {
        let url = self.file_url(file_id);
        let response = self
            .client
            .send(Access::Read, |http| http.get(&url).query(&[("alt", "media")]))
            .await?;
        let content = response
            .bytes()
            .await
            .map_err(|e| Access::Read.error(None, e.to_string()))?;
        tokio::fs::write(destination, &content).await?;
        Ok(destination.to_path_buf())
    }

    /// Uploads a local file as a new file of `parent_id`. Returns the new file ID.
    pub async fn upload_file(
        &self,
        path: &Path,
        parent_id: &str,
        mime: &str,
    ) -> GapiResult<String> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = tokio::fs::read(path).await?;
        let metadata = json!({"name": name, "parents": [parent_id]});

        let boundary = format!("gapi-helper-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &metadata, mime, &content);
        let url = format!("{}/files", self.endpoints.drive_upload);
        let content_type = format!("multipart/related; boundary={boundary}");

        let response = self
            .client
            .send(Access::Write, |http| {
                http.post(&url)
                    .query(&[("uploadType", "multipart"), ("fields", "id")])
                    .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                    .body(body.clone())
            })
            .await?;
        created_id(response).await
    }

    /// Replaces the content of an existing file with a new revision.
    pub async fn update_file(&self, path: &Path, file_id: &str, mime: &str) -> GapiResult<String> {
        let content = tokio::fs::read(path).await?;
        let url = format!("{}/files/{}", self.endpoints.drive_upload, file_id);
        let response = self
            .client
            .send(Access::Write, |http| {
                http.patch(&url)
                    .query(&[("uploadType", "media"), ("fields", "id")])
                    .header(reqwest::header::CONTENT_TYPE, mime)
                    .body(content.clone())
            })
            .await?;
        created_id(response).await
    }

    /// Creates an empty file (or folder, or Google document) inside `parent_id`.
    pub async fn insert_file(&self, name: &str, parent_id: &str, mime: &str) -> GapiResult<String> {
        let body = json!({"name": name, "mimeType": mime, "parents": [parent_id]});
        let file: DriveFile = self
            .client
            .send_json(
                Access::Write,
                Method::POST,
                &self.files_url(),
                &[("fields", "id")],
                &body,
            )
            .await?;
        Ok(file.id)
    }
}

async fn created_id(response: reqwest::Response) -> GapiResult<String> {
    let file: DriveFile = response
        .json()
        .await
        .map_err(|e| Access::Write.error(None, format!("Invalid response body: {e}")))?;
    Ok(file.id)
}

/// Builds a `multipart/related` body: JSON metadata followed by the media.
fn multipart_related(
    boundary: &str,
    metadata: &serde_json::Value,
    mime: &str,
    content: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(format!("{metadata}\r\n").as_bytes());
    body.extend_from_slice(format!("--{boundary}\r\nContent-Type: {mime}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("report.csv"), "'report.csv'");
        assert_eq!(quote("Bob's file"), r"'Bob\'s file'");
    }

    #[test]
    fn test_multipart_related_layout() {
        let body = multipart_related("XYZ", &json!({"name": "a.txt"}), "text/plain", b"hello");
        let text = String::from_utf8(body).unwrap();
        assert_eq!(
            text,
            "--XYZ\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{\"name\":\"a.txt\"}\r\n\
             --XYZ\r\nContent-Type: text/plain\r\n\r\nhello\r\n--XYZ--\r\n"
        );
    }
}
