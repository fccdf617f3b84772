use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, ETAG, IF_MATCH, IF_NONE_MATCH};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::backend::{Blob, BlobBackend, ChildEntry, EntryKind, WriteCondition};
use super::credentials::CredentialCache;
use super::error::StorageError;
use super::paths::BlobPath;

const MAX_ERROR_BODY: usize = 512;

/// Path-addressed drive API (`<base>/root:/<path>:/content` style) behind a bearer credential.
#[derive(Clone)]
pub(crate) struct DriveBackend {
    client: Client,
    base_url: String,
    root: String,
    credentials: CredentialCache,
}

#[derive(Debug, Deserialize)]
struct ChildrenPage {
    #[serde(default)]
    value: Vec<DriveItem>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveItem {
    name: String,
    #[serde(default)]
    folder: Option<serde_json::Value>,
}

impl DriveBackend {
    pub(crate) fn new(
        client: Client,
        base_url: String,
        root: String,
        credentials: CredentialCache,
    ) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_string(), root, credentials }
    }

    /// Builds the HTTP client with the fixed per-request timeout.
    pub(crate) fn http_client(timeout: Duration) -> Result<Client, StorageError> {
        Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()
            .map_err(|err| StorageError::Transport(format!("failed to build HTTP client: {err}")))
    }

    fn item_url(&self, path: &BlobPath) -> String {
        format!("{}/root:/{}", self.base_url, encode_path(&path.qualified(&self.root)))
    }

    fn content_url(&self, path: &BlobPath) -> String {
        format!("{}:/content", self.item_url(path))
    }

    fn children_url(&self, folder: &BlobPath) -> String {
        format!("{}:/children", self.item_url(folder))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StorageError> {
        let token = self.credentials.bearer().await?;
        let response = request.bearer_auth(token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.credentials.invalidate().await;
        }
        Ok(response)
    }
}

#[async_trait]
impl BlobBackend for DriveBackend {
    fn name(&self) -> &'static str {
        "drive"
    }

    async fn get(&self, path: &BlobPath) -> Result<Option<Blob>, StorageError> {
        let response = self.send(self.client.get(self.content_url(path))).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(path, response).await);
        }

        let content_type = header_string(&response, CONTENT_TYPE.as_str());
        let etag = header_string(&response, ETAG.as_str());
        let bytes = response.bytes().await?.to_vec();
        Ok(Some(Blob { bytes, content_type, etag }))
    }

    async fn put(
        &self,
        path: &BlobPath,
        bytes: Vec<u8>,
        content_type: &str,
        condition: WriteCondition,
    ) -> Result<(), StorageError> {
        let mut request =
            self.client.put(self.content_url(path)).header(CONTENT_TYPE, content_type).body(bytes);
        request = match condition {
            WriteCondition::Overwrite => request,
            WriteCondition::IfMatch(etag) => request.header(IF_MATCH, etag),
            WriteCondition::IfAbsent => request.header(IF_NONE_MATCH, "*"),
        };

        let response = self.send(request).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(path, response).await)
        }
    }

    async fn delete(&self, path: &BlobPath) -> Result<(), StorageError> {
        let response = self.send(self.client.delete(self.item_url(path))).await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(status_error(path, response).await)
        }
    }

    async fn list_children(&self, folder: &BlobPath) -> Result<Vec<ChildEntry>, StorageError> {
        let mut entries = Vec::new();
        let mut next = Some(self.children_url(folder));

        while let Some(url) = next.take() {
            let response = self.send(self.client.get(url)).await?;
            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(Vec::new());
            }
            if !status.is_success() {
                return Err(status_error(folder, response).await);
            }

            let page: ChildrenPage =
                response.json().await.map_err(|err| StorageError::malformed(folder.as_str(), err))?;
            entries.extend(page.value.into_iter().map(|item| ChildEntry {
                kind: if item.folder.is_some() { EntryKind::Folder } else { EntryKind::File },
                name: item.name,
            }));
            next = page.next_link;
        }

        Ok(entries)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let response = self.send(self.client.get(&self.base_url)).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            Err(StorageError::Backend { status: status.as_u16(), message: "health check failed".into() })
        }
    }
}

fn encode_path(qualified: &str) -> String {
    qualified
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn header_string(response: &Response, name: &str) -> Option<String> {
    response.headers().get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
}

async fn status_error(path: &BlobPath, response: Response) -> StorageError {
    let status = response.status();
    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }

    match status {
        StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => {
            StorageError::Conflict { path: path.to_string() }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StorageError::Auth(format!("backend rejected credential ({status}): {message}"))
        }
        _ => StorageError::Backend { status: status.as_u16(), message },
    }
}
