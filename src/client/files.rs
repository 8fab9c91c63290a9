use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::decode::decode_typed;
use crate::error::LLMError;

use super::ChatClient;

/// What an uploaded file is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilePurpose {
    /// Text is extracted server side and can be fed back as context
    FileExtract,
    Image,
    Video,
}

impl FilePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilePurpose::FileExtract => "file-extract",
            FilePurpose::Image => "image",
            FilePurpose::Video => "video",
        }
    }
}

/// Metadata of an uploaded file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub object: String,
    /// Size in bytes
    #[serde(default)]
    pub bytes: u64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_details: Option<String>,
}

/// Text extracted from an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileContent {
    pub content: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    data: Vec<FileObject>,
}

#[derive(Deserialize)]
struct Deleted {
    #[serde(default)]
    deleted: bool,
}

impl ChatClient {
    /// Uploads a local file with a multipart request.
    pub async fn upload_file(&self, path: impl AsRef<Path>, purpose: FilePurpose) -> Result<FileObject, LLMError> {
        let path = path.as_ref();
        let data = Bytes::from(tokio::fs::read(path).await.map_err(|e| {
            LLMError::InvalidRequest(format!("cannot read {}: {e}", path.display()))
        })?);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let url = self.endpoint("files")?;
        log::debug!("uploading {file_name} ({} bytes)", data.len());

        // A multipart form is consumed by sending, so it is rebuilt per attempt.
        let raw = self
            .dispatcher
            .send(
                |client| {
                    let part = Part::stream_with_length(data.clone(), data.len() as u64)
                        .file_name(file_name.clone());
                    let form = Form::new()
                        .text("purpose", purpose.as_str())
                        .part("file", part);
                    self.authorize(client.post(url.clone()).multipart(form), self.request_timeout)
                },
                &CancellationToken::new(),
            )
            .await?;
        decode_typed(raw).await
    }

    pub async fn list_files(&self) -> Result<Vec<FileObject>, LLMError> {
        let raw = self.send_simple(Method::GET, "files").await?;
        let list: FileList = decode_typed(raw).await?;
        Ok(list.data)
    }

    pub async fn retrieve_file(&self, file_id: &str) -> Result<FileObject, LLMError> {
        let raw = self.send_simple(Method::GET, &format!("files/{file_id}")).await?;
        decode_typed(raw).await
    }

    /// Fetches the text extracted from a `file-extract` upload.
    pub async fn retrieve_file_content(&self, file_id: &str) -> Result<FileContent, LLMError> {
        let raw = self
            .send_simple(Method::GET, &format!("files/{file_id}/content"))
            .await?;
        decode_typed(raw).await
    }

    /// Returns whether the server reported the file as deleted.
    pub async fn delete_file(&self, file_id: &str) -> Result<bool, LLMError> {
        let raw = self
            .send_simple(Method::DELETE, &format!("files/{file_id}"))
            .await?;
        let deleted: Deleted = decode_typed(raw).await?;
        Ok(deleted.deleted)
    }
}
