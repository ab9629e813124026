/*
[INPUT]:  File kinds and names
[OUTPUT]: File listings, storage snapshots, cleanup results, file URLs
[POS]:    HTTP layer - file endpoints under /api/v1/files
[UPDATE]: When adding file endpoints or changing listing filters
*/

use reqwest::Method;
use reqwest::Url;

use crate::http::{RepackClient, Result};
use crate::types::{FileFilter, FileInfo, FileKind, MessageResponse, StorageInfo};

impl RepackClient {
    /// GET /files?file_type={filter}
    pub async fn list_files(&self, filter: FileFilter) -> Result<Vec<FileInfo>> {
        let builder = self
            .request(Method::GET, &["files"])?
            .query(&[("file_type", filter.as_str())]);
        self.send_json(builder).await
    }

    /// GET /files/storage
    pub async fn storage_info(&self) -> Result<StorageInfo> {
        let builder = self.request(Method::GET, &["files", "storage"])?;
        self.send_json(builder).await
    }

    /// DELETE /files/{kind}/{name}
    pub async fn delete_file(&self, kind: FileKind, name: &str) -> Result<MessageResponse> {
        let builder = self.request(Method::DELETE, &["files", kind.as_str(), name])?;
        self.send_json(builder).await
    }

    /// Ask the backend to sweep stale uploads
    ///
    /// POST /files/cleanup
    pub async fn cleanup_temp_files(&self) -> Result<MessageResponse> {
        let builder = self.request(Method::POST, &["files", "cleanup"])?;
        self.send_json(builder).await
    }

    /// GET /files/download/{kind}/{name}
    pub fn file_download_url(&self, kind: FileKind, name: &str) -> Result<Url> {
        self.api_url(&["files", "download", kind.as_str(), name])
    }

    /// GET /files/content/{kind}/{name}
    pub fn file_content_url(&self, kind: FileKind, name: &str) -> Result<Url> {
        self.api_url(&["files", "content", kind.as_str(), name])
    }
}
