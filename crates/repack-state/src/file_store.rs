/*
[INPUT]:  Shared RepackClient, caller file operations
[OUTPUT]: Cached file listing + download/content URLs
[POS]:    State layer - backend file areas (input, output, temp)
[UPDATE]: When file listing or cleanup handling changes
*/

use std::sync::Arc;

use repack_adapter::{FileFilter, FileInfo, FileKind, NoticeLevel, Notifier, RepackClient};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Default)]
struct FileState {
    files: Vec<FileInfo>,
    filter: FileFilter,
    loading: bool,
}

pub struct FileStore {
    client: Arc<RepackClient>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<FileState>,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("base_url", &self.client.base_url().as_str())
            .finish_non_exhaustive()
    }
}

impl FileStore {
    pub fn new(client: Arc<RepackClient>) -> Self {
        let notifier = client.notifier();
        Self {
            client,
            notifier,
            state: Mutex::new(FileState::default()),
        }
    }

    pub async fn files(&self) -> Vec<FileInfo> {
        self.state.lock().await.files.clone()
    }

    /// Filter used by the most recent listing.
    pub async fn filter(&self) -> FileFilter {
        self.state.lock().await.filter
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    /// Replace the cached listing; kept as-is when the request fails.
    pub async fn fetch_files(&self, filter: FileFilter) -> Option<Vec<FileInfo>> {
        self.state.lock().await.loading = true;
        let result = self.client.list_files(filter).await;

        let mut state = self.state.lock().await;
        state.loading = false;
        match result {
            Ok(files) => {
                debug!(filter = filter.as_str(), count = files.len(), "file list refreshed");
                state.files = files.clone();
                state.filter = filter;
                Some(files)
            }
            Err(err) => {
                warn!(filter = filter.as_str(), error = %err, "failed to load files");
                None
            }
        }
    }

    /// Delete remotely, then drop the entry matching both kind and name.
    pub async fn delete_file(&self, kind: FileKind, name: &str) -> bool {
        let Ok(response) = self.client.delete_file(kind, name).await else {
            return false;
        };

        self.state
            .lock()
            .await
            .files
            .retain(|file| !(file.kind == kind && file.name == name));
        info!(kind = kind.as_str(), name, "file deleted");
        self.notifier.notify(NoticeLevel::Success, &response.message);
        true
    }

    /// Sweep temporary files, report the server's summary and reload everything.
    pub async fn cleanup_temp_files(&self) -> bool {
        let Ok(response) = self.client.cleanup_temp_files().await else {
            return false;
        };
        info!(message = %response.message, "temporary files cleaned");
        self.notifier.notify(NoticeLevel::Success, &response.message);
        self.fetch_files(FileFilter::All).await;
        true
    }

    pub fn download_url(&self, kind: FileKind, name: &str) -> Option<Url> {
        self.client
            .file_download_url(kind, name)
            .inspect_err(|err| warn!(kind = kind.as_str(), name, error = %err, "bad download URL"))
            .ok()
    }

    pub fn content_url(&self, kind: FileKind, name: &str) -> Option<Url> {
        self.client
            .file_content_url(kind, name)
            .inspect_err(|err| warn!(kind = kind.as_str(), name, error = %err, "bad content URL"))
            .ok()
    }
}
