/*
[INPUT]:  Task parameters, upload sources, task identifiers
[OUTPUT]: Task records, upload acknowledgements, download URLs
[POS]:    HTTP layer - task endpoints under /api/v1/tasks
[UPDATE]: When adding task endpoints or changing request bodies
*/

use reqwest::Method;
use reqwest::Url;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::http::{RepackClient, Result};
use crate::types::{
    GithubParams, MarketParams, MessageResponse, Task, TaskCreate, TaskQuery, UploadRequest,
    UploadResponse, UploadSource,
};

impl RepackClient {
    /// List tasks, newest first
    ///
    /// GET /tasks?skip={skip}&limit={limit}&status={status}
    pub async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>> {
        let builder = self.request(Method::GET, &["tasks"])?.query(query);
        self.send_json(builder).await
    }

    /// GET /tasks/{task_id}
    pub async fn get_task(&self, task_id: &str) -> Result<Task> {
        let builder = self.request(Method::GET, &["tasks", task_id])?;
        self.send_json(builder).await
    }

    /// POST /tasks
    pub async fn create_task(&self, body: &TaskCreate) -> Result<Task> {
        let builder = self.request(Method::POST, &["tasks"])?.json(body);
        self.send_json(builder).await
    }

    /// POST /tasks/market
    pub async fn create_market_task(&self, params: &MarketParams) -> Result<Task> {
        let builder = self.request(Method::POST, &["tasks", "market"])?.json(params);
        self.send_json(builder).await
    }

    /// POST /tasks/github
    pub async fn create_github_task(&self, params: &GithubParams) -> Result<Task> {
        let builder = self.request(Method::POST, &["tasks", "github"])?.json(params);
        self.send_json(builder).await
    }

    /// Upload a package and start a local-mode task
    ///
    /// POST /tasks/upload (multipart: file, platform?, suffix?)
    pub async fn upload_file(&self, upload: UploadRequest) -> Result<UploadResponse> {
        let form = build_upload_form(upload)
            .await
            .inspect_err(|err| self.report_failure(err))?;
        let builder = self
            .request(Method::POST, &["tasks", "upload"])?
            .multipart(form)
            .timeout(self.upload_timeout());
        self.send_json(builder).await
    }

    /// DELETE /tasks/{task_id}
    pub async fn cancel_task(&self, task_id: &str) -> Result<MessageResponse> {
        let builder = self.request(Method::DELETE, &["tasks", task_id])?;
        self.send_json(builder).await
    }

    /// GET /tasks/{task_id}/download
    pub fn task_download_url(&self, task_id: &str) -> Result<Url> {
        self.api_url(&["tasks", task_id, "download"])
    }
}

async fn build_upload_form(upload: UploadRequest) -> Result<Form> {
    let (file_name, data) = match upload.source {
        UploadSource::Path(path) => {
            let data = tokio::fs::read(&path).await?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.difypkg".to_string());
            (file_name, data)
        }
        UploadSource::Bytes { file_name, data } => (file_name, data),
    };

    debug!(file_name = %file_name, bytes = data.len(), "building upload form");

    let part = Part::bytes(data)
        .file_name(file_name)
        .mime_str("application/octet-stream")?;
    let mut form = Form::new().part("file", part);
    if let Some(platform) = upload.platform.filter(|value| !value.is_empty()) {
        form = form.text("platform", platform);
    }
    if let Some(suffix) = upload.suffix.filter(|value| !value.is_empty()) {
        form = form.text("suffix", suffix);
    }
    Ok(form)
}
