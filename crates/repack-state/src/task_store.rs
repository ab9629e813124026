/*
[INPUT]:  Shared RepackClient, caller task operations, live channel events
[OUTPUT]: Task list / current task state + per-task live channel registry
[POS]:    State layer - owns task state and the lifetime of task channels
[UPDATE]: When task lifecycle handling or channel ownership changes
*/

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use repack_adapter::{
    ChannelClosed, ChannelError, ChannelHandler, ChannelMessage, ChannelState, GithubParams,
    LiveChannel, MarketParams, MessageKind, NoticeLevel, Notifier, ReconnectPolicy, RepackClient,
    Task, TaskCreate, TaskProgress, TaskQuery, TaskStatus, UploadRequest, UploadResponse,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::validate::{validate_github_params, validate_market_params};

pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStoreOptions {
    /// Wait between a terminal progress event and the authoritative re-fetch
    pub refresh_delay: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for TaskStoreOptions {
    fn default() -> Self {
        Self {
            refresh_delay: DEFAULT_REFRESH_DELAY,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Point-in-time copy of the task state with derived views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSnapshot {
    pub tasks: Vec<Task>,
    pub current_task: Option<Task>,
    pub loading: bool,
}

impl TaskSnapshot {
    pub fn active_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|task| task.status.is_active()).collect()
    }

    pub fn completed_tasks(&self) -> Vec<&Task> {
        self.with_status(TaskStatus::Completed)
    }

    pub fn failed_tasks(&self) -> Vec<&Task> {
        self.with_status(TaskStatus::Failed)
    }

    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    fn with_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.iter().filter(|task| task.status == status).collect()
    }
}

#[derive(Default)]
struct TaskState {
    tasks: Vec<Task>,
    current_task: Option<Task>,
    loading: bool,
    /// Tasks with a terminal re-fetch already scheduled
    refreshing: HashSet<String>,
}

struct Registration {
    generation: u64,
    channel: LiveChannel,
}

struct TaskStoreInner {
    client: Arc<RepackClient>,
    notifier: Arc<dyn Notifier>,
    options: TaskStoreOptions,
    state: Mutex<TaskState>,
    channels: Mutex<HashMap<String, Registration>>,
    next_generation: AtomicU64,
}

/// Task state plus the registry of live channels, one per task at most.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<TaskStoreInner>,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("base_url", &self.inner.client.base_url().as_str())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl TaskStore {
    pub fn new(client: Arc<RepackClient>) -> Self {
        Self::with_options(client, TaskStoreOptions::default())
    }

    pub fn with_options(client: Arc<RepackClient>, options: TaskStoreOptions) -> Self {
        let notifier = client.notifier();
        Self {
            inner: Arc::new(TaskStoreInner {
                client,
                notifier,
                options,
                state: Mutex::new(TaskState::default()),
                channels: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub async fn snapshot(&self) -> TaskSnapshot {
        let state = self.inner.state.lock().await;
        TaskSnapshot {
            tasks: state.tasks.clone(),
            current_task: state.current_task.clone(),
            loading: state.loading,
        }
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.inner.state.lock().await.tasks.clone()
    }

    pub async fn task(&self, task_id: &str) -> Option<Task> {
        let state = self.inner.state.lock().await;
        state.tasks.iter().find(|task| task.task_id == task_id).cloned()
    }

    pub async fn current_task(&self) -> Option<Task> {
        self.inner.state.lock().await.current_task.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.state.lock().await.loading
    }

    /// Replace the task list; the previous list survives a failed request.
    pub async fn fetch_tasks(&self, query: &TaskQuery) -> Option<Vec<Task>> {
        self.inner.state.lock().await.loading = true;
        let result = self.inner.client.list_tasks(query).await;

        let mut state = self.inner.state.lock().await;
        state.loading = false;
        match result {
            Ok(tasks) => {
                debug!(count = tasks.len(), "task list refreshed");
                state.tasks = tasks.clone();
                Some(tasks)
            }
            Err(err) => {
                warn!(error = %err, "failed to load tasks");
                None
            }
        }
    }

    /// Fetch one task, make it current and refresh its list entry.
    pub async fn fetch_task(&self, task_id: &str) -> Option<Task> {
        let task = self.load_task(task_id).await?;
        let mut state = self.inner.state.lock().await;
        replace_entry(&mut state.tasks, &task);
        state.current_task = Some(task.clone());
        Some(task)
    }

    pub async fn create_market_task(&self, params: &MarketParams) -> Option<Task> {
        if let Err(err) = validate_market_params(params) {
            self.reject_input(&err);
            return None;
        }
        let task = self.inner.client.create_market_task(params).await.ok()?;
        self.adopt_created(&task).await;
        Some(task)
    }

    pub async fn create_github_task(&self, params: &GithubParams) -> Option<Task> {
        if let Err(err) = validate_github_params(params) {
            self.reject_input(&err);
            return None;
        }
        let task = self.inner.client.create_github_task(params).await.ok()?;
        self.adopt_created(&task).await;
        Some(task)
    }

    pub async fn create_task(&self, body: &TaskCreate) -> Option<Task> {
        let task = self.inner.client.create_task(body).await.ok()?;
        self.adopt_created(&task).await;
        Some(task)
    }

    /// Upload a package, follow its task live and reload the list.
    pub async fn upload_file(&self, upload: UploadRequest) -> Option<UploadResponse> {
        let response = self.inner.client.upload_file(upload).await.ok()?;
        info!(task_id = %response.task_id, filename = %response.filename, "package uploaded");

        self.connect_channel(&response.task_id).await;
        self.fetch_tasks(&TaskQuery::default()).await;
        self.inner.notifier.notify(
            NoticeLevel::Success,
            &format!("Uploaded {}, task {} created", response.filename, response.task_id),
        );
        Some(response)
    }

    /// Cancel remotely, then mark the task cancelled locally and drop its channel.
    pub async fn cancel_task(&self, task_id: &str) -> bool {
        let Ok(response) = self.inner.client.cancel_task(task_id).await else {
            return false;
        };

        {
            let mut state = self.inner.state.lock().await;
            let TaskState {
                tasks, current_task, ..
            } = &mut *state;
            for task in tasks
                .iter_mut()
                .chain(current_task.as_mut())
                .filter(|task| task.task_id == task_id)
            {
                task.status = TaskStatus::Cancelled;
            }
        }
        self.disconnect_channel(task_id).await;

        let message = if response.message.is_empty() {
            "Task cancelled"
        } else {
            response.message.as_str()
        };
        self.inner.notifier.notify(NoticeLevel::Success, message);
        true
    }

    /// Fold a progress event into the list entry and the current task.
    ///
    /// A terminal status schedules one re-fetch after the refresh delay and
    /// closes the task's channel.
    pub async fn apply_progress(&self, event: &TaskProgress) {
        let registered = self.has_channel(&event.task_id).await;

        let schedule = {
            let mut state = self.inner.state.lock().await;
            let TaskState {
                tasks,
                current_task,
                refreshing,
                ..
            } = &mut *state;

            let mut applied = false;
            for task in tasks
                .iter_mut()
                .chain(current_task.as_mut())
                .filter(|task| task.task_id == event.task_id)
            {
                applied |= task.apply_progress(event);
            }
            if !applied {
                debug!(task_id = %event.task_id, status = %event.status, "progress event ignored");
            }

            event.status.is_terminal()
                && (applied || registered)
                && refreshing.insert(event.task_id.clone())
        };

        if schedule {
            self.schedule_refresh(event.task_id.clone());
        }
    }

    /// Open the live channel for `task_id`, replacing any existing one.
    pub async fn connect_channel(&self, task_id: &str) -> bool {
        let url = match self.inner.client.task_channel_url(task_id) {
            Ok(url) => url,
            Err(err) => {
                warn!(task_id, error = %err, "cannot build task channel URL");
                return false;
            }
        };

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let handler = Arc::new(TaskChannelHandler {
            task_id: task_id.to_string(),
            generation,
            store: Arc::downgrade(&self.inner),
        });
        let mut channel = LiveChannel::with_policy(url, self.inner.options.reconnect, handler);

        let mut channels = self.inner.channels.lock().await;
        if let Some(mut previous) = channels.remove(task_id) {
            previous.channel.close();
            debug!(task_id, "replaced existing task channel");
        }
        if let Err(err) = channel.connect() {
            warn!(task_id, error = %err, "failed to start task channel");
            return false;
        }
        channels.insert(task_id.to_string(), Registration { generation, channel });
        info!(task_id, "task channel registered");
        true
    }

    /// Close and unregister; no-op when nothing is registered.
    pub async fn disconnect_channel(&self, task_id: &str) {
        let removed = self.inner.channels.lock().await.remove(task_id);
        if let Some(mut registration) = removed {
            registration.channel.close();
            info!(task_id, "task channel disconnected");
        }
    }

    pub async fn disconnect_all(&self) {
        let drained: Vec<_> = self.inner.channels.lock().await.drain().collect();
        for (task_id, mut registration) in drained {
            registration.channel.close();
            debug!(task_id = %task_id, "task channel disconnected");
        }
    }

    pub async fn has_channel(&self, task_id: &str) -> bool {
        self.inner.channels.lock().await.contains_key(task_id)
    }

    pub async fn channel_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.inner.channels.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn channel_state(&self, task_id: &str) -> Option<ChannelState> {
        let channels = self.inner.channels.lock().await;
        channels.get(task_id).map(|registration| registration.channel.state())
    }

    /// Drop a task from local state and close its channel.
    pub async fn remove_task(&self, task_id: &str) {
        {
            let mut state = self.inner.state.lock().await;
            state.tasks.retain(|task| task.task_id != task_id);
            if state
                .current_task
                .as_ref()
                .is_some_and(|task| task.task_id == task_id)
            {
                state.current_task = None;
            }
        }
        self.disconnect_channel(task_id).await;
    }

    /// Forget every task and close every channel.
    pub async fn clear_tasks(&self) {
        {
            let mut state = self.inner.state.lock().await;
            state.tasks.clear();
            state.current_task = None;
        }
        self.disconnect_all().await;
    }

    async fn load_task(&self, task_id: &str) -> Option<Task> {
        match self.inner.client.get_task(task_id).await {
            Ok(task) => Some(task),
            Err(err) => {
                warn!(task_id, error = %err, "failed to load task");
                None
            }
        }
    }

    /// Authoritative fetch after a terminal event; one retry for transient failures.
    async fn load_terminal_task(&self, task_id: &str, retry_delay: Duration) -> Option<Task> {
        match self.inner.client.get_task(task_id).await {
            Ok(task) => Some(task),
            Err(err) if err.is_retryable() => {
                warn!(
                    task_id,
                    error = %err,
                    retry_ms = retry_delay.as_millis() as u64,
                    "terminal refresh failed, retrying"
                );
                tokio::time::sleep(retry_delay).await;
                self.load_task(task_id).await
            }
            Err(err) => {
                warn!(task_id, error = %err, "terminal refresh failed");
                None
            }
        }
    }

    async fn adopt_created(&self, task: &Task) {
        self.inner.state.lock().await.tasks.insert(0, task.clone());
        self.connect_channel(&task.task_id).await;
        info!(task_id = %task.task_id, mode = %task.mode, "task created");
        self.inner.notifier.notify(
            NoticeLevel::Success,
            &format!("Task {} created", task.task_id),
        );
    }

    fn reject_input(&self, err: &anyhow::Error) {
        warn!(error = %err, "task parameters rejected");
        self.inner
            .notifier
            .notify(NoticeLevel::Warning, &err.to_string());
    }

    fn schedule_refresh(&self, task_id: String) {
        let store = self.clone();
        let delay = self.inner.options.refresh_delay;
        debug!(task_id = %task_id, delay_ms = delay.as_millis() as u64, "scheduling terminal refresh");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.disconnect_channel(&task_id).await;

            let refreshed = store.load_terminal_task(&task_id, delay).await;
            let mut state = store.inner.state.lock().await;
            if let Some(task) = refreshed {
                replace_entry(&mut state.tasks, &task);
                if let Some(current) = state
                    .current_task
                    .as_mut()
                    .filter(|current| current.task_id == task.task_id)
                {
                    *current = task;
                }
            }
            state.refreshing.remove(&task_id);
        });
    }

    /// Unregister a channel that gave up, unless it was replaced meanwhile.
    async fn release_exhausted(&self, task_id: &str, generation: u64) {
        let mut channels = self.inner.channels.lock().await;
        let current = channels
            .get(task_id)
            .is_some_and(|registration| registration.generation == generation);
        if current {
            channels.remove(task_id);
            warn!(task_id, "task channel unregistered after exhausting reconnects");
        }
    }
}

fn replace_entry(tasks: &mut [Task], task: &Task) {
    if let Some(entry) = tasks.iter_mut().find(|entry| entry.task_id == task.task_id) {
        *entry = task.clone();
    }
}

struct TaskChannelHandler {
    task_id: String,
    generation: u64,
    store: Weak<TaskStoreInner>,
}

impl TaskChannelHandler {
    fn store(&self) -> Option<TaskStore> {
        self.store.upgrade().map(|inner| TaskStore { inner })
    }
}

#[async_trait]
impl ChannelHandler for TaskChannelHandler {
    async fn on_message(&self, message: ChannelMessage) {
        let Some(store) = self.store() else {
            return;
        };
        match message.kind {
            MessageKind::Progress => match message.progress() {
                Some(event) => store.apply_progress(&event).await,
                None => warn!(task_id = %self.task_id, "progress message without a usable payload"),
            },
            MessageKind::System => {
                if let Some(text) = message.system_text() {
                    store.inner.notifier.notify(NoticeLevel::Info, text);
                }
            }
            MessageKind::Log => {
                if let Some(line) = message.log_line() {
                    debug!(task_id = %self.task_id, log = %line.log, "task log");
                }
            }
            MessageKind::Unknown => {
                debug!(task_id = %self.task_id, "unrecognized channel message");
            }
        }
    }

    async fn on_error(&self, error: &ChannelError) {
        debug!(task_id = %self.task_id, error = %error, "task channel error");
    }

    async fn on_close(&self, closed: &ChannelClosed) {
        if closed.will_reconnect() {
            return;
        }
        if let Some(store) = self.store() {
            store.release_exhausted(&self.task_id, self.generation).await;
        }
    }
}
