// ABOUTME: SubagentOrchestrator - runs bounded control loops in the background,
// ABOUTME: tracks them by task id, and announces each result to its origin session.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::handle::{RunHandle, SubagentStatus};
use super::session::SessionStore;
use crate::agent::{AgentDefinition, ControlLoop};
use crate::config::SubagentConfig;
use crate::llm::LlmClient;
use crate::tool::Registry;

const LABEL_CHARS: usize = 30;

/// Where a subagent was spawned from, and so where its result is announced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub channel: String,
    pub chat_id: String,
}

impl Origin {
    pub fn new(channel: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Session key: `"{channel}:{chat_id}"`.
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }
}

impl Default for Origin {
    fn default() -> Self {
        Self::new("cli", "direct")
    }
}

/// Arguments to [`SubagentOrchestrator::spawn`].
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub task: String,
    pub label: Option<String>,
    pub model: Option<String>,
    pub origin: Origin,
}

impl SpawnRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            label: None,
            model: None,
            origin: Origin::default(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }
}

/// The recorded outcome of one finished subagent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubagentRecord {
    pub task_id: String,
    pub label: String,
    pub task: String,
    pub result: String,
    pub status: SubagentStatus,
}

impl SubagentRecord {
    /// Announcement text written into the origin session.
    pub fn announcement(&self) -> String {
        let status_text = if self.status == SubagentStatus::Ok {
            "completed successfully"
        } else {
            "failed"
        };
        format!(
            "[Subagent '{}' {}]\n\nTask: {}\n\nResult:\n{}",
            self.label, status_text, self.task, self.result
        )
    }
}

/// Result of [`SubagentOrchestrator::wait_for`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitOutcome {
    pub results: Vec<SubagentRecord>,
    pub summary: String,
}

/// One terminal transition, on its way to the session store.
#[derive(Debug, Clone)]
pub struct Announcement {
    pub task_id: String,
    pub session_key: String,
    pub content: String,
}

/// Consumes announcements and writes each into its session.
pub struct SessionWriter {
    store: Arc<dyn SessionStore>,
    events: mpsc::UnboundedReceiver<Announcement>,
}

impl SessionWriter {
    /// Run until every orchestrator handle is dropped.
    pub async fn run(mut self) {
        while let Some(announcement) = self.events.recv().await {
            if let Err(e) = self.deliver(&announcement).await {
                warn!(
                    task_id = %announcement.task_id,
                    session = %announcement.session_key,
                    error = %e,
                    "failed to record subagent announcement"
                );
            }
        }
        debug!("session writer stopped");
    }

    async fn deliver(&self, announcement: &Announcement) -> Result<(), anyhow::Error> {
        let mut session = self.store.get_or_create(&announcement.session_key).await?;
        session.add_message("system", announcement.content.as_str());
        self.store.save(&session).await?;
        debug!(
            task_id = %announcement.task_id,
            session = %announcement.session_key,
            "recorded subagent announcement"
        );
        Ok(())
    }
}

#[derive(Default)]
struct TaskTable {
    /// Every id ever spawned, in spawn order.
    spawned: Vec<String>,
    running: HashMap<String, RunHandle>,
    results: HashMap<String, SubagentRecord>,
}

impl TaskTable {
    fn running_ids(&self) -> Vec<String> {
        self.spawned
            .iter()
            .filter(|id| self.running.contains_key(*id))
            .cloned()
            .collect()
    }

    fn is_known(&self, id: &str) -> bool {
        self.running.contains_key(id) || self.results.contains_key(id)
    }
}

struct Inner {
    client: Arc<dyn LlmClient>,
    registry: Registry,
    config: SubagentConfig,
    table: Mutex<TaskTable>,
    events: mpsc::UnboundedSender<Announcement>,
}

/// Runs subagents concurrently with the caller.
///
/// Cloning shares the task table. Each subagent gets its own control loop,
/// the orchestrator's registry minus `config.denied_tools`, and a focused
/// system prompt.
#[derive(Clone)]
pub struct SubagentOrchestrator {
    inner: Arc<Inner>,
}

impl SubagentOrchestrator {
    /// Create an orchestrator and spawn its session writer.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn new(
        client: Arc<dyn LlmClient>,
        registry: Registry,
        config: SubagentConfig,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let (orchestrator, writer) = Self::with_writer(client, registry, config, store);
        tokio::spawn(writer.run());
        orchestrator
    }

    /// Create an orchestrator and hand back its session writer for the
    /// caller to drive.
    pub fn with_writer(
        client: Arc<dyn LlmClient>,
        registry: Registry,
        config: SubagentConfig,
        store: Arc<dyn SessionStore>,
    ) -> (Self, SessionWriter) {
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            inner: Arc::new(Inner {
                client,
                registry,
                config,
                table: Mutex::new(TaskTable::default()),
                events: tx,
            }),
        };
        (orchestrator, SessionWriter { store, events: rx })
    }

    pub fn config(&self) -> &SubagentConfig {
        &self.inner.config
    }

    /// Start a subagent in the background and return an acknowledgement.
    ///
    /// Does not wait for the subagent to make progress.
    pub async fn spawn(&self, request: SpawnRequest) -> String {
        let label = request
            .label
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| default_label(&request.task));
        let handle = RunHandle::new();

        let task_id = {
            let mut table = self.inner.table.lock().await;
            let mut task_id = new_task_id();
            while table.is_known(&task_id) {
                task_id = new_task_id();
            }
            table.spawned.push(task_id.clone());
            table.running.insert(task_id.clone(), handle.clone());
            task_id
        };

        info!(task_id = %task_id, label = %label, "spawned subagent");
        tokio::spawn(run_unit(
            self.inner.clone(),
            task_id.clone(),
            label.clone(),
            request,
            handle,
        ));

        format!(
            "Subagent [{}] started (id: {}). I'll notify you when it completes.",
            label, task_id
        )
    }

    /// Wait for the given subagents, or for every running one when `None`.
    ///
    /// Unknown ids are ignored. Already-finished ids are returned from the
    /// results table without waiting.
    pub async fn wait_for(&self, task_ids: Option<Vec<String>>) -> WaitOutcome {
        let (ids, handles) = {
            let table = self.inner.table.lock().await;
            let ids = match task_ids {
                None => table.running_ids(),
                Some(requested) => {
                    let mut ids: Vec<String> = Vec::new();
                    for id in requested {
                        if table.is_known(&id) && !ids.contains(&id) {
                            ids.push(id);
                        }
                    }
                    ids
                }
            };
            let handles: Vec<RunHandle> = ids
                .iter()
                .filter_map(|id| table.running.get(id).cloned())
                .collect();
            (ids, handles)
        };

        if ids.is_empty() {
            return WaitOutcome {
                results: Vec::new(),
                summary: "No running subagents to wait for.".to_string(),
            };
        }

        join_all(handles.iter().map(|h| h.wait())).await;

        let table = self.inner.table.lock().await;
        let results = ids
            .iter()
            .filter_map(|id| table.results.get(id).cloned())
            .collect();
        WaitOutcome {
            results,
            summary: format!("Waited for {} subagent(s).", ids.len()),
        }
    }

    /// Recorded result for a finished subagent.
    pub async fn get_result(&self, task_id: &str) -> Option<SubagentRecord> {
        self.inner.table.lock().await.results.get(task_id).cloned()
    }

    /// Every recorded result, in spawn order.
    pub async fn list_results(&self) -> Vec<SubagentRecord> {
        let table = self.inner.table.lock().await;
        table
            .spawned
            .iter()
            .filter_map(|id| table.results.get(id).cloned())
            .collect()
    }

    /// Number of subagents that have not finished yet.
    pub async fn running_count(&self) -> usize {
        self.inner.table.lock().await.running.len()
    }

    /// Lifecycle handle of a subagent that is still running.
    pub async fn handle(&self, task_id: &str) -> Option<RunHandle> {
        self.inner.table.lock().await.running.get(task_id).cloned()
    }
}

async fn run_unit(
    inner: Arc<Inner>,
    task_id: String,
    label: String,
    request: SpawnRequest,
    handle: RunHandle,
) {
    handle.set_running();
    debug!(task_id = %task_id, "subagent running");

    let config = &inner.config;
    let definition = AgentDefinition::new(
        format!("subagent-{}", task_id),
        subagent_prompt(&request.task, config.workspace.as_deref()),
    )
    .model_opt(request.model.clone().or_else(|| config.model.clone()))
    .max_iterations(config.max_iterations)
    .denied_tools(config.denied_tools.clone());

    let mut agent = ControlLoop::new(definition, inner.client.clone(), inner.registry.clone());
    let run = AssertUnwindSafe(agent.run(&request.task)).catch_unwind();

    let settled = match config.timeout() {
        Some(limit) => tokio::time::timeout(limit, run).await.ok(),
        None => Some(run.await),
    };

    let (status, result) = match settled {
        Some(Ok(outcome)) if outcome.all_model_calls_failed() => {
            warn!(
                task_id = %task_id,
                error = outcome.last_error.as_deref().unwrap_or_default(),
                "subagent failed"
            );
            (SubagentStatus::Error, outcome.content)
        }
        Some(Ok(outcome)) => (SubagentStatus::Ok, outcome.content),
        Some(Err(_)) => {
            warn!(task_id = %task_id, "subagent panicked");
            (SubagentStatus::Error, "Error: subagent panicked".to_string())
        }
        None => {
            let secs = config.timeout_secs.unwrap_or_default();
            warn!(task_id = %task_id, timeout_secs = secs, "subagent timed out");
            (
                SubagentStatus::Error,
                format!("Error: subagent timed out after {}s", secs),
            )
        }
    };

    let record = SubagentRecord {
        task_id,
        label,
        task: request.task,
        result,
        status,
    };
    finish(&inner, record, &request.origin, &handle).await;
}

/// The single terminal step: status, result record, running set, and
/// announcement change together under the table lock.
async fn finish(inner: &Inner, record: SubagentRecord, origin: &Origin, handle: &RunHandle) {
    let mut table = inner.table.lock().await;
    if !handle.finish(record.status) {
        return;
    }
    table.running.remove(&record.task_id);

    let announcement = Announcement {
        task_id: record.task_id.clone(),
        session_key: origin.session_key(),
        content: record.announcement(),
    };
    info!(task_id = %record.task_id, status = %record.status, "subagent finished");
    table.results.insert(record.task_id.clone(), record);

    if inner.events.send(announcement).is_err() {
        warn!("session writer is gone; announcement dropped");
    }
}

fn new_task_id() -> String {
    Uuid::new_v4().to_string().chars().take(8).collect()
}

/// First 30 characters of the task, with `...` if it was cut.
pub fn default_label(task: &str) -> String {
    let mut label: String = task.chars().take(LABEL_CHARS).collect();
    if task.chars().count() > LABEL_CHARS {
        label.push_str("...");
    }
    label
}

/// System prompt for a subagent working on `task`.
pub fn subagent_prompt(task: &str, workspace: Option<&Path>) -> String {
    let mut prompt = format!(
        "# Subagent\n\n\
         You were spawned by the main agent to complete one specific task.\n\n\
         ## Task\n{}\n\n\
         ## Rules\n\
         1. Complete only the assigned task; take on no side work.\n\
         2. Your final reply is reported back to the main agent.\n\
         3. Do not start conversations with the user.\n\
         4. Be concise but include everything the main agent needs.\n\n\
         ## Limits\n\
         - You cannot message the user directly.\n\
         - You cannot spawn further subagents.\n\
         - You cannot see the main agent's conversation history.\n",
        task
    );
    if let Some(workspace) = workspace {
        prompt.push_str(&format!(
            "\n## Workspace\nYour workspace is at: {}\n",
            workspace.display()
        ));
    }
    prompt.push_str("\nWhen you are done, reply with a clear summary of what you found or did.");
    prompt
}
