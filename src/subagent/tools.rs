// ABOUTME: Tools that expose the orchestrator to a parent agent:
// ABOUTME: spawn, parallel_spawn, and wait_subagents.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::handle::SubagentStatus;
use super::orchestrator::{Origin, SpawnRequest, SubagentOrchestrator};
use crate::tool::{Tool, ToolResult};

/// Spawn one background subagent.
///
/// Announcements go to the origin set with [`set_context`](Self::set_context),
/// `cli:direct` until then.
pub struct SpawnTool {
    orchestrator: SubagentOrchestrator,
    origin: RwLock<Origin>,
}

impl SpawnTool {
    pub fn new(orchestrator: SubagentOrchestrator) -> Self {
        Self {
            orchestrator,
            origin: RwLock::new(Origin::default()),
        }
    }

    /// Set the origin context for subagent announcements.
    pub async fn set_context(&self, channel: impl Into<String>, chat_id: impl Into<String>) {
        *self.origin.write().await = Origin::new(channel, chat_id);
    }
}

#[async_trait]
impl Tool for SpawnTool {
    fn name(&self) -> &str {
        "spawn"
    }

    fn description(&self) -> &str {
        "Spawn a subagent to handle a task in the background. Use this for complex or \
         time-consuming tasks that can run independently. The subagent reports back when done."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The task for the subagent to complete"
                },
                "label": {
                    "type": "string",
                    "description": "Optional short label for the task (for display)"
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, anyhow::Error> {
        let task = params
            .get("task")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: task"))?;

        let mut request = SpawnRequest::new(task).origin(self.origin.read().await.clone());
        if let Some(label) = params.get("label").and_then(|v| v.as_str()) {
            request = request.label(label);
        }

        Ok(ToolResult::text(self.orchestrator.spawn(request).await))
    }
}

/// Spawn several background subagents at once.
pub struct ParallelSpawnTool {
    orchestrator: SubagentOrchestrator,
    origin: RwLock<Origin>,
}

impl ParallelSpawnTool {
    pub fn new(orchestrator: SubagentOrchestrator) -> Self {
        Self {
            orchestrator,
            origin: RwLock::new(Origin::default()),
        }
    }

    /// Set the origin context for subagent announcements.
    pub async fn set_context(&self, channel: impl Into<String>, chat_id: impl Into<String>) {
        *self.origin.write().await = Origin::new(channel, chat_id);
    }
}

#[async_trait]
impl Tool for ParallelSpawnTool {
    fn name(&self) -> &str {
        "parallel_spawn"
    }

    fn description(&self) -> &str {
        "Spawn multiple subagents to handle independent tasks in the background concurrently. \
         Returns one status line per task, each with its task id."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "tasks": {
                    "type": "array",
                    "description": "List of tasks to spawn",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "task": {"type": "string", "description": "The task for the subagent"},
                            "label": {"type": "string", "description": "Optional label for the task"}
                        },
                        "required": ["task"]
                    }
                }
            },
            "required": ["tasks"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, anyhow::Error> {
        let tasks = params
            .get("tasks")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: tasks"))?;

        let origin = self.origin.read().await.clone();
        let mut acks = Vec::with_capacity(tasks.len());
        for entry in tasks {
            let task = entry
                .get("task")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("Every task entry needs a 'task' string"))?;
            let mut request = SpawnRequest::new(task).origin(origin.clone());
            if let Some(label) = entry.get("label").and_then(|v| v.as_str()) {
                request = request.label(label);
            }
            acks.push(self.orchestrator.spawn(request).await);
        }

        Ok(ToolResult::text(acks.join("\n")))
    }
}

/// Block until some or all running subagents finish, then report their results.
pub struct WaitSubagentsTool {
    orchestrator: SubagentOrchestrator,
}

impl WaitSubagentsTool {
    pub fn new(orchestrator: SubagentOrchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for WaitSubagentsTool {
    fn name(&self) -> &str {
        "wait_subagents"
    }

    fn description(&self) -> &str {
        "Wait for the given subagents (by task_id), or for every running subagent, to complete. \
         Returns their results."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_ids": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Task ids to wait for. If omitted, waits for all running subagents."
                }
            }
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, anyhow::Error> {
        let task_ids = params.get("task_ids").and_then(|v| v.as_array()).map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect::<Vec<_>>()
        });

        let outcome = self.orchestrator.wait_for(task_ids).await;

        let mut lines = vec![outcome.summary, String::new()];
        for record in outcome.results {
            let status = if record.status == SubagentStatus::Ok {
                "OK"
            } else {
                "FAILED"
            };
            lines.push(format!(
                "--- Subagent {} ({}) [{}] ---",
                record.task_id, record.label, status
            ));
            lines.push(format!("Task: {}", record.task));
            lines.push(format!("Result:\n{}", record.result));
            lines.push("-".repeat(40));
        }

        Ok(ToolResult::text(lines.join("\n")))
    }
}
