// ABOUTME: Defines the Tool trait - the local capability abstraction - and the
// ABOUTME: ToolSet trait through which the control loop sees its capabilities.

use async_trait::async_trait;

use super::ToolResult;
use crate::llm::ToolDefinition;

/// A local capability that can be executed by an agent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of this tool.
    fn name(&self) -> &str;

    /// Returns a human-readable description for the model.
    fn description(&self) -> &str;

    /// Returns the JSON Schema for the tool's input parameters.
    fn schema(&self) -> serde_json::Value;

    /// Execute the tool with already-validated parameters.
    ///
    /// CPU-bound work must be offloaded by the implementation itself
    /// (e.g. `tokio::task::spawn_blocking`); dispatch awaits this directly.
    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, anyhow::Error>;

    /// Manifest entry for this tool.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema(),
        }
    }
}

/// The view of capabilities a control loop runs against.
///
/// Implemented by [`Registry`](super::Registry) and by
/// [`FilteredRegistry`](crate::agent::FilteredRegistry). Dispatch never fails:
/// every fault comes back as the result string.
#[async_trait]
pub trait ToolSet: Send + Sync {
    /// Current manifest, fetched fresh on every call.
    async fn manifest(&self) -> Vec<ToolDefinition>;

    /// Dispatch a call whose arguments are the raw JSON text from the model.
    async fn dispatch_json(&self, name: &str, arguments: &str) -> String;
}
