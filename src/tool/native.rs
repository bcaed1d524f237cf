// ABOUTME: NativeTool wraps an async closure as a local capability.
// ABOUTME: Lets hosts register behavior without writing a Tool impl.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Tool, ToolResult};

type BoxedHandler = Arc<
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = Result<String, anyhow::Error>> + Send>>
        + Send
        + Sync,
>;

/// A tool backed by a closure returning its output text.
#[derive(Clone)]
pub struct NativeTool {
    name: String,
    description: String,
    schema: serde_json::Value,
    handler: BoxedHandler,
}

impl NativeTool {
    /// Create a tool with an empty-object parameter schema.
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, anyhow::Error>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema: serde_json::json!({"type": "object", "properties": {}}),
            handler: Arc::new(move |params| Box::pin(handler(params))),
        }
    }

    /// Set the parameter schema.
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = schema;
        self
    }
}

#[async_trait]
impl Tool for NativeTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, anyhow::Error> {
        let output = (self.handler)(params).await?;
        Ok(ToolResult::text(output))
    }
}
