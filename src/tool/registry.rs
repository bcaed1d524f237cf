// ABOUTME: Implements the Registry - one dispatch table over local tools and
// ABOUTME: every connected MCP server's remote tools.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{Tool, ToolSet, validate};
use crate::error::{McpError, ToolError};
use crate::llm::ToolDefinition;
use crate::mcp::{McpClient, McpServerConfig, McpToolInfo};

/// A resolved, invocable capability.
pub enum Capability {
    /// An in-process tool.
    Local(Arc<dyn Tool>),
    /// A tool served by an MCP server, as listed by that server just now.
    Remote {
        client: Arc<McpClient>,
        info: McpToolInfo,
    },
}

impl Capability {
    /// Parameter schema used to validate arguments.
    pub fn schema(&self) -> serde_json::Value {
        match self {
            Capability::Local(tool) => tool.schema(),
            Capability::Remote { info, .. } => info.input_schema.clone(),
        }
    }

    async fn execute(&self, name: &str, params: serde_json::Value) -> Result<String, ToolError> {
        match self {
            Capability::Local(tool) => {
                let outcome = AssertUnwindSafe(tool.execute(params)).catch_unwind().await;
                match outcome {
                    Ok(Ok(result)) => Ok(result.into()),
                    Ok(Err(source)) => Err(ToolError::Execution {
                        name: name.to_string(),
                        source,
                    }),
                    Err(_) => Err(ToolError::Execution {
                        name: name.to_string(),
                        source: anyhow::anyhow!("tool panicked"),
                    }),
                }
            }
            Capability::Remote { client, info } => Ok(client.call_tool(&info.name, params).await),
        }
    }
}

/// A thread-safe registry of capabilities.
///
/// Cloning shares state: every clone sees the same tools and servers.
#[derive(Default, Clone)]
pub struct Registry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
    servers: Arc<RwLock<Vec<Arc<McpClient>>>>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub async fn register<T: Tool + 'static>(&self, tool: T) {
        self.register_arc(Arc::new(tool)).await;
    }

    /// Register a tool from an Arc.
    pub async fn register_arc(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool.name().to_string(), tool);
    }

    /// Unregister a tool by name. Unknown names are ignored.
    pub async fn unregister(&self, name: &str) {
        let mut tools = self.tools.write().await;
        tools.remove(name);
    }

    /// Get a local tool by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    /// Check if a local tool is registered.
    pub async fn has(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// List local tool names, sorted alphabetically.
    pub async fn list(&self) -> Vec<String> {
        let tools = self.tools.read().await;
        let mut names: Vec<_> = tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the number of local tools.
    pub async fn count(&self) -> usize {
        self.tools.read().await.len()
    }

    // ========================================================================
    // MCP servers
    // ========================================================================

    /// Connect to a server and attach it. Connection errors are returned so
    /// the caller can retry, skip the server, or abort startup.
    pub async fn connect_mcp(&self, config: McpServerConfig) -> Result<Arc<McpClient>, McpError> {
        let client = Arc::new(McpClient::new(config));
        client.connect().await?;
        self.attach_mcp(client.clone()).await;
        Ok(client)
    }

    /// Connect every configured server in order.
    ///
    /// Each server's outcome is reported by name; a failure does not stop the
    /// rest from connecting, and nothing is attached for a failed server.
    pub async fn connect_all(
        &self,
        configs: &[McpServerConfig],
    ) -> Vec<(String, Result<Arc<McpClient>, McpError>)> {
        let mut outcomes = Vec::with_capacity(configs.len());
        for config in configs {
            let name = config.name.clone();
            let outcome = self.connect_mcp(config.clone()).await;
            if let Err(e) = &outcome {
                warn!(server = %name, error = %e, "skipping MCP server");
            }
            outcomes.push((name, outcome));
        }
        outcomes
    }

    /// Attach an MCP client, replacing any attached client with the same name.
    pub async fn attach_mcp(&self, client: Arc<McpClient>) {
        let mut servers = self.servers.write().await;
        servers.retain(|s| s.name() != client.name());
        servers.push(client);
    }

    /// Detach and close a server. Returns false if no server had that name.
    pub async fn disconnect_mcp(&self, name: &str) -> Result<bool, McpError> {
        let removed = {
            let mut servers = self.servers.write().await;
            let index = servers.iter().position(|s| s.name() == name);
            index.map(|i| servers.remove(i))
        };
        match removed {
            Some(client) => {
                client.close().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Attached MCP clients, in attach order.
    pub async fn mcp_clients(&self) -> Vec<Arc<McpClient>> {
        self.servers.read().await.clone()
    }

    /// Close every attached server, logging failures.
    pub async fn close_all(&self) {
        let servers: Vec<_> = self.servers.write().await.drain(..).collect();
        for server in servers {
            if let Err(e) = server.close().await {
                warn!(server = %server.name(), error = %e, "error closing MCP server");
            }
        }
    }

    // ========================================================================
    // Manifest and dispatch
    // ========================================================================

    /// Manifest of local tools (sorted) followed by each live server's tools.
    ///
    /// Remote tools are listed fresh on every call; a server whose listing
    /// fails contributes nothing this time.
    pub async fn manifest(&self) -> Vec<ToolDefinition> {
        let servers = self.mcp_clients().await;
        let mut definitions: Vec<ToolDefinition> = {
            let tools = self.tools.read().await;
            tools
                .values()
                .map(|t| t.definition())
                .filter(|d| {
                    // Unreachable: resolve() sends this name to the server.
                    let shadowed = servers.iter().any(|c| c.strip_namespace(&d.name).is_some());
                    if shadowed {
                        debug!(tool = %d.name, "local tool shadowed by server namespace");
                    }
                    !shadowed
                })
                .collect()
        };
        definitions.sort_by(|a, b| a.name.cmp(&b.name));

        for client in servers {
            match client.list_tools().await {
                Ok(tools) => definitions.extend(tools.into_iter().map(|info| ToolDefinition {
                    name: client.namespaced(&info.name),
                    description: info.description.unwrap_or_default(),
                    parameters: info.input_schema,
                })),
                Err(e) => {
                    warn!(server = %client.name(), error = %e, "failed to list remote tools");
                }
            }
        }

        definitions
    }

    /// Resolve a manifest name to a capability.
    ///
    /// A `{server}__` prefix naming an attached server always routes to that
    /// server, even if a local tool has the same remainder as its name.
    pub async fn resolve(&self, name: &str) -> Result<Capability, ToolError> {
        let remote = {
            let servers = self.servers.read().await;
            servers.iter().find_map(|client| {
                client
                    .strip_namespace(name)
                    .map(|remote| (client.clone(), remote.to_string()))
            })
        };

        if let Some((client, remote_name)) = remote {
            let tools = client.list_tools().await.map_err(|e| ToolError::Execution {
                name: name.to_string(),
                source: e.into(),
            })?;
            return tools
                .into_iter()
                .find(|info| info.name == remote_name)
                .map(|info| Capability::Remote { client, info })
                .ok_or_else(|| ToolError::NotFound(name.to_string()));
        }

        self.get(name)
            .await
            .map(Capability::Local)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    async fn try_dispatch(&self, name: &str, params: serde_json::Value) -> Result<String, ToolError> {
        let capability = self.resolve(name).await?;
        execute_validated(&capability, name, params).await
    }

    pub(crate) async fn try_dispatch_json(
        &self,
        name: &str,
        arguments: &str,
    ) -> Result<String, ToolError> {
        let capability = self.resolve(name).await?;
        let params = parse_arguments(name, arguments)?;
        execute_validated(&capability, name, params).await
    }

    /// Validate and execute a call. Never fails: every fault is returned as
    /// the result text.
    pub async fn dispatch(&self, name: &str, params: serde_json::Value) -> String {
        self.try_dispatch(name, params)
            .await
            .unwrap_or_else(|e| dispatch_failure(name, e))
    }

    /// Like [`dispatch`](Self::dispatch), but takes the raw argument JSON
    /// from a tool-call directive. Malformed JSON becomes an error string.
    pub async fn dispatch_json(&self, name: &str, arguments: &str) -> String {
        self.try_dispatch_json(name, arguments)
            .await
            .unwrap_or_else(|e| dispatch_failure(name, e))
    }
}

/// Parse the raw argument text of a tool-call directive.
///
/// Blank text means "no arguments".
pub(crate) fn parse_arguments(name: &str, arguments: &str) -> Result<serde_json::Value, ToolError> {
    if arguments.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(arguments).map_err(|source| ToolError::MalformedArguments {
        name: name.to_string(),
        source,
    })
}

async fn execute_validated(
    capability: &Capability,
    name: &str,
    params: serde_json::Value,
) -> Result<String, ToolError> {
    let violations = validate(&capability.schema(), &params);
    if !violations.is_empty() {
        return Err(ToolError::InvalidParams {
            name: name.to_string(),
            violations: violations.iter().map(|v| v.to_string()).collect(),
        });
    }
    debug!(tool = %name, "dispatching tool call");
    capability.execute(name, params).await
}

pub(crate) fn dispatch_failure(name: &str, error: ToolError) -> String {
    match &error {
        ToolError::Execution { .. } => warn!(tool = %name, error = %error, "tool execution failed"),
        _ => debug!(tool = %name, error = %error, "tool call rejected"),
    }
    error.to_string()
}

#[async_trait]
impl ToolSet for Registry {
    async fn manifest(&self) -> Vec<ToolDefinition> {
        Registry::manifest(self).await
    }

    async fn dispatch_json(&self, name: &str, arguments: &str) -> String {
        Registry::dispatch_json(self, name, arguments).await
    }
}
