// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use flock::prelude::*;` to get started quickly.

pub use crate::agent::{
    AgentDefinition, ControlLoop, FilteredRegistry, LoopOutcome, LoopState, NO_RESPONSE,
};
pub use crate::config::{AgentConfig, SubagentConfig};
pub use crate::error::{ConfigError, FlockError, LlmError, McpError, ToolError};
pub use crate::llm::{
    LlmClient, Message, OpenAIClient, Request, Response, Role, ToolCall, ToolDefinition, Usage,
};
pub use crate::mcp::{
    ConnectionState, McpClient, McpServerConfig, McpToolInfo, StdioTransport, Transport,
};
pub use crate::subagent::{
    MemorySessionStore, Origin, ParallelSpawnTool, SessionStore, SpawnRequest, SpawnTool,
    SubagentOrchestrator, SubagentRecord, SubagentStatus, WaitOutcome, WaitSubagentsTool,
};
pub use crate::tool::{NativeTool, Registry, Tool, ToolResult, ToolSet};
