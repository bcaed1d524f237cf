// ABOUTME: Defines all error types for the flock library using thiserror.
// ABOUTME: Each submodule has its own error enum, unified under FlockError.

/// Top-level error type for the flock library.
#[derive(Debug, thiserror::Error)]
pub enum FlockError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors from tool dispatch.
///
/// The `Display` text of each variant is the string handed back to the model,
/// so these never need to cross a dispatch boundary as values.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Error: tool '{0}' not found")]
    NotFound(String),

    #[error("Error: malformed arguments for tool '{name}': {source}")]
    MalformedArguments {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Error: invalid parameters for tool '{name}': {}", .violations.join("; "))]
    InvalidParams {
        name: String,
        violations: Vec<String>,
    },

    #[error("error executing {name}: {source}")]
    Execution {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors from MCP operations.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Server '{0}' is not connected")]
    NotConnected(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("RPC error ({code}): {message}")]
    Rpc { code: i32, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
