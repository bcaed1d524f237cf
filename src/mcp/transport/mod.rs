// ABOUTME: Transport abstraction for MCP communication.
// ABOUTME: Re-exports the stdio (subprocess) transport implementation.

mod stdio;

pub use stdio::StdioTransport;

use async_trait::async_trait;

use super::{McpNotification, McpRequest, McpResponse};
use crate::error::McpError;

/// Trait for MCP transport implementations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and receive a response.
    async fn send(&self, request: McpRequest) -> Result<McpResponse, McpError>;

    /// Send a notification (no response expected).
    async fn notify(&self, notification: McpNotification) -> Result<(), McpError>;

    /// Release every resource the transport owns. Must be idempotent.
    async fn shutdown(&self) -> Result<(), McpError>;
}
