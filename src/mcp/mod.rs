// ABOUTME: MCP module - Model Context Protocol client implementation.
// ABOUTME: Connects to tool-provider subprocesses over stdio and calls their tools.

mod client;
mod transport;
mod types;

pub use client::{ConnectionState, McpClient, NAMESPACE_SEPARATOR, TransportFactory, TransportFuture};
pub use transport::{StdioTransport, Transport};
pub use types::*;

#[cfg(test)]
pub(crate) mod testing;
