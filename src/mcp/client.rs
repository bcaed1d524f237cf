// ABOUTME: MCP client owning one tool-provider connection and its lifecycle.
// ABOUTME: Handles connect/handshake, tool listing and calls, and idempotent close.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::transport::{StdioTransport, Transport};
use super::{
    McpClientInfo, McpInitializeResult, McpNotification, McpRequest, McpServerConfig,
    McpToolInfo, McpToolsListResult, McpToolResult, PROTOCOL_VERSION,
};
use crate::error::McpError;

/// Separator between server name and remote tool name in the manifest.
pub const NAMESPACE_SEPARATOR: &str = "__";

/// Future produced by a [`TransportFactory`].
pub type TransportFuture = BoxFuture<'static, Result<Arc<dyn Transport>, McpError>>;

/// Opens a fresh transport for each connection attempt.
pub type TransportFactory = Arc<dyn Fn() -> TransportFuture + Send + Sync>;

/// Lifecycle of a protocol connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

struct Connection {
    state: ConnectionState,
    /// Incremented each time a connect attempt starts.
    attempt: u64,
    transport: Option<Arc<dyn Transport>>,
    server_info: Option<McpClientInfo>,
}

/// Puts an abandoned attempt back to `Disconnected` when `connect()` is
/// dropped mid-handshake, so the caller can retry.
struct ConnectingGuard {
    conn: Arc<RwLock<Connection>>,
    attempt: u64,
    armed: bool,
}

impl ConnectingGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

fn abandon_attempt(conn: &mut Connection, attempt: u64) {
    if conn.state == ConnectionState::Connecting && conn.attempt == attempt {
        conn.state = ConnectionState::Disconnected;
    }
}

impl Drop for ConnectingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let attempt = self.attempt;
        match self.conn.try_write() {
            Ok(mut conn) => abandon_attempt(&mut conn, attempt),
            Err(_) => {
                // Lock is busy; finish the rollback once it frees up.
                let conn = self.conn.clone();
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    runtime.spawn(async move {
                        abandon_attempt(&mut *conn.write().await, attempt);
                    });
                }
            }
        }
    }
}

/// Client for communicating with one MCP server.
///
/// Connection failures at [`connect`](Self::connect) are returned to the
/// caller. Once connected, [`call_tool`](Self::call_tool) degrades every
/// fault to an error string.
pub struct McpClient {
    name: String,
    factory: TransportFactory,
    conn: Arc<RwLock<Connection>>,
}

impl McpClient {
    /// Create a disconnected client for a stdio server.
    pub fn new(config: McpServerConfig) -> Self {
        let name = config.name.clone();
        let factory: TransportFactory = Arc::new(move || -> TransportFuture {
            let config = config.clone();
            Box::pin(async move {
                let (program, args) = config.argv();
                let transport = StdioTransport::connect(
                    &program,
                    &args,
                    &config.env,
                    Duration::from_secs(config.request_timeout_secs),
                )
                .await?;
                Ok(Arc::new(transport) as Arc<dyn Transport>)
            })
        });
        Self::with_transport_factory(name, factory)
    }

    /// Create a disconnected client over a custom transport.
    pub fn with_transport_factory(name: impl Into<String>, factory: TransportFactory) -> Self {
        Self {
            name: name.into(),
            factory,
            conn: Arc::new(RwLock::new(Connection {
                state: ConnectionState::Disconnected,
                attempt: 0,
                transport: None,
                server_info: None,
            })),
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.conn.read().await.state
    }

    /// Whether the connection is live.
    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Server identity reported during the handshake.
    pub async fn server_info(&self) -> Option<McpClientInfo> {
        self.conn.read().await.server_info.clone()
    }

    /// Manifest name for one of this server's tools.
    pub fn namespaced(&self, tool: &str) -> String {
        format!("{}{}{}", self.name, NAMESPACE_SEPARATOR, tool)
    }

    /// Strip this server's prefix from a manifest name, if present.
    pub fn strip_namespace<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_prefix(self.name.as_str())?
            .strip_prefix(NAMESPACE_SEPARATOR)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Spawn the server, open the transport and perform the handshake.
    ///
    /// On failure every partially acquired resource is released before the
    /// error is returned and the client goes back to `Disconnected`, so the
    /// caller may retry, drop the server, or abort. The same holds when the
    /// returned future is dropped before it completes.
    pub async fn connect(&self) -> Result<(), McpError> {
        let mut guard = {
            let mut conn = self.conn.write().await;
            match conn.state {
                ConnectionState::Disconnected => {
                    conn.state = ConnectionState::Connecting;
                    conn.attempt += 1;
                    ConnectingGuard {
                        conn: self.conn.clone(),
                        attempt: conn.attempt,
                        armed: true,
                    }
                }
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting => {
                    return Err(McpError::Connection(format!(
                        "connection to '{}' already in progress",
                        self.name
                    )));
                }
                ConnectionState::Closed => {
                    return Err(McpError::Connection(format!(
                        "client '{}' has been closed",
                        self.name
                    )));
                }
            }
        };

        info!(server = %self.name, "connecting to MCP server");
        let attempt = self.open_and_initialize().await;

        let mut conn = self.conn.write().await;
        guard.disarm();
        match attempt {
            Ok((transport, init)) if conn.state == ConnectionState::Connecting => {
                conn.state = ConnectionState::Connected;
                conn.transport = Some(transport);
                conn.server_info = init.server_info;
                info!(server = %self.name, "connected to MCP server");
                Ok(())
            }
            Ok((transport, _)) => {
                // close() ran while the handshake was in flight.
                drop(conn);
                release(&self.name, transport.as_ref()).await;
                Err(McpError::Connection(format!(
                    "client '{}' was closed while connecting",
                    self.name
                )))
            }
            Err(e) => {
                if conn.state == ConnectionState::Connecting {
                    conn.state = ConnectionState::Disconnected;
                }
                warn!(server = %self.name, error = %e, "failed to connect to MCP server");
                Err(e)
            }
        }
    }

    async fn open_and_initialize(
        &self,
    ) -> Result<(Arc<dyn Transport>, McpInitializeResult), McpError> {
        let transport = (self.factory)().await?;
        match initialize(transport.as_ref()).await {
            Ok(init) => Ok((transport, init)),
            Err(e) => {
                release(&self.name, transport.as_ref()).await;
                Err(e)
            }
        }
    }

    /// Close the connection. Safe to call from any state, any number of times.
    pub async fn close(&self) -> Result<(), McpError> {
        let transport = {
            let mut conn = self.conn.write().await;
            conn.state = ConnectionState::Closed;
            conn.server_info = None;
            conn.transport.take()
        };

        match transport {
            Some(transport) => {
                info!(server = %self.name, "closing MCP server");
                transport.shutdown().await
            }
            None => Ok(()),
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    async fn live_transport(&self) -> Result<Arc<dyn Transport>, McpError> {
        let conn = self.conn.read().await;
        match (&conn.state, &conn.transport) {
            (ConnectionState::Connected, Some(transport)) => Ok(transport.clone()),
            _ => Err(McpError::NotConnected(self.name.clone())),
        }
    }

    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        let transport = self.live_transport().await?;
        send_request(transport.as_ref(), method, params).await
    }

    /// List the server's tools with their un-namespaced names.
    ///
    /// A client that is not connected has no tools.
    pub async fn list_tools(&self) -> Result<Vec<McpToolInfo>, McpError> {
        if !self.is_connected().await {
            return Ok(Vec::new());
        }
        let result = self.request("tools/list", None).await?;
        let listed: McpToolsListResult = serde_json::from_value(result)?;
        Ok(listed.tools)
    }

    /// Call a remote tool and return the raw protocol result.
    pub async fn call_remote(
        &self,
        remote_name: &str,
        arguments: serde_json::Value,
    ) -> Result<McpToolResult, McpError> {
        let params = serde_json::json!({
            "name": remote_name,
            "arguments": arguments
        });
        let result = self.request("tools/call", Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Call a tool by its manifest name and return the result as text.
    ///
    /// The `{server}__` prefix is stripped before forwarding. Never fails:
    /// a disconnected client or any protocol fault yields an error string.
    pub async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> String {
        let remote_name = self.strip_namespace(name).unwrap_or(name);
        match self.call_remote(remote_name, arguments).await {
            Ok(result) => result.to_text(),
            Err(e) => {
                warn!(server = %self.name, tool = %remote_name, error = %e, "remote tool call failed");
                format!("Error: {}", e)
            }
        }
    }

    /// Ping the server to check if it's alive.
    pub async fn ping(&self) -> Result<(), McpError> {
        self.request("ping", None).await?;
        Ok(())
    }
}

async fn send_request(
    transport: &dyn Transport,
    method: &str,
    params: Option<serde_json::Value>,
) -> Result<serde_json::Value, McpError> {
    let response = transport.send(McpRequest::new(method, params)).await?;

    if let Some(error) = response.error {
        return Err(McpError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    response
        .result
        .ok_or_else(|| McpError::Protocol("No result in response".into()))
}

async fn initialize(transport: &dyn Transport) -> Result<McpInitializeResult, McpError> {
    let params = serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        }
    });

    let result = send_request(transport, "initialize", Some(params)).await?;
    let init: McpInitializeResult = serde_json::from_value(result)?;

    transport
        .notify(McpNotification::new("notifications/initialized", None))
        .await?;

    Ok(init)
}

async fn release(name: &str, transport: &dyn Transport) {
    if let Err(e) = transport.shutdown().await {
        warn!(server = %name, error = %e, "failed to release MCP transport");
    }
}
