// ABOUTME: In-memory MCP server used by unit tests.
// ABOUTME: Answers initialize, tools/list and tools/call without a subprocess.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    McpClient, McpNotification, McpRequest, McpResponse, Transport, TransportFactory,
    TransportFuture,
};
use crate::error::McpError;

/// A scripted server: every call to a known tool echoes its name and arguments.
pub(crate) struct FakeServer {
    tools: Mutex<Vec<serde_json::Value>>,
    pub calls: Mutex<Vec<(String, serde_json::Value)>>,
    pub fail_initialize: AtomicBool,
    pub shutdowns: AtomicUsize,
}

impl FakeServer {
    pub fn new(tools: Vec<serde_json::Value>) -> Arc<Self> {
        Arc::new(Self {
            tools: Mutex::new(tools),
            calls: Mutex::new(Vec::new()),
            fail_initialize: AtomicBool::new(false),
            shutdowns: AtomicUsize::new(0),
        })
    }

    pub async fn set_tools(&self, tools: Vec<serde_json::Value>) {
        *self.tools.lock().await = tools;
    }

    /// A client whose every connection attempt talks to this server.
    pub fn client(self: &Arc<Self>, name: &str) -> McpClient {
        let server = self.clone();
        let factory: TransportFactory = Arc::new(move || -> TransportFuture {
            let server = server.clone();
            Box::pin(async move { Ok(server as Arc<dyn Transport>) })
        });
        McpClient::with_transport_factory(name, factory)
    }
}

pub(crate) fn tool_info(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "description": format!("Remote {}", name),
        "inputSchema": {
            "type": "object",
            "properties": {"url": {"type": "string"}},
            "required": ["url"]
        }
    })
}

#[async_trait]
impl Transport for FakeServer {
    async fn send(&self, request: McpRequest) -> Result<McpResponse, McpError> {
        let params = request.params.clone().unwrap_or_default();
        let response = match request.method.as_str() {
            "initialize" if self.fail_initialize.load(Ordering::SeqCst) => {
                McpResponse::failure(request.id, -32603, "initialize refused")
            }
            "initialize" => McpResponse::success(
                request.id,
                serde_json::json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "fake", "version": "1.0"}
                }),
            ),
            "tools/list" => {
                let tools = self.tools.lock().await.clone();
                McpResponse::success(request.id, serde_json::json!({ "tools": tools }))
            }
            "tools/call" => {
                let name = params["name"].as_str().unwrap_or_default().to_string();
                let arguments = params["arguments"].clone();
                self.calls.lock().await.push((name.clone(), arguments.clone()));
                if name == "explode" {
                    McpResponse::success(
                        request.id,
                        serde_json::json!({
                            "content": [{"type": "text", "text": "boom"}],
                            "isError": true
                        }),
                    )
                } else {
                    McpResponse::success(
                        request.id,
                        serde_json::json!({
                            "content": [{"type": "text", "text": format!("{} {}", name, arguments)}]
                        }),
                    )
                }
            }
            "ping" => McpResponse::success(request.id, serde_json::json!({})),
            other => McpResponse::failure(request.id, -32601, format!("unknown method {}", other)),
        };
        Ok(response)
    }

    async fn notify(&self, _notification: McpNotification) -> Result<(), McpError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), McpError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
