// ABOUTME: Integration tests verifying modules work together.
// ABOUTME: Runs full parent/subagent workflows against in-memory model and MCP fakes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flock::mcp::{McpNotification, McpRequest, McpResponse, TransportFuture};
use flock::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A test tool for integration testing.
struct GreetTool;

#[async_trait]
impl Tool for GreetTool {
    fn name(&self) -> &str {
        "greet"
    }

    fn description(&self) -> &str {
        "Greet a person by name"
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The name to greet"
                }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, anyhow::Error> {
        let name = params["name"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing name parameter"))?;
        Ok(ToolResult::text(format!("Hello, {}!", name)))
    }
}

/// An MCP server living in memory. Serves a single `get` tool.
struct FetchServer {
    calls: Mutex<Vec<serde_json::Value>>,
}

#[async_trait]
impl Transport for FetchServer {
    async fn send(&self, request: McpRequest) -> Result<McpResponse, McpError> {
        let params = request.params.clone().unwrap_or_default();
        Ok(match request.method.as_str() {
            "initialize" => McpResponse::success(
                request.id,
                serde_json::json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "fetch-server", "version": "0.3.0"}
                }),
            ),
            "tools/list" => McpResponse::success(
                request.id,
                serde_json::json!({"tools": [{
                    "name": "get",
                    "description": "Fetch a URL",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"url": {"type": "string"}},
                        "required": ["url"]
                    }
                }]}),
            ),
            "tools/call" => {
                self.calls.lock().unwrap().push(params.clone());
                let url = params["arguments"]["url"].as_str().unwrap_or_default();
                McpResponse::success(
                    request.id,
                    serde_json::json!({"content": [{"type": "text", "text": format!("<html>{}</html>", url)}]}),
                )
            }
            other => McpResponse::failure(request.id, -32601, format!("unknown method {}", other)),
        })
    }

    async fn notify(&self, _notification: McpNotification) -> Result<(), McpError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), McpError> {
        Ok(())
    }
}

fn fetch_client(server: Arc<FetchServer>) -> McpClient {
    McpClient::with_transport_factory(
        "fetcher",
        Arc::new(move || -> TransportFuture {
            let server = server.clone();
            Box::pin(async move { Ok(server as Arc<dyn Transport>) })
        }),
    )
}

/// Plays a script for the parent agent and answers every subagent directly.
struct WorkflowClient {
    parent: Mutex<VecDeque<Response>>,
    parent_requests: Mutex<Vec<Request>>,
}

impl WorkflowClient {
    fn new(script: Vec<Response>) -> Self {
        Self {
            parent: Mutex::new(script.into()),
            parent_requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmClient for WorkflowClient {
    async fn generate(&self, request: &Request) -> Result<Response, LlmError> {
        let is_subagent = request
            .messages
            .first()
            .is_some_and(|m| m.role == Role::System && m.content.starts_with("# Subagent"));
        if is_subagent {
            let task = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            tokio::time::sleep(Duration::from_millis(20)).await;
            return Ok(Response::text(format!("finding for {}", task)));
        }

        self.parent_requests.lock().unwrap().push(request.clone());
        self.parent
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Configuration("parent script exhausted".into()))
    }
}

fn calls(calls: Vec<(&str, &str, serde_json::Value)>) -> Response {
    Response::with_tool_calls(
        calls
            .into_iter()
            .map(|(id, name, args)| ToolCall::new(id, name, args.to_string()))
            .collect(),
    )
}

#[tokio::test]
async fn test_parent_agent_with_remote_tools_and_subagents() {
    init_tracing();

    let config = AgentConfig::from_json_str(
        r#"{"model": "parent-model", "max_iterations": 6,
            "subagent": {"max_iterations": 3, "timeout_secs": 5}}"#,
    )
    .unwrap();

    let registry = Registry::new();
    registry.register(GreetTool).await;

    let server = Arc::new(FetchServer {
        calls: Mutex::new(Vec::new()),
    });
    let mcp = Arc::new(fetch_client(server.clone()));
    mcp.connect().await.unwrap();
    registry.attach_mcp(mcp.clone()).await;

    let client = Arc::new(WorkflowClient::new(vec![
        calls(vec![
            ("c1", "fetcher__get", serde_json::json!({"url": "https://example.com"})),
            ("c2", "greet", serde_json::json!({"name": "Ada"})),
        ]),
        calls(vec![(
            "c3",
            "parallel_spawn",
            serde_json::json!({"tasks": [{"task": "read docs"}, {"task": "read code", "label": "code"}]}),
        )]),
        calls(vec![("c4", "wait_subagents", serde_json::json!({}))]),
        Response::text("Everything is summarized."),
    ]));

    let store = MemorySessionStore::shared();
    let orchestrator = SubagentOrchestrator::new(
        client.clone(),
        registry.clone(),
        config.subagent.clone(),
        store.clone(),
    );
    registry.register(SpawnTool::new(orchestrator.clone())).await;
    registry.register(ParallelSpawnTool::new(orchestrator.clone())).await;
    registry.register(WaitSubagentsTool::new(orchestrator.clone())).await;

    let mut parent = ControlLoop::new(
        config.agent_definition("main", "You coordinate work."),
        client.clone(),
        registry.clone(),
    );
    let outcome = parent.run("Research the project").await;

    assert_eq!(outcome.state, LoopState::Completed);
    assert_eq!(outcome.iterations, 4);
    assert_eq!(outcome.tool_use_count, 4);
    assert_eq!(outcome.content, "Everything is summarized.");

    // Remote call went to the server under its own name.
    let server_calls = server.calls.lock().unwrap().clone();
    assert_eq!(server_calls.len(), 1);
    assert_eq!(server_calls[0]["name"], "get");

    let tool_results: Vec<_> = parent
        .transcript()
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.content.clone())
        .collect();
    assert_eq!(tool_results[0], "<html>https://example.com</html>");
    assert_eq!(tool_results[1], "Hello, Ada!");
    assert!(tool_results[2].contains("Subagent [code] started"));
    assert!(tool_results[3].starts_with("Waited for 2 subagent(s)."));
    assert!(tool_results[3].contains("finding for read docs"));

    // The parent's manifest mixed local, remote, and orchestrator tools.
    let first_request = client.parent_requests.lock().unwrap()[0].clone();
    let names: Vec<_> = first_request.tools.iter().map(|t| t.name.clone()).collect();
    assert!(names.contains(&"greet".to_string()));
    assert!(names.contains(&"fetcher__get".to_string()));
    assert!(names.contains(&"spawn".to_string()));
    assert_eq!(first_request.model.as_deref(), Some("parent-model"));

    assert_eq!(orchestrator.list_results().await.len(), 2);
    assert_eq!(orchestrator.running_count().await, 0);

    for _ in 0..200 {
        if let Some(session) = store.get("cli:direct").await {
            if session.messages.len() == 2 {
                assert!(session
                    .messages
                    .iter()
                    .all(|m| m.content.contains("completed successfully")));
                registry.close_all().await;
                assert_eq!(mcp.state().await, ConnectionState::Closed);
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("announcements never reached the session store");
}

#[tokio::test]
async fn test_connect_failure_leaves_nothing_attached() {
    init_tracing();
    let registry = Registry::new();

    let err = registry
        .connect_mcp(McpServerConfig::new(
            "broken",
            "/nonexistent/flock-mcp-server",
            vec![],
        ))
        .await;
    assert!(err.is_err());
    assert!(registry.mcp_clients().await.is_empty());
    assert!(registry.manifest().await.is_empty());

    let client = McpClient::new(McpServerConfig::new(
        "broken",
        "/nonexistent/flock-mcp-server",
        vec![],
    ));
    assert!(client.connect().await.is_err());
    assert_eq!(client.state().await, ConnectionState::Disconnected);
    client.close().await.unwrap();
    client.close().await.unwrap();
    assert_eq!(client.state().await, ConnectionState::Closed);
    assert!(client.call_tool("broken__x", serde_json::json!({})).await.starts_with("Error: "));
}

#[tokio::test]
async fn test_connect_all_reports_each_configured_server() {
    init_tracing();
    let config = AgentConfig::from_json_str(
        r#"{"mcp_servers": [
            {"name": "first", "command": "/nonexistent/flock-first"},
            {"name": "second", "command": "/nonexistent/flock-second", "args": ["--stdio"]}
        ]}"#,
    )
    .unwrap();
    let registry = Registry::new();

    let outcomes = registry.connect_all(&config.mcp_servers).await;

    let names: Vec<_> = outcomes.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
    assert!(outcomes.iter().all(|(_, outcome)| outcome.is_err()));
    assert!(registry.mcp_clients().await.is_empty());
}

#[tokio::test]
async fn test_dispatch_never_fails() {
    let registry = Registry::new();
    registry.register(GreetTool).await;

    let cases = [
        ("__unknown__", "{}"),
        ("greet", "{}"),
        ("greet", "[1, 2]"),
        ("greet", "not json"),
        ("greet", r#"{"name": 42}"#),
    ];
    for (name, args) in cases {
        let out = registry.dispatch_json(name, args).await;
        assert!(out.starts_with("Error: "), "{} {} -> {}", name, args, out);
    }
    assert_eq!(registry.dispatch_json("greet", r#"{"name": "Bo"}"#).await, "Hello, Bo!");
}
