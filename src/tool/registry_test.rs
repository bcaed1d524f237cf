// ABOUTME: Tests for tool Registry - registration, manifest, dispatch, and
// ABOUTME: routing to MCP servers. Uses mock tools and an in-memory server.

use std::sync::Arc;

use super::*;
use crate::mcp::testing::{FakeServer, tool_info};

/// A simple test tool.
struct EchoTool;

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes input back"
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": { "type": "string" }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, anyhow::Error> {
        let message = params["message"].as_str().unwrap_or("");
        if message == "fail" {
            anyhow::bail!("asked to fail");
        }
        if message == "panic" {
            panic!("asked to panic");
        }
        Ok(ToolResult::text(message))
    }
}

fn local_get() -> NativeTool {
    NativeTool::new("get", "Local get", |_| async { Ok("local".to_string()) })
}

#[tokio::test]
async fn test_register_and_get() {
    let registry = Registry::new();
    registry.register(EchoTool).await;

    let tool = registry.get("echo").await;
    assert!(tool.is_some());
    assert_eq!(tool.unwrap().name(), "echo");
    assert!(registry.has("echo").await);
    assert!(!registry.has("nonexistent").await);
}

#[tokio::test]
async fn test_register_overwrites_by_name() {
    let registry = Registry::new();
    registry
        .register(NativeTool::new("echo", "first", |_| async { Ok("1".into()) }))
        .await;
    registry
        .register(NativeTool::new("echo", "second", |_| async { Ok("2".into()) }))
        .await;

    assert_eq!(registry.count().await, 1);
    assert_eq!(registry.dispatch("echo", serde_json::json!({})).await, "2");
}

#[tokio::test]
async fn test_unregister_then_dispatch_is_not_found() {
    let registry = Registry::new();
    registry.register(EchoTool).await;
    registry.unregister("echo").await;
    registry.unregister("echo").await;

    assert_eq!(registry.count().await, 0);
    let out = registry
        .dispatch("echo", serde_json::json!({"message": "hi"}))
        .await;
    assert!(out.contains("not found"));
}

#[tokio::test]
async fn test_list_sorted() {
    let registry = Registry::new();
    registry.register(local_get()).await;
    registry.register(EchoTool).await;

    assert_eq!(registry.list().await, vec!["echo", "get"]);
}

#[tokio::test]
async fn test_clone_shares_state() {
    let registry = Registry::new();
    let clone = registry.clone();

    registry.register(EchoTool).await;
    assert_eq!(clone.count().await, 1);
}

#[tokio::test]
async fn test_dispatch_valid_args() {
    let registry = Registry::new();
    registry.register(EchoTool).await;

    let out = registry
        .dispatch("echo", serde_json::json!({"message": "hello"}))
        .await;
    assert_eq!(out, "hello");
}

#[tokio::test]
async fn test_dispatch_unknown_tool() {
    let registry = Registry::new();
    let out = registry.dispatch("__unknown__", serde_json::json!({})).await;
    assert!(out.contains("not found"));
}

#[tokio::test]
async fn test_dispatch_invalid_params_aggregates() {
    let registry = Registry::new();
    registry
        .register(
            NativeTool::new("configure", "Configure", |_| async { Ok("ok".into()) }).with_schema(
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "config": {
                            "type": "object",
                            "properties": {"key": {"type": "string"}},
                            "required": ["key"]
                        },
                        "level": {"type": "integer", "maximum": 3}
                    },
                    "required": ["config"]
                }),
            ),
        )
        .await;

    let out = registry
        .dispatch("configure", serde_json::json!({"config": {}, "level": 9}))
        .await;
    assert!(out.contains("invalid parameters for tool 'configure'"));
    assert!(out.contains("missing required config.key"));
    assert!(out.contains("level must be <= 3"));
}

#[tokio::test]
async fn test_dispatch_execution_error_is_text() {
    let registry = Registry::new();
    registry.register(EchoTool).await;

    let out = registry
        .dispatch("echo", serde_json::json!({"message": "fail"}))
        .await;
    assert_eq!(out, "error executing echo: asked to fail");
}

#[tokio::test]
async fn test_dispatch_panic_is_contained() {
    let registry = Registry::new();
    registry.register(EchoTool).await;

    let out = registry
        .dispatch("echo", serde_json::json!({"message": "panic"}))
        .await;
    assert!(out.starts_with("error executing echo"));
}

#[tokio::test]
async fn test_dispatch_json_malformed_arguments() {
    let registry = Registry::new();
    registry.register(EchoTool).await;

    let out = registry.dispatch_json("echo", "{\"message\": ").await;
    assert!(out.contains("malformed arguments for tool 'echo'"));

    let out = registry.dispatch_json("echo", r#"{"message": "ok"}"#).await;
    assert_eq!(out, "ok");
}

#[tokio::test]
async fn test_dispatch_json_blank_arguments_mean_empty_object() {
    let registry = Registry::new();
    registry.register(local_get()).await;
    assert_eq!(registry.dispatch_json("get", "").await, "local");
}

#[tokio::test]
async fn test_manifest_merges_local_and_remote() {
    let registry = Registry::new();
    registry.register(EchoTool).await;

    let server = FakeServer::new(vec![tool_info("get"), tool_info("head")]);
    let client = Arc::new(server.client("fetcher"));
    client.connect().await.unwrap();
    registry.attach_mcp(client).await;

    let manifest = registry.manifest().await;
    let names: Vec<_> = manifest.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["echo", "fetcher__get", "fetcher__head"]);
    assert_eq!(manifest[1].description, "Remote get");
    assert_eq!(manifest[1].parameters["required"][0], "url");
}

#[tokio::test]
async fn test_manifest_is_fetched_fresh() {
    let registry = Registry::new();
    let server = FakeServer::new(vec![tool_info("get")]);
    let client = Arc::new(server.client("fetcher"));
    client.connect().await.unwrap();
    registry.attach_mcp(client).await;

    assert_eq!(registry.manifest().await.len(), 1);
    server.set_tools(vec![tool_info("get"), tool_info("post")]).await;
    assert_eq!(registry.manifest().await.len(), 2);
}

#[tokio::test]
async fn test_manifest_skips_disconnected_servers() {
    let registry = Registry::new();
    let server = FakeServer::new(vec![tool_info("get")]);
    registry.attach_mcp(Arc::new(server.client("idle"))).await;

    assert!(registry.manifest().await.is_empty());
}

#[tokio::test]
async fn test_namespaced_name_routes_to_server_not_local() {
    let registry = Registry::new();
    registry.register(local_get()).await;

    let server = FakeServer::new(vec![tool_info("get")]);
    let client = Arc::new(server.client("fetcher"));
    client.connect().await.unwrap();
    registry.attach_mcp(client).await;

    let out = registry
        .dispatch("fetcher__get", serde_json::json!({"url": "https://example.com"}))
        .await;
    assert!(out.starts_with("get "));
    assert!(out.contains("example.com"));

    let calls = server.calls.lock().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "get");
    drop(calls);

    assert_eq!(registry.dispatch("get", serde_json::json!({})).await, "local");
}

#[tokio::test]
async fn test_local_name_shadowed_by_server_namespace_listed_once() {
    let registry = Registry::new();
    registry
        .register(NativeTool::new("fetcher__get", "Local lookalike", |_| async {
            Ok("local".to_string())
        }))
        .await;

    let server = FakeServer::new(vec![tool_info("get")]);
    let client = Arc::new(server.client("fetcher"));
    client.connect().await.unwrap();
    registry.attach_mcp(client).await;

    let manifest = registry.manifest().await;
    let names: Vec<&str> = manifest.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["fetcher__get"]);
    assert_eq!(manifest[0].description, "Remote get");

    let out = registry
        .dispatch("fetcher__get", serde_json::json!({"url": "https://example.com"}))
        .await;
    assert!(out.starts_with("get "));
    assert_eq!(server.calls.lock().await.len(), 1);
}

#[tokio::test]
async fn test_remote_args_are_validated() {
    let registry = Registry::new();
    let server = FakeServer::new(vec![tool_info("get")]);
    let client = Arc::new(server.client("fetcher"));
    client.connect().await.unwrap();
    registry.attach_mcp(client).await;

    let out = registry.dispatch("fetcher__get", serde_json::json!({})).await;
    assert!(out.contains("missing required url"));
    assert!(server.calls.lock().await.is_empty());
}

#[tokio::test]
async fn test_remote_unknown_tool_is_not_found() {
    let registry = Registry::new();
    let server = FakeServer::new(vec![tool_info("get")]);
    let client = Arc::new(server.client("fetcher"));
    client.connect().await.unwrap();
    registry.attach_mcp(client).await;

    let out = registry.dispatch("fetcher__delete", serde_json::json!({})).await;
    assert!(out.contains("not found"));
}

#[tokio::test]
async fn test_disconnect_removes_remote_tools() {
    let registry = Registry::new();
    let server = FakeServer::new(vec![tool_info("get")]);
    let client = Arc::new(server.client("fetcher"));
    client.connect().await.unwrap();
    registry.attach_mcp(client.clone()).await;

    assert!(registry.disconnect_mcp("fetcher").await.unwrap());
    assert!(!registry.disconnect_mcp("fetcher").await.unwrap());
    assert!(registry.manifest().await.is_empty());
    assert!(registry.mcp_clients().await.is_empty());

    let out = registry
        .dispatch("fetcher__get", serde_json::json!({"url": "x"}))
        .await;
    assert!(out.contains("not found"));
}

#[tokio::test]
async fn test_close_all() {
    let registry = Registry::new();
    let server = FakeServer::new(vec![]);
    let client = Arc::new(server.client("a"));
    client.connect().await.unwrap();
    registry.attach_mcp(client.clone()).await;

    registry.close_all().await;
    assert!(registry.mcp_clients().await.is_empty());
    assert_eq!(
        client.state().await,
        crate::mcp::ConnectionState::Closed
    );
}
