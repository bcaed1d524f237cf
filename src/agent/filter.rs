// ABOUTME: FilteredRegistry - a decorator that restricts tool access.
// ABOUTME: Implements allowlist/denylist filtering on top of a base Registry.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::llm::ToolDefinition;
use crate::tool::{Registry, Tool, ToolSet, dispatch_failure};

/// A filtered view of a Registry that restricts tool access.
///
/// Wraps a Registry and filters both the manifest and dispatch by
/// allowlist/denylist rules. Denylist takes precedence. Rules match the
/// manifest name, so remote tools are filtered by their namespaced name.
#[derive(Clone)]
pub struct FilteredRegistry {
    source: Registry,
    allowed_tools: Option<Vec<String>>,
    denied_tools: Vec<String>,
}

impl FilteredRegistry {
    /// Create a new filtered registry from a source registry.
    pub fn new(source: Registry) -> Self {
        Self {
            source,
            allowed_tools: None,
            denied_tools: Vec::new(),
        }
    }

    /// Set the allowlist of tools. If None, all tools are allowed.
    pub fn allowed(mut self, tools: Option<Vec<String>>) -> Self {
        self.allowed_tools = tools;
        self
    }

    /// Set the denylist of tools. Takes precedence over allowlist.
    pub fn denied(mut self, tools: Vec<String>) -> Self {
        self.denied_tools = tools;
        self
    }

    /// Check if a tool name passes the filter.
    pub fn is_allowed(&self, name: &str) -> bool {
        // Denylist always wins
        if self.denied_tools.iter().any(|d| d == name) {
            return false;
        }

        match &self.allowed_tools {
            None => true,
            Some(allowed) => allowed.iter().any(|a| a == name),
        }
    }

    /// Get a local tool by name if it passes the filter.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        if !self.is_allowed(name) {
            return None;
        }
        self.source.get(name).await
    }

    /// List local tool names that pass the filter.
    pub async fn list(&self) -> Vec<String> {
        self.source
            .list()
            .await
            .into_iter()
            .filter(|name| self.is_allowed(name))
            .collect()
    }

    /// Get the number of local tools that pass the filter.
    pub async fn count(&self) -> usize {
        self.list().await.len()
    }
}

#[async_trait]
impl ToolSet for FilteredRegistry {
    async fn manifest(&self) -> Vec<ToolDefinition> {
        self.source
            .manifest()
            .await
            .into_iter()
            .filter(|d| self.is_allowed(&d.name))
            .collect()
    }

    async fn dispatch_json(&self, name: &str, arguments: &str) -> String {
        if !self.is_allowed(name) {
            return dispatch_failure(name, ToolError::NotFound(name.to_string()));
        }
        self.source.dispatch_json(name, arguments).await
    }
}
