// ABOUTME: Configuration for agents, subagents, and MCP servers.
// ABOUTME: Loaded from JSON with serde defaults, then validated as a whole.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentDefinition, DEFAULT_MAX_ITERATIONS};
use crate::error::ConfigError;
use crate::mcp::{McpServerConfig, NAMESPACE_SEPARATOR};

/// Tool names hidden from subagents unless configured otherwise.
pub const DEFAULT_SUBAGENT_DENIED_TOOLS: &[&str] =
    &["spawn", "parallel_spawn", "wait_subagents", "message"];

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_subagent_max_iterations() -> usize {
    15
}

fn default_subagent_timeout_secs() -> Option<u64> {
    Some(600)
}

fn default_denied_tools() -> Vec<String> {
    DEFAULT_SUBAGENT_DENIED_TOOLS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Default model id; None lets the model client choose.
    #[serde(default)]
    pub model: Option<String>,

    /// Iteration cap for the parent control loop.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default)]
    pub subagent: SubagentConfig,

    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_iterations: default_max_iterations(),
            subagent: SubagentConfig::default(),
            mcp_servers: Vec::new(),
        }
    }
}

/// Limits and restrictions applied to every spawned subagent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentConfig {
    /// Iteration cap for each subagent's control loop.
    #[serde(default = "default_subagent_max_iterations")]
    pub max_iterations: usize,

    /// Wall-clock bound per subagent. `null` disables it.
    #[serde(default = "default_subagent_timeout_secs")]
    pub timeout_secs: Option<u64>,

    /// Tools a subagent may never see.
    #[serde(default = "default_denied_tools")]
    pub denied_tools: Vec<String>,

    /// Model override for subagents.
    #[serde(default)]
    pub model: Option<String>,

    /// Workspace path mentioned in the subagent prompt.
    #[serde(default)]
    pub workspace: Option<PathBuf>,
}

impl Default for SubagentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_subagent_max_iterations(),
            timeout_secs: default_subagent_timeout_secs(),
            denied_tools: default_denied_tools(),
            model: None,
            workspace: None,
        }
    }
}

impl SubagentConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl AgentConfig {
    /// Definition for the parent agent, carrying the configured model and
    /// iteration cap.
    pub fn agent_definition(
        &self,
        name: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> AgentDefinition {
        AgentDefinition::new(name, system_prompt)
            .model_opt(self.model.clone())
            .max_iterations(self.max_iterations)
    }

    /// Read, parse, and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values for consistency. Reports every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.max_iterations == 0 {
            errors.push("max_iterations must be greater than 0".into());
        }
        if self.subagent.max_iterations == 0 {
            errors.push("subagent.max_iterations must be greater than 0".into());
        }
        if self.subagent.timeout_secs == Some(0) {
            errors.push("subagent.timeout_secs must be greater than 0 or null".into());
        }

        let mut seen: Vec<&str> = Vec::new();
        for server in &self.mcp_servers {
            if server.name.is_empty() {
                errors.push("mcp server name must not be empty".into());
            } else if server.name.contains(NAMESPACE_SEPARATOR) {
                errors.push(format!(
                    "mcp server name '{}' must not contain '{}'",
                    server.name, NAMESPACE_SEPARATOR
                ));
            }
            if seen.contains(&server.name.as_str()) {
                errors.push(format!("duplicate mcp server name '{}'", server.name));
            }
            seen.push(&server.name);
            if server.argv().0.is_empty() {
                errors.push(format!("mcp server '{}' has no command", server.name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors.join("; ")))
        }
    }
}
