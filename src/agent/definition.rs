// ABOUTME: Agent definition - the configuration one control-loop run is built from.
// ABOUTME: System prompt, model override, iteration cap, and tool restrictions.

/// Default iteration cap for a top-level agent.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Definition of one agent run.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    /// Short identifier used in logs.
    pub name: String,

    /// Model to use. If None, the model client's default is used.
    pub model: Option<String>,

    /// System prompt placed first in the transcript.
    pub system_prompt: String,

    /// Tools this agent is allowed to use (allowlist).
    /// If None, every tool in the registry is visible.
    pub allowed_tools: Option<Vec<String>>,

    /// Tools this agent is denied from using (denylist).
    /// Takes precedence over allowed_tools.
    pub denied_tools: Vec<String>,

    /// Maximum iterations for the control loop.
    pub max_iterations: usize,

    /// Per-request output token limit.
    pub max_tokens: Option<u32>,
}

impl AgentDefinition {
    /// Create a new agent definition with required fields.
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: None,
            system_prompt: system_prompt.into(),
            allowed_tools: None,
            denied_tools: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tokens: None,
        }
    }

    /// Set the model for this agent.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set or clear the model override.
    pub fn model_opt(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Set allowed tools (allowlist).
    pub fn allowed_tools(mut self, tools: Vec<String>) -> Self {
        self.allowed_tools = Some(tools);
        self
    }

    /// Set denied tools (denylist).
    pub fn denied_tools(mut self, tools: Vec<String>) -> Self {
        self.denied_tools = tools;
        self
    }

    /// Set maximum iterations.
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the per-request output token limit.
    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_definition_builder() {
        let def = AgentDefinition::new("researcher", "You are a research assistant.")
            .model("gpt-4o")
            .allowed_tools(vec!["search".into(), "read_file".into()])
            .denied_tools(vec!["write_file".into()])
            .max_iterations(5)
            .max_tokens(1024);

        assert_eq!(def.name, "researcher");
        assert_eq!(def.model, Some("gpt-4o".into()));
        assert_eq!(
            def.allowed_tools,
            Some(vec!["search".into(), "read_file".into()])
        );
        assert_eq!(def.denied_tools, vec!["write_file".to_string()]);
        assert_eq!(def.max_iterations, 5);
        assert_eq!(def.max_tokens, Some(1024));
    }

    #[test]
    fn test_agent_definition_defaults() {
        let def = AgentDefinition::new("main", "prompt").model_opt(None);
        assert_eq!(def.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert!(def.model.is_none());
        assert!(def.allowed_tools.is_none());
        assert!(def.denied_tools.is_empty());
    }
}
