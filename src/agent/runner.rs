// ABOUTME: ControlLoop - drives one bounded model/tool conversation.
// ABOUTME: Manifest -> generate -> dispatch calls in order -> repeat until done or capped.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::definition::AgentDefinition;
use super::filter::FilteredRegistry;
use crate::error::LlmError;
use crate::llm::{LlmClient, Message, Request, Usage};
use crate::tool::{Registry, ToolSet};

/// Returned as the answer when a run ends without any non-empty model text.
pub const NO_RESPONSE: &str = "No response generated.";

/// Where a control loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Iterating,
    /// The model replied without tool calls.
    Completed,
    /// The iteration cap was reached first.
    Exhausted,
}

/// Result from running a control loop.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Final answer, or the best partial answer on exhaustion.
    pub content: String,

    /// Terminal state: `Completed` or `Exhausted`.
    pub state: LoopState,

    /// Number of model calls made.
    pub iterations: usize,

    /// Number of tool calls dispatched.
    pub tool_use_count: usize,

    /// Total token usage across all model calls.
    pub usage: Usage,

    /// Model calls that failed and were recorded in the transcript.
    pub model_failures: usize,

    /// Text of the most recent model failure, if any.
    pub last_error: Option<String>,
}

impl LoopOutcome {
    pub fn is_completed(&self) -> bool {
        self.state == LoopState::Completed
    }

    /// Whether every model call in the run failed.
    pub fn all_model_calls_failed(&self) -> bool {
        self.iterations > 0 && self.model_failures == self.iterations
    }
}

/// Running totals for one pass through the loop.
#[derive(Default)]
struct Tally {
    iterations: usize,
    tool_use_count: usize,
    usage: Usage,
    last_content: Option<String>,
    model_failures: usize,
    last_error: Option<String>,
}

/// One bounded conversation between a model client and a tool set.
///
/// The transcript belongs to this loop alone; callers only read it back
/// after [`run`](Self::run) returns.
pub struct ControlLoop {
    definition: AgentDefinition,
    client: Arc<dyn LlmClient>,
    tools: Arc<dyn ToolSet>,
    messages: Vec<Message>,
    state: LoopState,
}

impl ControlLoop {
    /// Create a loop over a registry, filtered by the definition's
    /// allowlist and denylist.
    pub fn new(definition: AgentDefinition, client: Arc<dyn LlmClient>, registry: Registry) -> Self {
        let tools = FilteredRegistry::new(registry)
            .allowed(definition.allowed_tools.clone())
            .denied(definition.denied_tools.clone());
        Self::with_tools(definition, client, Arc::new(tools))
    }

    /// Create a loop over an arbitrary tool set.
    pub fn with_tools(
        definition: AgentDefinition,
        client: Arc<dyn LlmClient>,
        tools: Arc<dyn ToolSet>,
    ) -> Self {
        Self {
            definition,
            client,
            tools,
            messages: Vec::new(),
            state: LoopState::Idle,
        }
    }

    /// Seed the transcript with prior history. Must be called before `run`.
    pub fn fork_messages(&mut self, history: Vec<Message>) {
        self.messages = history;
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The transcript so far.
    pub fn transcript(&self) -> &[Message] {
        &self.messages
    }

    /// Run the loop on a task.
    ///
    /// Neither tool faults nor model-client failures end the run. A failed
    /// model call is written into the transcript as an `Error: ...` system
    /// message and the loop moves on to its next iteration, so the run always
    /// ends `Completed` or `Exhausted`.
    pub async fn run(&mut self, task: &str) -> LoopOutcome {
        match self.drive(task, false).await {
            Ok(outcome) => outcome,
            // Unreachable without fail_fast.
            Err(e) => self.degraded(e),
        }
    }

    /// Like [`run`](Self::run), but stops at the first model-client failure
    /// and returns it.
    pub async fn try_run(&mut self, task: &str) -> Result<LoopOutcome, LlmError> {
        self.drive(task, true).await
    }

    async fn drive(&mut self, task: &str, fail_fast: bool) -> Result<LoopOutcome, LlmError> {
        if !self.definition.system_prompt.is_empty() {
            self.messages
                .insert(0, Message::system(&self.definition.system_prompt));
        }
        self.messages.push(Message::user(task));
        self.state = LoopState::Iterating;

        let mut tally = Tally::default();

        while tally.iterations < self.definition.max_iterations {
            tally.iterations += 1;

            let manifest = self.tools.manifest().await;
            let mut request = Request::new(self.messages.clone())
                .model(self.definition.model.clone())
                .tools(manifest);
            if let Some(max_tokens) = self.definition.max_tokens {
                request = request.max_tokens(max_tokens);
            }

            debug!(
                agent = %self.definition.name,
                iteration = tally.iterations,
                tools = request.tools.len(),
                "calling model"
            );
            let response = match self.client.generate(&request).await {
                Ok(response) => response,
                Err(e) if fail_fast => {
                    self.state = LoopState::Idle;
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        agent = %self.definition.name,
                        iteration = tally.iterations,
                        error = %e,
                        "model call failed"
                    );
                    let text = format!("Error: model call failed: {}", e);
                    self.messages.push(Message::system(&text));
                    tally.model_failures += 1;
                    tally.last_error = Some(text);
                    continue;
                }
            };

            tally.usage.input_tokens += response.usage.input_tokens;
            tally.usage.output_tokens += response.usage.output_tokens;

            let text = response.content.clone().unwrap_or_default();
            if let Some(content) = response.text_content() {
                tally.last_content = Some(content.to_string());
            }

            if !response.has_tool_calls() {
                self.messages.push(Message::assistant(text));
                self.state = LoopState::Completed;
                info!(
                    agent = %self.definition.name,
                    iterations = tally.iterations,
                    tool_use_count = tally.tool_use_count,
                    "control loop completed"
                );
                return Ok(self.outcome(tally));
            }

            self.messages
                .push(Message::assistant_with_calls(text, response.tool_calls.clone()));

            // Sequential, in emission order; each result is keyed by its call id.
            for call in &response.tool_calls {
                tally.tool_use_count += 1;
                debug!(agent = %self.definition.name, tool = %call.name, call_id = %call.id, "dispatching tool call");
                let result = self.tools.dispatch_json(&call.name, &call.arguments).await;
                self.messages.push(Message::tool_result(&call.id, result));
            }
        }

        self.state = LoopState::Exhausted;
        info!(
            agent = %self.definition.name,
            iterations = tally.iterations,
            model_failures = tally.model_failures,
            max_iterations = self.definition.max_iterations,
            "control loop exhausted"
        );
        Ok(self.outcome(tally))
    }

    fn degraded(&mut self, error: LlmError) -> LoopOutcome {
        self.state = LoopState::Exhausted;
        let text = format!("Error: model call failed: {}", error);
        self.outcome(Tally {
            iterations: 1,
            model_failures: 1,
            last_error: Some(text),
            ..Tally::default()
        })
    }

    /// Final answer: the last non-empty model text, else the last model
    /// failure, else [`NO_RESPONSE`].
    fn outcome(&self, tally: Tally) -> LoopOutcome {
        let content = tally
            .last_content
            .or_else(|| tally.last_error.clone())
            .unwrap_or_else(|| NO_RESPONSE.to_string());
        LoopOutcome {
            content,
            state: self.state,
            iterations: tally.iterations,
            tool_use_count: tally.tool_use_count,
            usage: tally.usage,
            model_failures: tally.model_failures,
            last_error: tally.last_error,
        }
    }
}
