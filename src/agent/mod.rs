// ABOUTME: Agent module - one bounded model/tool conversation.
// ABOUTME: Provides AgentDefinition, FilteredRegistry, and the ControlLoop runner.

mod definition;
mod filter;
mod runner;

pub use definition::{AgentDefinition, DEFAULT_MAX_ITERATIONS};
pub use filter::FilteredRegistry;
pub use runner::{ControlLoop, LoopOutcome, LoopState, NO_RESPONSE};
