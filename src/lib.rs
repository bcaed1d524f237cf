// ABOUTME: Root module for flock - agent orchestration and concurrent subagents.
// ABOUTME: Re-exports all public types from submodules.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod prelude;
pub mod subagent;
pub mod tool;

pub use error::FlockError;
