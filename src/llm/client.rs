// ABOUTME: Defines the LlmClient trait - the abstraction layer that lets the
// ABOUTME: control loop work with any model provider.

use async_trait::async_trait;

use super::{Request, Response};
use crate::error::LlmError;

/// Trait for model interface implementations.
///
/// A reply with no tool calls ends a control-loop run; a reply with tool calls
/// asks the loop to dispatch them and call back with the results appended.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate one reply for the given transcript and manifest.
    async fn generate(&self, req: &Request) -> Result<Response, LlmError>;
}
