// ABOUTME: LLM module - the model interface consumed by the control loop.
// ABOUTME: Defines transcript types, the client trait, and an OpenAI-compatible client.

mod client;
mod openai;
mod types;

pub use client::*;
pub use openai::*;
pub use types::*;

#[cfg(test)]
pub(crate) mod testing;
