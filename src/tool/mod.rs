// ABOUTME: Tool module - capabilities, schema validation, registry, and dispatch.
// ABOUTME: Core abstraction for everything an agent can invoke.

mod native;
mod registry;
mod result;
mod schema;
mod traits;

pub use native::NativeTool;
pub use registry::{Capability, Registry};
pub(crate) use registry::dispatch_failure;
pub use result::*;
pub use schema::{Violation, validate};
pub use traits::*;

#[cfg(test)]
mod registry_test;
