// ABOUTME: Subagent module - background control loops with tracked lifecycles.
// ABOUTME: Orchestrator, run handles, session announcements, and the parent-facing tools.

mod handle;
mod orchestrator;
mod session;
mod tools;

pub use handle::{RunHandle, SubagentStatus};
pub use orchestrator::{
    Announcement, Origin, SessionWriter, SpawnRequest, SubagentOrchestrator, SubagentRecord,
    WaitOutcome, default_label, subagent_prompt,
};
pub use session::{MemorySessionStore, Session, SessionMessage, SessionStore};
pub use tools::{ParallelSpawnTool, SpawnTool, WaitSubagentsTool};
