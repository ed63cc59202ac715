//! Workspace indexing: discovery, orchestration and the update protocol.

mod orchestrator;
mod walker;

pub use orchestrator::{WorkspaceIndexService, WorkspaceIndexer};
pub use walker::FileWalker;
