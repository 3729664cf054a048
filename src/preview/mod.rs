//! Rebuild-on-change pipeline from the store to the sandbox.

mod module_graph;
mod orchestrator;
mod sandbox;
mod session;

pub use module_graph::ModuleGraph;
pub use orchestrator::{
    BuildError, BuildReport, BuildStatus, PreviewDocument, PreviewOrchestrator, Stylesheet,
};
pub use sandbox::{InMemorySandbox, Sandbox, SandboxContext};
pub use session::{PreviewSession, SessionEvent};
