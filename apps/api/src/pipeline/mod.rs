// Resume pipeline: staged agents over a per-run StageContext, driven by the
// orchestrator's state machine. Runs live in the RunRegistry; the only state
// shared between runs is the retrieval store.

pub mod agents;
pub mod context;
pub mod error;
pub mod handlers;
pub mod intake;
pub mod orchestrator;
pub mod prompts;
pub mod registry;
pub mod retry;
pub mod stage;

#[cfg(test)]
pub mod test_support;

pub use error::PipelineError;
pub use orchestrator::{Orchestrator, OrchestratorSettings, PipelineRun, RunState};
pub use registry::RunRegistry;
