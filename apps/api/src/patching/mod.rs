// Patching: locates proposed changes in the estimated layout and writes them into
// the document, positionally when possible and by reflow otherwise.
// `Orchestrator::run` is blocking; handlers call it through spawn_blocking.

pub mod handlers;
pub mod matcher;
pub mod orchestrator;
pub mod positional;

pub use orchestrator::{Orchestrator, PipelineConfig, PipelineError};
