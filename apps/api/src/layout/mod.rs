// Layout: font metrics, position estimation from linear text, and reflow pagination.
// Everything here is synchronous and CPU-bound; callers on the async side use spawn_blocking.

pub mod estimator;
pub mod font_metrics;
pub mod reflow;

pub use estimator::{estimate, EstimatorConfig};
pub use font_metrics::{get_metrics, FontFamily};
pub use reflow::{reflow, ReflowConfig, ReflowError};
