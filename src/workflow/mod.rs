// Generation workflow - sequential scene orchestration
pub mod executor;
pub mod guard;
pub mod progress;

pub use executor::{GenerationOrchestrator, RunOutcome};
pub use guard::{RunGuard, RunToken};
pub use progress::ProgressWatcher;
