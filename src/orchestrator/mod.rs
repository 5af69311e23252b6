pub mod dispatcher;
pub mod retry;
pub mod runner;
pub mod state;

pub use dispatcher::{Dispatcher, Stage};
pub use retry::{RetryExecutor, RetryPolicy, Retryable};
pub use runner::{Orchestrator, OrchestratorSettings, RunStatus, RunSummary};
pub use state::{ProjectState, StateManager};
