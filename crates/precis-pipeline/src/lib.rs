pub mod coordinator;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod retry;

pub use coordinator::ThreadCoordinator;
pub use error::{PipelineError, Result};
pub use extract::LinkExtractor;
pub use orchestrator::Orchestrator;
pub use retry::{RetryPolicy, Retryable};
