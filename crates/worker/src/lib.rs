pub mod engine;
pub mod retry;
pub mod service;
pub mod tasks;

pub use engine::{ExecutionEngine, JobOutcome};
pub use retry::RetryPolicy;
pub use service::WorkerService;
