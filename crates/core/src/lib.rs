pub mod config;
pub mod errors;
pub mod logging;

pub use config::{AppConfig, DatabaseConfig, RetryConfig, WorkerConfig};
pub use errors::{QueueError, QueueResult};
