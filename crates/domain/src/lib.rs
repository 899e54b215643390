pub mod digest;
pub mod entities;
pub mod repositories;
pub mod serializer;
pub mod services;
pub mod task;

pub use delayq_core::{QueueError, QueueResult};
pub use digest::payload_digest;
pub use entities::Job;
pub use repositories::{ClaimRequest, JobRepository};
pub use serializer::{serialize_task, TaskPayload, TaskRegistry};
pub use services::{EnqueueOptions, EnqueueService};
pub use task::{Task, TaskError};
