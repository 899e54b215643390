pub mod manager;
pub mod postgres;
pub mod sqlite;

pub use manager::{DatabasePool, DatabaseType};
pub use postgres::PostgresJobRepository;
pub use sqlite::SqliteJobRepository;
