pub mod database;

pub use database::manager::{DatabasePool, DatabaseType};
pub use database::postgres::PostgresJobRepository;
pub use database::sqlite::SqliteJobRepository;
