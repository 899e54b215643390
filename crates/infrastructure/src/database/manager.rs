use std::sync::Arc;

use delayq_core::{DatabaseConfig, QueueError, QueueResult};
use delayq_domain::repositories::JobRepository;

use super::postgres::{setup_postgres_schema, PostgresJobRepository};
use super::sqlite::{setup_sqlite_schema, SqliteJobRepository};

/// Database type detection (KISS principle)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            DatabaseType::PostgreSQL
        } else {
            DatabaseType::SQLite
        }
    }
}

/// Database connection pool enum (Open/Closed principle)
#[derive(Debug, Clone)]
pub enum DatabasePool {
    PostgreSQL(sqlx::PgPool),
    SQLite(sqlx::SqlitePool),
}

impl DatabasePool {
    /// Create pool from URL with automatic type detection
    pub async fn new(config: &DatabaseConfig) -> QueueResult<Self> {
        let db_type = DatabaseType::from_url(&config.url);

        match db_type {
            DatabaseType::PostgreSQL => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .min_connections(config.min_connections)
                    .acquire_timeout(std::time::Duration::from_secs(
                        config.connection_timeout_seconds,
                    ))
                    .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_seconds))
                    .connect(&config.url)
                    .await
                    .map_err(QueueError::Database)?;
                Ok(DatabasePool::PostgreSQL(pool))
            }
            DatabaseType::SQLite => {
                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.url)
                    .await
                    .map_err(QueueError::Database)?;
                Ok(DatabasePool::SQLite(pool))
            }
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        match self {
            DatabasePool::PostgreSQL(_) => DatabaseType::PostgreSQL,
            DatabasePool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// 建表并创建索引（digest唯一索引、priority+run_at复合索引）
    pub async fn setup_schema(&self) -> QueueResult<()> {
        match self {
            DatabasePool::PostgreSQL(pool) => setup_postgres_schema(pool).await,
            DatabasePool::SQLite(pool) => setup_sqlite_schema(pool).await,
        }
    }

    /// 构造对应后端的任务仓储
    pub fn job_repository(&self) -> Arc<dyn JobRepository> {
        match self {
            DatabasePool::PostgreSQL(pool) => Arc::new(PostgresJobRepository::new(pool.clone())),
            DatabasePool::SQLite(pool) => Arc::new(SqliteJobRepository::new(pool.clone())),
        }
    }

    pub async fn health_check(&self) -> QueueResult<()> {
        match self {
            DatabasePool::PostgreSQL(pool) => {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .map_err(QueueError::Database)?;
            }
            DatabasePool::SQLite(pool) => {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .map_err(QueueError::Database)?;
            }
        }
        Ok(())
    }

    pub async fn close(&self) {
        match self {
            DatabasePool::PostgreSQL(pool) => pool.close().await,
            DatabasePool::SQLite(pool) => pool.close().await,
        }
    }
}
