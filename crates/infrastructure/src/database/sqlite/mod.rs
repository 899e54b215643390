pub mod sqlite_job_repository;

pub use sqlite_job_repository::SqliteJobRepository;

use delayq_core::{QueueError, QueueResult};
use sqlx::SqlitePool;

/// 初始化任务表结构，索引布局与Postgres端保持一致
pub async fn setup_sqlite_schema(pool: &SqlitePool) -> QueueResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS delayed_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            priority INTEGER NOT NULL DEFAULT 0,
            attempts INTEGER NOT NULL DEFAULT 0,
            handler TEXT NOT NULL,
            last_error TEXT,
            run_at TIMESTAMP NOT NULL,
            locked_at TIMESTAMP,
            locked_by TEXT,
            failed_at TIMESTAMP,
            queue TEXT,
            digest TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(QueueError::Database)?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_delayed_jobs_priority_run_at \
         ON delayed_jobs (priority, run_at)",
    )
    .execute(pool)
    .await
    .map_err(QueueError::Database)?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_delayed_jobs_digest \
         ON delayed_jobs (digest) WHERE failed_at IS NULL",
    )
    .execute(pool)
    .await
    .map_err(QueueError::Database)?;

    Ok(())
}
