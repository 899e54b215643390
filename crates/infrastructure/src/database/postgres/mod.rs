pub mod postgres_job_repository;

pub use postgres_job_repository::PostgresJobRepository;

use delayq_core::{QueueError, QueueResult};
use sqlx::PgPool;

/// 初始化任务表结构
///
/// 模式级不变量在这里落地：digest 在未永久失败的行里唯一（部分唯一
/// 索引），认领扫描走 (priority, run_at) 复合索引。
pub async fn setup_postgres_schema(pool: &PgPool) -> QueueResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS delayed_jobs (
            id BIGSERIAL PRIMARY KEY,
            priority INTEGER NOT NULL DEFAULT 0,
            attempts INTEGER NOT NULL DEFAULT 0,
            handler TEXT NOT NULL,
            last_error TEXT,
            run_at TIMESTAMPTZ NOT NULL,
            locked_at TIMESTAMPTZ,
            locked_by VARCHAR(255),
            failed_at TIMESTAMPTZ,
            queue VARCHAR(255),
            digest VARCHAR(64),
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
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
