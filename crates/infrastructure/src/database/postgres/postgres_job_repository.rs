use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use delayq_core::{QueueError, QueueResult};
use delayq_domain::{
    entities::Job,
    repositories::{ClaimRequest, JobRepository},
};

const JOB_COLUMNS: &str = "id, priority, attempts, handler, last_error, run_at, \
                           locked_at, locked_by, failed_at, queue, digest, created_at, updated_at";

pub struct PostgresJobRepository {
    pool: PgPool,
}

impl PostgresJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::postgres::PgRow) -> QueueResult<Job> {
        Ok(Job {
            id: row.try_get("id")?,
            priority: row.try_get("priority")?,
            attempts: row.try_get("attempts")?,
            handler: row.try_get("handler")?,
            last_error: row.try_get("last_error")?,
            run_at: row.try_get("run_at")?,
            locked_at: row.try_get("locked_at")?,
            locked_by: row.try_get("locked_by")?,
            failed_at: row.try_get("failed_at")?,
            queue: row.try_get("queue")?,
            digest: row.try_get("digest")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    #[instrument(skip(self, job), fields(
        priority = %job.priority,
        queue = ?job.queue,
        digest = ?job.digest,
    ))]
    async fn insert(&self, job: &Job) -> QueueResult<Job> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO delayed_jobs (priority, attempts, handler, last_error, run_at,
                                      locked_at, locked_by, failed_at, queue, digest,
                                      created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job.priority)
        .bind(job.attempts)
        .bind(&job.handler)
        .bind(&job.last_error)
        .bind(job.run_at)
        .bind(job.locked_at)
        .bind(&job.locked_by)
        .bind(job.failed_at)
        .bind(&job.queue)
        .bind(&job.digest)
        .bind(job.created_at)
        .bind(job.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(QueueError::Database)?;

        let created = Self::row_to_job(&row)?;
        debug!(job_id = created.id, "任务行插入成功");
        Ok(created)
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn find_by_id(&self, id: i64) -> QueueResult<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM delayed_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueueError::Database)?;

        match row {
            Some(row) => Ok(Some(Self::row_to_job(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, digest))]
    async fn find_pending_by_digest(&self, digest: &str) -> QueueResult<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM delayed_jobs \
             WHERE digest = $1 AND failed_at IS NULL \
             ORDER BY id ASC LIMIT 1"
        ))
        .bind(digest)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueueError::Database)?;

        match row {
            Some(row) => Ok(Some(Self::row_to_job(&row)?)),
            None => Ok(None),
        }
    }

    /// 单条语句完成选择加锁。行级锁用 FOR UPDATE SKIP LOCKED 避免
    /// 认领者互相等待，WHERE 条件同时把锁字段的比较写进去，保证
    /// 并发下恰有一个worker拿到该行。
    #[instrument(skip(self, request), fields(worker_id = %request.worker_id))]
    async fn claim_next(&self, request: &ClaimRequest) -> QueueResult<Option<Job>> {
        let now = Utc::now();
        let stale_before = now - Duration::seconds(request.max_run_time_seconds);

        let row = sqlx::query(&format!(
            r#"
            UPDATE delayed_jobs
            SET locked_at = $1, locked_by = $2, updated_at = $1
            WHERE id = (
                SELECT id FROM delayed_jobs
                WHERE run_at <= $1
                  AND failed_at IS NULL
                  AND attempts < $3
                  AND (locked_at IS NULL OR locked_at < $4 OR locked_by = $2)
                  AND ($5::varchar IS NULL OR queue = $5)
                  AND ($6::integer IS NULL OR priority >= $6)
                  AND ($7::integer IS NULL OR priority <= $7)
                ORDER BY priority ASC, run_at ASC, id ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(&request.worker_id)
        .bind(request.max_attempts)
        .bind(stale_before)
        .bind(&request.queue)
        .bind(request.min_priority)
        .bind(request.max_priority)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueueError::Database)?;

        match row {
            Some(row) => {
                let job = Self::row_to_job(&row)?;
                debug!(job_id = job.id, "认领任务成功");
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, last_error), fields(job_id = %id, attempts = %attempts))]
    async fn reschedule(
        &self,
        id: i64,
        attempts: i32,
        run_at: DateTime<Utc>,
        last_error: &str,
    ) -> QueueResult<()> {
        let result = sqlx::query(
            "UPDATE delayed_jobs \
             SET attempts = $2, run_at = $3, last_error = $4, \
                 locked_at = NULL, locked_by = NULL, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(attempts)
        .bind(run_at)
        .bind(last_error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(QueueError::Database)?;

        if result.rows_affected() == 0 {
            return Err(QueueError::job_not_found(id));
        }
        debug!("任务改期成功, 下次执行: {}", run_at);
        Ok(())
    }

    #[instrument(skip(self, last_error), fields(job_id = %id))]
    async fn mark_failed(&self, id: i64, last_error: &str) -> QueueResult<()> {
        let result = sqlx::query(
            "UPDATE delayed_jobs \
             SET failed_at = $2, last_error = $3, \
                 locked_at = NULL, locked_by = NULL, updated_at = $2 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(Utc::now())
        .bind(last_error)
        .execute(&self.pool)
        .await
        .map_err(QueueError::Database)?;

        if result.rows_affected() == 0 {
            return Err(QueueError::job_not_found(id));
        }
        debug!("任务转入永久失败");
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn delete(&self, id: i64) -> QueueResult<bool> {
        let result = sqlx::query("DELETE FROM delayed_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(QueueError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_pending(&self) -> QueueResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM delayed_jobs WHERE failed_at IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(QueueError::Database)?;
        Ok(count)
    }
}
