//! 执行与重试引擎
//!
//! 已认领任务的状态机: Claimed -> Running -> {Succeeded, Rescheduled, Failed}。
//! 每次状态迁移都落库，崩溃恢复完全依赖失效锁回收，不存内存态。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument, warn};

use delayq_core::{QueueResult, WorkerConfig};
use delayq_domain::{
    entities::Job,
    repositories::JobRepository,
    serializer::TaskRegistry,
    task::Task,
};

use crate::retry::RetryPolicy;

/// 一次执行的终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// 执行成功，行已删除
    Succeeded,
    /// 可恢复失败，已按退避策略改期
    Rescheduled,
    /// 永久失败，行保留供排查
    Failed,
}

pub struct ExecutionEngine {
    repo: Arc<dyn JobRepository>,
    registry: Arc<TaskRegistry>,
    retry_policy: RetryPolicy,
    max_attempts: i32,
    task_timeout: Duration,
}

impl ExecutionEngine {
    pub fn new(
        repo: Arc<dyn JobRepository>,
        registry: Arc<TaskRegistry>,
        retry_policy: RetryPolicy,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            repo,
            registry,
            retry_policy,
            max_attempts: config.max_attempts,
            task_timeout: Duration::from_secs(config.task_timeout_seconds),
        }
    }

    /// 执行一个已认领的任务并持久化结果状态
    #[instrument(skip(self, job), fields(job_id = %job.id, attempts = %job.attempts))]
    pub async fn run(&self, job: &Job) -> QueueResult<JobOutcome> {
        // 反序列化失败（如代码里已不存在该任务类型）不重试也不执行
        let task = match self.registry.deserialize(&job.handler) {
            Ok(task) => task,
            Err(err) => {
                warn!("载荷反序列化失败，任务转入永久失败: {err}");
                self.repo
                    .mark_failed(job.id, &format!("反序列化失败: {err}"))
                    .await?;
                return Ok(JobOutcome::Failed);
            }
        };

        let timeout = task.timeout().unwrap_or(self.task_timeout);

        task.before_perform();
        let outcome = tokio::time::timeout(timeout, task.perform()).await;
        if outcome.is_ok() {
            task.after_perform();
        }

        match outcome {
            Ok(Ok(())) => {
                self.repo.delete(job.id).await?;
                info!("任务执行成功，行已删除");
                Ok(JobOutcome::Succeeded)
            }
            Ok(Err(err)) if err.is_retryable() => {
                self.handle_recoverable(job, task.as_ref(), err.message())
                    .await
            }
            Ok(Err(err)) => {
                warn!("任务显式标记不可重试: {}", err.message());
                self.repo.mark_failed(job.id, err.message()).await?;
                Ok(JobOutcome::Failed)
            }
            Err(_) => {
                let message = format!("执行超时 ({}秒)", timeout.as_secs());
                warn!("{message}");
                self.handle_recoverable(job, task.as_ref(), &message).await
            }
        }
    }

    /// 可恢复失败：尝试次数没用完就改期，用完转永久失败
    async fn handle_recoverable(
        &self,
        job: &Job,
        task: &dyn Task,
        error: &str,
    ) -> QueueResult<JobOutcome> {
        let max_attempts = task.max_attempts().unwrap_or(self.max_attempts);
        let next_attempts = job.attempts + 1;

        if next_attempts >= max_attempts {
            warn!(
                attempts = next_attempts,
                max_attempts, "尝试次数耗尽，任务转入永久失败"
            );
            self.repo.mark_failed(job.id, error).await?;
            return Ok(JobOutcome::Failed);
        }

        let run_at = self.retry_policy.next_run_at(next_attempts, Utc::now());
        self.repo
            .reschedule(job.id, next_attempts, run_at, error)
            .await?;
        info!(
            attempts = next_attempts,
            next_run_at = %run_at,
            "任务改期重试"
        );
        Ok(JobOutcome::Rescheduled)
    }
}
