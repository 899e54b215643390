//! Worker轮询服务
//!
//! 多个worker进程各自独立轮询，协调完全依赖共享表上的原子条件
//! 更新，进程间没有中心调度器。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

use delayq_core::{QueueResult, WorkerConfig};
use delayq_domain::{
    repositories::{ClaimRequest, JobRepository},
    serializer::TaskRegistry,
};

use crate::engine::{ExecutionEngine, JobOutcome};
use crate::retry::RetryPolicy;

pub struct WorkerService {
    repo: Arc<dyn JobRepository>,
    engine: ExecutionEngine,
    config: WorkerConfig,
    worker_id: String,
}

impl WorkerService {
    pub fn new(
        repo: Arc<dyn JobRepository>,
        registry: Arc<TaskRegistry>,
        retry_policy: RetryPolicy,
        config: WorkerConfig,
    ) -> Self {
        let worker_id = config.resolved_worker_id();
        let engine = ExecutionEngine::new(repo.clone(), registry, retry_policy, &config);
        Self {
            repo,
            engine,
            config,
            worker_id,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    fn claim_request(&self) -> ClaimRequest {
        let mut request = ClaimRequest::new(
            self.worker_id.clone(),
            self.config.max_attempts,
            self.config.max_run_time_seconds,
        )
        .with_priority_range(self.config.min_priority, self.config.max_priority);
        if let Some(queue) = &self.config.queue {
            request = request.with_queue(queue.clone());
        }
        request
    }

    /// 认领并执行一个任务；队列为空返回 `Ok(None)`
    pub async fn poll_once(&self) -> QueueResult<Option<JobOutcome>> {
        match self.repo.claim_next(&self.claim_request()).await? {
            Some(job) => {
                info!(
                    job_id = job.id,
                    queue = ?job.queue,
                    attempts = job.attempts,
                    "认领任务"
                );
                let outcome = self.engine.run(&job).await?;
                Ok(Some(outcome))
            }
            None => Ok(None),
        }
    }

    /// 轮询主循环，直到收到关停信号
    ///
    /// 有任务时连续认领；队列空转为间隔轮询。进行中的任务执行完
    /// 才检查关停信号，不会中途丢弃。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> QueueResult<()> {
        info!(worker_id = %self.worker_id, "worker启动");
        let poll_interval = Duration::from_secs(self.config.poll_interval_seconds.max(1));

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.poll_once().await {
                Ok(Some(outcome)) => {
                    debug!(?outcome, "任务处理完成，继续认领");
                }
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(err) => {
                    // 存储抖动不终止worker，退避后重试
                    error!("轮询失败: {err}");
                    tokio::select! {
                        _ = tokio::time::sleep(poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        info!(worker_id = %self.worker_id, "worker退出");
        Ok(())
    }
}
