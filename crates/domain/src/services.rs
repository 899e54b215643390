//! 入队服务
//!
//! 序列化、去重、持久化的编排。认领协议见infrastructure中的仓储实现。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use delayq_core::{QueueError, QueueResult};

use crate::digest::payload_digest;
use crate::entities::Job;
use crate::repositories::JobRepository;
use crate::serializer::serialize_task;
use crate::task::Task;

/// 入队选项；未指定的字段取任务自身的能力声明或默认值
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub priority: Option<i32>,
    pub run_at: Option<DateTime<Utc>>,
    pub queue: Option<String>,
    /// 显式传入时优先于任务的 `allow_duplication` 声明
    pub allow_duplication: Option<bool>,
}

pub struct EnqueueService {
    repo: Arc<dyn JobRepository>,
}

impl EnqueueService {
    pub fn new(repo: Arc<dyn JobRepository>) -> Self {
        Self { repo }
    }

    /// 入队一个任务
    ///
    /// 去重开启时：已有相同摘要的待执行行则原样返回该行，不新增、
    /// 不报错。并发入队竞争由唯一索引兜底，插入撞上唯一冲突后回查
    /// 既有行返回。
    #[instrument(skip(self, task, options), fields(kind = %task.kind()))]
    pub async fn enqueue(&self, task: &dyn Task, options: EnqueueOptions) -> QueueResult<Job> {
        let handler = serialize_task(task)
            .map_err(|e| QueueError::invalid_job(format!("载荷序列化失败: {e}")))?;

        let allow_duplication = options
            .allow_duplication
            .unwrap_or_else(|| task.allow_duplication());
        let digest = (!allow_duplication).then(|| payload_digest(&handler));

        if let Some(d) = digest.as_deref() {
            if let Some(existing) = self.repo.find_pending_by_digest(d).await? {
                debug!(job_id = existing.id, "命中去重，返回既有任务行");
                return Ok(existing);
            }
        }

        let mut job = Job::new(handler);
        job.priority = options.priority.unwrap_or_else(|| task.priority());
        if let Some(run_at) = options.run_at {
            job.run_at = run_at;
        }
        job.queue = options.queue.or_else(|| task.queue().map(str::to_string));
        job.digest = digest.clone();

        // 持久化前的最后扩展点，任务可在此修改行字段
        task.before_enqueue(&mut job);

        match self.repo.insert(&job).await {
            Ok(created) => {
                debug!(job_id = created.id, "任务入队成功");
                Ok(created)
            }
            Err(err) if err.is_unique_violation() => {
                // 并发入队撞上唯一索引，回查并返回赢家写入的行
                if let Some(d) = digest.as_deref() {
                    if let Some(existing) = self.repo.find_pending_by_digest(d).await? {
                        debug!(job_id = existing.id, "唯一冲突回查命中既有任务行");
                        return Ok(existing);
                    }
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}
