//! 领域仓储抽象
//!
//! 定义任务行数据访问的抽象接口，遵循依赖倒置原则。
//! 原子认领语义由具体实现保证。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use delayq_core::QueueResult;

use crate::entities::Job;

/// 一次认领请求的筛选条件
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    /// 认领者标识，写入 `locked_by`
    pub worker_id: String,
    /// 队列分区过滤；None 表示认领所有队列
    pub queue: Option<String>,
    pub min_priority: Option<i32>,
    pub max_priority: Option<i32>,
    /// attempts 达到该值的任务不再被认领
    pub max_attempts: i32,
    /// 锁龄超过该秒数视为失效锁，可回收
    pub max_run_time_seconds: i64,
}

impl ClaimRequest {
    pub fn new(worker_id: impl Into<String>, max_attempts: i32, max_run_time_seconds: i64) -> Self {
        Self {
            worker_id: worker_id.into(),
            queue: None,
            min_priority: None,
            max_priority: None,
            max_attempts,
            max_run_time_seconds,
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn with_priority_range(mut self, min: Option<i32>, max: Option<i32>) -> Self {
        self.min_priority = min;
        self.max_priority = max;
        self
    }
}

/// 任务仓储抽象
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 插入新任务行，返回含生成id的完整行
    async fn insert(&self, job: &Job) -> QueueResult<Job>;

    async fn find_by_id(&self, id: i64) -> QueueResult<Option<Job>>;

    /// 按摘要查找待执行（未永久失败）的任务行，去重用
    async fn find_pending_by_digest(&self, digest: &str) -> QueueResult<Option<Job>>;

    /// 原子认领下一个符合条件的任务
    ///
    /// 排序: priority 升序, run_at 升序, id 升序。并发认领同一行时
    /// 恰有一个调用者成功；无可认领任务返回 `Ok(None)`，不是错误。
    async fn claim_next(&self, request: &ClaimRequest) -> QueueResult<Option<Job>>;

    /// 可恢复失败后的改期：累加尝试次数、记录错误、清锁
    async fn reschedule(
        &self,
        id: i64,
        attempts: i32,
        run_at: DateTime<Utc>,
        last_error: &str,
    ) -> QueueResult<()>;

    /// 永久失败：置 failed_at、记录错误、清锁；行保留供排查
    async fn mark_failed(&self, id: i64, last_error: &str) -> QueueResult<()>;

    /// 删除任务行；成功执行后的任务不保留历史
    async fn delete(&self, id: i64) -> QueueResult<bool>;

    /// 待执行任务计数（未永久失败）
    async fn count_pending(&self) -> QueueResult<i64>;
}
