use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use delayq_core::QueueResult;

use crate::entities::Job;

/// 任务执行失败
///
/// `retryable` 决定走重试调度还是直接永久失败。
#[derive(Debug)]
pub struct TaskError {
    message: String,
    retryable: bool,
}

impl TaskError {
    /// 瞬时故障，按退避策略重试
    pub fn retryable<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// 不可恢复故障，立即转入永久失败
    pub fn fatal<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TaskError {}

/// 可入队执行的任务类型
///
/// 实现方提供 `kind`（注册名）、`args`（可序列化参数）和 `perform`。
/// 其余方法是可选的能力声明，worker和入队服务据此取默认行为。
#[async_trait]
pub trait Task: Send + Sync {
    /// 注册表中的类型标识，反序列化时据此查找工厂
    fn kind(&self) -> &str;

    /// 任务参数，会被序列化进载荷；参数相同的任务摘要相同
    fn args(&self) -> QueueResult<serde_json::Value>;

    async fn perform(&self) -> Result<(), TaskError>;

    /// 默认队列分区
    fn queue(&self) -> Option<&str> {
        None
    }

    /// 默认优先级，数值越小越先执行
    fn priority(&self) -> i32 {
        0
    }

    /// 覆盖worker级的最大尝试次数
    fn max_attempts(&self) -> Option<i32> {
        None
    }

    /// 声明允许重复入队；调用方显式传入的选项优先于此声明
    fn allow_duplication(&self) -> bool {
        false
    }

    /// 覆盖worker级的单次执行超时
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// 入队钩子：持久化前最后修改任务行的机会（如推迟 run_at）
    fn before_enqueue(&self, _job: &mut Job) {}

    /// 执行前钩子
    fn before_perform(&self) {}

    /// 执行后钩子；perform 正常返回（无论成败）后调用
    fn after_perform(&self) {}
}

impl fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("kind", &self.kind()).finish()
    }
}
