use serde::{Deserialize, Serialize};

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/delayq".to_string(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout_seconds: 30,
            idle_timeout_seconds: 600,
        }
    }
}

/// Worker配置
///
/// `worker_id` 为 None 时按 `host:<主机名> pid:<进程号>` 自动生成。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub worker_id: Option<String>,
    /// 只认领该队列分区的任务；None 表示不过滤
    pub queue: Option<String>,
    pub min_priority: Option<i32>,
    pub max_priority: Option<i32>,
    pub poll_interval_seconds: u64,
    /// 超过该次数的任务转入永久失败
    pub max_attempts: i32,
    /// 锁超过该时长视为失效，可被其他worker回收
    pub max_run_time_seconds: i64,
    /// 单个任务执行超时（秒）
    pub task_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: None,
            queue: None,
            min_priority: None,
            max_priority: None,
            poll_interval_seconds: 5,
            max_attempts: 25,
            max_run_time_seconds: 4 * 3600,
            task_timeout_seconds: 300,
        }
    }
}

impl WorkerConfig {
    /// 解析worker标识；用于锁字段 `locked_by`
    pub fn resolved_worker_id(&self) -> String {
        if let Some(id) = &self.worker_id {
            return id.clone();
        }
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("host:{host} pid:{} {}", std::process::id(), &suffix[..8])
    }
}

/// 重试退避策略配置
///
/// 下次执行时间 = now + base_delay + attempts^exponent + jitter(0..=attempts) 秒，
/// 上限 max_delay。只固定"单调递增带抖动"的形状，系数可配。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_seconds: u64,
    pub backoff_exponent: u32,
    pub max_delay_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_seconds: 5,
            backoff_exponent: 4,
            max_delay_seconds: 3600,
        }
    }
}
