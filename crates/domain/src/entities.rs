use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 任务行，每行对应一个待执行的工作单元
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    /// 数值越小优先级越高
    pub priority: i32,
    pub attempts: i32,
    /// 序列化后的任务载荷
    pub handler: String,
    pub last_error: Option<String>,
    /// 早于该时刻不可被认领
    pub run_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    /// 非空表示永久失败，不再重试
    pub failed_at: Option<DateTime<Utc>>,
    pub queue: Option<String>,
    /// 载荷指纹，用于待执行任务去重
    pub digest: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(handler: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // 将由数据库生成
            priority: 0,
            attempts: 0,
            handler,
            last_error: None,
            run_at: now,
            locked_at: None,
            locked_by: None,
            failed_at: None,
            queue: None,
            digest: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// locked_at 和 locked_by 同时非空才算持有锁
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some() && self.locked_by.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.failed_at.is_some()
    }

    /// 锁是否已过期（持锁worker可能已崩溃）
    pub fn lock_expired(&self, max_run_time_seconds: i64, now: DateTime<Utc>) -> bool {
        match self.locked_at {
            Some(locked_at) => locked_at < now - Duration::seconds(max_run_time_seconds),
            None => false,
        }
    }

    /// 任务是否可被指定worker认领
    pub fn claimable_by(&self, worker_id: &str, max_run_time_seconds: i64) -> bool {
        let now = Utc::now();
        if self.is_failed() || self.run_at > now {
            return false;
        }
        match &self.locked_by {
            None => true,
            Some(holder) => {
                holder == worker_id || self.lock_expired(max_run_time_seconds, now)
            }
        }
    }

    pub fn clear_lock(&mut self) {
        self.locked_at = None;
        self.locked_by = None;
    }

    pub fn entity_description(&self) -> String {
        match &self.queue {
            Some(queue) => format!(
                "任务 (ID: {}, 队列: {}, 优先级: {})",
                self.id, queue, self.priority
            ),
            None => format!("任务 (ID: {}, 优先级: {})", self.id, self.priority),
        }
    }
}
