use thiserror::Error;

/// 队列统一错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("数据库操作失败: {0}")]
    Database(#[from] sqlx::Error),
    #[error("任务不存在: id={id}")]
    JobNotFound { id: i64 },
    #[error("载荷序列化失败: {0}")]
    Serialization(String),
    #[error("入队数据无效: {0}")]
    InvalidJob(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("系统内部错误: {0}")]
    Internal(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

impl QueueError {
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }
    pub fn invalid_job<S: Into<String>>(msg: S) -> Self {
        Self::InvalidJob(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn job_not_found(id: i64) -> Self {
        Self::JobNotFound { id }
    }

    /// 数据库唯一约束冲突。入队去重依赖它兜底并发竞争。
    pub fn is_unique_violation(&self) -> bool {
        match self {
            QueueError::Database(e) => e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation()),
            _ => false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Database(_) | QueueError::Timeout(_))
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for QueueError {
    fn from(err: anyhow::Error) -> Self {
        QueueError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(QueueError::Timeout("perform".into()).is_retryable());
        assert!(!QueueError::Serialization("bad payload".into()).is_retryable());
        assert!(!QueueError::InvalidJob("missing task".into()).is_retryable());
    }

    #[test]
    fn test_serde_error_maps_to_serialization() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let queue_err: QueueError = err.into();
        assert!(matches!(queue_err, QueueError::Serialization(_)));
    }
}
