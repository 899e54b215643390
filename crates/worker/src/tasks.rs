//! 内置任务类型

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::info;

use delayq_core::QueueResult;
use delayq_domain::{
    serializer::TaskRegistry,
    task::{Task, TaskError},
};

/// Shell命令任务
///
/// 非零退出码按可重试失败处理；命令无法启动视为不可恢复。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellCommandTask {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[async_trait]
impl Task for ShellCommandTask {
    fn kind(&self) -> &str {
        "shell"
    }

    fn args(&self) -> QueueResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    async fn perform(&self) -> Result<(), TaskError> {
        info!(command = %self.command, "执行Shell任务");

        let output = Command::new(&self.command)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| TaskError::fatal(format!("启动Shell命令失败: {e}")))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(TaskError::retryable(format!(
                "命令退出码 {:?}: {}",
                output.status.code(),
                stderr.trim()
            )))
        }
    }
}

/// 注册所有内置任务类型
pub fn register_builtin_tasks(registry: &mut TaskRegistry) {
    registry.register::<ShellCommandTask>("shell");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shell_task_success() {
        let task = ShellCommandTask {
            command: "true".to_string(),
            args: vec![],
        };
        assert!(task.perform().await.is_ok());
    }

    #[tokio::test]
    async fn test_shell_task_nonzero_exit_is_retryable() {
        let task = ShellCommandTask {
            command: "false".to_string(),
            args: vec![],
        };
        let err = task.perform().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_shell_task_missing_binary_is_fatal() {
        let task = ShellCommandTask {
            command: "/nonexistent/definitely-not-a-binary".to_string(),
            args: vec![],
        };
        let err = task.perform().await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_builtin_registration() {
        let mut registry = TaskRegistry::new();
        register_builtin_tasks(&mut registry);
        assert!(registry.contains("shell"));
    }
}
