//! 任务载荷序列化
//!
//! 载荷格式是 JSON 信封 `{"task": "<kind>", "args": <value>}`。
//! 反序列化经由注册表按类型标识查找工厂；未注册的类型是显式的
//! 序列化错误，对应的任务行直接转入永久失败而不执行。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use delayq_core::{QueueError, QueueResult};

use crate::task::Task;

/// 持久化载荷信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayload {
    pub task: String,
    pub args: serde_json::Value,
}

/// 将任务对象序列化为不透明载荷
pub fn serialize_task(task: &dyn Task) -> QueueResult<String> {
    let payload = TaskPayload {
        task: task.kind().to_string(),
        args: task.args()?,
    };
    Ok(serde_json::to_string(&payload)?)
}

type TaskFactory = Box<dyn Fn(serde_json::Value) -> QueueResult<Box<dyn Task>> + Send + Sync>;

/// 任务类型注册表
///
/// 闭集或插件式注册的任务类型集合，worker启动时一次性登记。
#[derive(Default)]
pub struct TaskRegistry {
    factories: HashMap<String, TaskFactory>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// 注册任务类型，`kind` 必须与 `Task::kind` 返回值一致
    pub fn register<T>(&mut self, kind: &str)
    where
        T: Task + serde::de::DeserializeOwned + 'static,
    {
        self.factories.insert(
            kind.to_string(),
            Box::new(|args| {
                let task: T = serde_json::from_value(args)?;
                Ok(Box::new(task) as Box<dyn Task>)
            }),
        );
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// 从载荷还原任务对象
    pub fn deserialize(&self, handler: &str) -> QueueResult<Box<dyn Task>> {
        let payload: TaskPayload = serde_json::from_str(handler)?;
        let factory = self.factories.get(&payload.task).ok_or_else(|| {
            QueueError::serialization(format!("未注册的任务类型: {}", payload.task))
        })?;
        factory(payload.args)
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde::Deserialize;

    use crate::task::TaskError;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct GreetTask {
        name: String,
    }

    #[async_trait]
    impl Task for GreetTask {
        fn kind(&self) -> &str {
            "greet"
        }
        fn args(&self) -> QueueResult<serde_json::Value> {
            Ok(serde_json::json!({ "name": self.name }))
        }
        async fn perform(&self) -> Result<(), TaskError> {
            Ok(())
        }
    }

    fn registry() -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        registry.register::<GreetTask>("greet");
        registry
    }

    #[test]
    fn test_serialize_then_deserialize() {
        let task = GreetTask {
            name: "ada".to_string(),
        };
        let handler = serialize_task(&task).unwrap();
        let restored = registry().deserialize(&handler).unwrap();
        assert_eq!(restored.kind(), "greet");
        assert_eq!(
            restored.args().unwrap(),
            serde_json::json!({ "name": "ada" })
        );
    }

    #[test]
    fn test_unknown_kind_is_serialization_error() {
        let handler = r#"{"task":"vanished","args":{}}"#;
        let err = registry().deserialize(handler).unwrap_err();
        assert!(matches!(err, QueueError::Serialization(_)));
    }

    #[test]
    fn test_malformed_payload_is_serialization_error() {
        let err = registry().deserialize("not json at all").unwrap_err();
        assert!(matches!(err, QueueError::Serialization(_)));
    }

    #[test]
    fn test_bad_args_shape_is_serialization_error() {
        let handler = r#"{"task":"greet","args":{"name":42}}"#;
        let err = registry().deserialize(handler).unwrap_err();
        assert!(matches!(err, QueueError::Serialization(_)));
    }
}
