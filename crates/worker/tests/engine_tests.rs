//! 执行引擎集成测试，SQLite后端

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;

use delayq_core::{QueueResult, WorkerConfig};
use delayq_domain::{
    entities::Job,
    repositories::{ClaimRequest, JobRepository},
    serializer::{serialize_task, TaskRegistry},
    services::{EnqueueOptions, EnqueueService},
    task::{Task, TaskError},
};
use delayq_infrastructure::database::sqlite::{setup_sqlite_schema, SqliteJobRepository};
use delayq_worker::{ExecutionEngine, JobOutcome, RetryPolicy};

#[derive(Debug, Serialize, Deserialize)]
struct FlakyTask {
    mode: String,
    /// 区分载荷，避免去重把不同测试场景合并
    marker: i64,
    #[serde(default)]
    only_once: bool,
}

impl FlakyTask {
    fn new(mode: &str, marker: i64) -> Self {
        Self {
            mode: mode.to_string(),
            marker,
            only_once: false,
        }
    }
}

#[async_trait]
impl Task for FlakyTask {
    fn kind(&self) -> &str {
        "flaky"
    }

    fn args(&self) -> QueueResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    async fn perform(&self) -> Result<(), TaskError> {
        match self.mode.as_str() {
            "ok" => Ok(()),
            "retry" => Err(TaskError::retryable("下游暂时不可用")),
            "fatal" => Err(TaskError::fatal("数据永久损坏")),
            "hang" => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
            other => Err(TaskError::fatal(format!("未知模式: {other}"))),
        }
    }

    fn max_attempts(&self) -> Option<i32> {
        self.only_once.then_some(1)
    }

    fn timeout(&self) -> Option<Duration> {
        (self.mode == "hang").then_some(Duration::from_millis(200))
    }
}

struct Harness {
    repo: Arc<SqliteJobRepository>,
    engine: ExecutionEngine,
    config: WorkerConfig,
}

async fn setup() -> Harness {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    setup_sqlite_schema(&pool).await.unwrap();
    let repo = Arc::new(SqliteJobRepository::new(pool));

    let mut registry = TaskRegistry::new();
    registry.register::<FlakyTask>("flaky");

    let config = WorkerConfig {
        max_attempts: 3,
        task_timeout_seconds: 5,
        ..Default::default()
    };
    let engine = ExecutionEngine::new(
        repo.clone(),
        Arc::new(registry),
        RetryPolicy::default(),
        &config,
    );
    Harness {
        repo,
        engine,
        config,
    }
}

impl Harness {
    async fn enqueue(&self, task: &FlakyTask) -> Job {
        EnqueueService::new(self.repo.clone())
            .enqueue(task, EnqueueOptions::default())
            .await
            .unwrap()
    }

    async fn claim(&self) -> Job {
        let request = ClaimRequest::new(
            "test-worker",
            self.config.max_attempts,
            self.config.max_run_time_seconds,
        );
        self.repo.claim_next(&request).await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn test_success_deletes_row() {
    let h = setup().await;
    let job = h.enqueue(&FlakyTask::new("ok", 1)).await;

    let claimed = h.claim().await;
    let outcome = h.engine.run(&claimed).await.unwrap();

    assert_eq!(outcome, JobOutcome::Succeeded);
    assert!(h.repo.find_by_id(job.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_retryable_failure_reschedules_with_backoff() {
    let h = setup().await;
    let job = h.enqueue(&FlakyTask::new("retry", 2)).await;

    let claimed = h.claim().await;
    let outcome = h.engine.run(&claimed).await.unwrap();

    assert_eq!(outcome, JobOutcome::Rescheduled);
    let row = h.repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(row.attempts, 1);
    assert!(row.run_at > job.run_at);
    assert!(row.locked_at.is_none());
    assert!(row.locked_by.is_none());
    assert_eq!(row.last_error.as_deref(), Some("下游暂时不可用"));
    assert!(row.failed_at.is_none());
}

#[tokio::test]
async fn test_fatal_failure_marks_failed_immediately() {
    let h = setup().await;
    let job = h.enqueue(&FlakyTask::new("fatal", 3)).await;

    let claimed = h.claim().await;
    let outcome = h.engine.run(&claimed).await.unwrap();

    assert_eq!(outcome, JobOutcome::Failed);
    let row = h.repo.find_by_id(job.id).await.unwrap().unwrap();
    assert!(row.failed_at.is_some());
    assert_eq!(row.last_error.as_deref(), Some("数据永久损坏"));
    // 即使还有剩余尝试次数也不重试
    assert_eq!(row.attempts, 0);
}

#[tokio::test]
async fn test_exhausted_attempts_become_fatal() {
    let h = setup().await;
    let job = h.enqueue(&FlakyTask::new("retry", 4)).await;

    // 预置到倒数第一次尝试 (max_attempts = 3)
    h.repo
        .reschedule(job.id, 2, Utc::now() - chrono::Duration::minutes(1), "seed")
        .await
        .unwrap();

    let claimed = h.claim().await;
    let outcome = h.engine.run(&claimed).await.unwrap();

    assert_eq!(outcome, JobOutcome::Failed);
    let row = h.repo.find_by_id(job.id).await.unwrap().unwrap();
    assert!(row.failed_at.is_some());
    // 尝试耗尽后 run_at 不再推进
    assert_eq!(row.attempts, 2);
}

#[tokio::test]
async fn test_task_level_max_attempts_override() {
    let h = setup().await;
    let mut task = FlakyTask::new("retry", 5);
    task.only_once = true;
    h.enqueue(&task).await;

    let claimed = h.claim().await;
    let outcome = h.engine.run(&claimed).await.unwrap();

    // 任务自己声明只试一次，首次失败即永久失败
    assert_eq!(outcome, JobOutcome::Failed);
}

#[tokio::test]
async fn test_timeout_is_recoverable() {
    let h = setup().await;
    let job = h.enqueue(&FlakyTask::new("hang", 6)).await;

    let claimed = h.claim().await;
    let outcome = h.engine.run(&claimed).await.unwrap();

    assert_eq!(outcome, JobOutcome::Rescheduled);
    let row = h.repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(row.attempts, 1);
    assert!(row.last_error.unwrap().contains("超时"));
}

#[tokio::test]
async fn test_unknown_kind_fails_without_executing() {
    let h = setup().await;

    // "ghost" 不在注册表里，任务应直接转入永久失败而不执行
    let handler = r#"{"task":"ghost","args":{}}"#.to_string();
    let job = h.repo.insert(&Job::new(handler)).await.unwrap();

    let claimed = h.claim().await;
    let outcome = h.engine.run(&claimed).await.unwrap();

    assert_eq!(outcome, JobOutcome::Failed);
    let row = h.repo.find_by_id(job.id).await.unwrap().unwrap();
    assert!(row.failed_at.is_some());
    assert!(row.last_error.unwrap().contains("反序列化失败"));
}

#[tokio::test]
async fn test_serialized_payload_round_trips_through_engine() {
    let h = setup().await;
    let task = FlakyTask::new("ok", 7);
    let handler = serialize_task(&task).unwrap();
    let job = h.repo.insert(&Job::new(handler)).await.unwrap();

    let claimed = h.claim().await;
    assert_eq!(claimed.id, job.id);
    let outcome = h.engine.run(&claimed).await.unwrap();
    assert_eq!(outcome, JobOutcome::Succeeded);
}
