//! 结构化日志初始化

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::errors::QueueResult;

/// Initialize structured logging with tracing
///
/// `RUST_LOG` 环境变量优先于传入的level。重复初始化返回错误时忽略，
/// 方便测试进程内多次调用。
pub fn init_logging(level: &str, json_format: bool) -> QueueResult<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true);
        registry.with(fmt_layer).try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
        registry.with(fmt_layer).try_init()
    };

    if result.is_err() {
        tracing::debug!("日志子系统已初始化，跳过重复初始化");
    }
    Ok(())
}
