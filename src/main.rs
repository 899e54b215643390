use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use delayq_core::{logging::init_logging, AppConfig};
use delayq_domain::serializer::TaskRegistry;
use delayq_infrastructure::database::DatabasePool;
use delayq_worker::{tasks::register_builtin_tasks, RetryPolicy, WorkerService};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("delayq")
        .version(env!("CARGO_PKG_VERSION"))
        .about("数据库支撑的持久化延迟任务队列")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["worker", "status"])
                .default_value("worker"),
        )
        .arg(
            Arg::new("worker-id")
                .long("worker-id")
                .value_name("ID")
                .help("覆盖配置中的worker标识"),
        )
        .arg(
            Arg::new("queue")
                .long("queue")
                .value_name("NAME")
                .help("仅处理指定队列的任务"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");
    let mode = matches.get_one::<String>("mode").map(String::as_str);
    let log_level = matches.get_one::<String>("log-level").map(String::as_str);
    let log_format = matches.get_one::<String>("log-format").map(String::as_str);

    // 初始化日志系统
    init_logging(log_level.unwrap_or("info"), log_format == Some("json"))
        .context("初始化日志失败")?;

    // 加载配置
    let mut config =
        AppConfig::load(config_path.map(String::as_str)).context("加载配置失败")?;
    if let Some(id) = matches.get_one::<String>("worker-id") {
        config.worker.worker_id = Some(id.clone());
    }
    if let Some(queue) = matches.get_one::<String>("queue") {
        config.worker.queue = Some(queue.clone());
    }

    // 连接数据库并确保表结构就绪
    let pool = DatabasePool::new(&config.database)
        .await
        .context("连接数据库失败")?;
    pool.setup_schema().await.context("初始化表结构失败")?;

    match mode {
        Some("status") => show_status(&pool).await?,
        _ => run_worker(&pool, config).await?,
    }

    pool.close().await;
    Ok(())
}

/// 打印队列当前状态
async fn show_status(pool: &DatabasePool) -> Result<()> {
    pool.health_check().await.context("数据库健康检查失败")?;
    let pending = pool.job_repository().count_pending().await?;
    info!(pending, "待处理任务数");
    println!("pending jobs: {pending}");
    Ok(())
}

/// 启动worker轮询循环，直到收到关闭信号
async fn run_worker(pool: &DatabasePool, config: AppConfig) -> Result<()> {
    let mut registry = TaskRegistry::new();
    register_builtin_tasks(&mut registry);

    let service = WorkerService::new(
        pool.job_repository(),
        Arc::new(registry),
        RetryPolicy::from_config(&config.retry),
        config.worker,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(async move {
        if let Err(e) = service.run(shutdown_rx).await {
            error!("worker运行失败: {e}");
        }
    });

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    let _ = shutdown_tx.send(true);

    // 等待当前任务执行完毕，设置超时
    match tokio::time::timeout(Duration::from_secs(30), worker_handle).await {
        Ok(result) => {
            if let Err(e) = result {
                error!("worker关闭时发生错误: {e}");
            } else {
                info!("worker已优雅关闭");
            }
        }
        Err(_) => {
            warn!("worker关闭超时，强制退出");
        }
    }

    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => error!("安装SIGTERM信号处理器失败: {e}"),
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
