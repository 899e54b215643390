//! 配置管理
//!
//! 加载顺序: 默认值 -> TOML配置文件 -> 环境变量覆盖 (前缀: DELAYQ_)

mod models;

pub use models::{DatabaseConfig, RetryConfig, WorkerConfig};

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::errors::{QueueError, QueueResult};

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub worker: WorkerConfig,
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// # Arguments
    ///
    /// * `config_path` - Config file path, if None use default paths
    pub fn load(config_path: Option<&str>) -> QueueResult<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(QueueError::config_error(format!("配置文件不存在: {path}")));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            for candidate in ["config/delayq.toml", "delayq.toml"] {
                if Path::new(candidate).exists() {
                    builder = builder.add_source(File::new(candidate, FileFormat::Toml));
                    break;
                }
            }
        }

        // 环境变量覆盖，如 DELAYQ_DATABASE__URL
        builder = builder.add_source(Environment::with_prefix("DELAYQ").separator("__"));

        let settings = builder
            .build()
            .map_err(|e| QueueError::config_error(format!("构建配置失败: {e}")))?;

        let app_config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| QueueError::config_error(format!("解析配置失败: {e}")))?;

        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> QueueResult<()> {
        if self.database.url.is_empty() {
            return Err(QueueError::config_error("数据库URL不能为空"));
        }
        if self.database.max_connections == 0 {
            return Err(QueueError::config_error("数据库连接池大小必须大于0"));
        }
        if self.worker.max_attempts <= 0 {
            return Err(QueueError::config_error("max_attempts 必须大于0"));
        }
        if self.worker.max_run_time_seconds <= 0 {
            return Err(QueueError::config_error("max_run_time_seconds 必须大于0"));
        }
        Ok(())
    }
}
