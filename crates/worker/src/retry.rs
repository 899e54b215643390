//! 重试退避策略

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use delayq_core::RetryConfig;

/// 指数退避加随机抖动
///
/// 延迟 = base_delay + attempts^exponent + jitter(0..=attempts) 秒，
/// 上限 max_delay。抖动避免同一批失败任务在同一秒齐涌回来。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delay_seconds: u64,
    backoff_exponent: u32,
    max_delay_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base_delay_seconds: config.base_delay_seconds,
            backoff_exponent: config.backoff_exponent,
            max_delay_seconds: config.max_delay_seconds,
        }
    }

    /// 第 `attempts` 次失败后的下次执行时间
    pub fn next_run_at(&self, attempts: i32, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.delay_seconds(attempts) as i64)
    }

    fn delay_seconds(&self, attempts: i32) -> u64 {
        let attempts = attempts.max(1) as u64;
        let backoff = self
            .base_delay_seconds
            .saturating_add(attempts.saturating_pow(self.backoff_exponent));
        let jitter = rand::rng().random_range(0..=attempts);
        backoff.saturating_add(jitter).min(self.max_delay_seconds)
    }
}
