//! 指数退避
//!
//! 启动阶段的操作（如连接数据库）用 `retry_with_policy` 原地等待重试；
//! 对账 Worker 不占着并发名额等待，只用 `next_delay` 算出重新入队的时间。

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::ReconciliationConfig;

/// 退避策略
///
/// 第 n 次失败后等待 `initial_delay * multiplier^n`，不超过 `max_delay`。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次执行）
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// 已失败 `failed` 次后的等待时间；重试次数用尽时返回 None
    pub fn next_delay(&self, failed: u32) -> Option<Duration> {
        (failed < self.max_retries).then(|| self.delay_for_attempt(failed))
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }
}

impl From<&ReconciliationConfig> for RetryPolicy {
    /// `max_attempts` 含首次执行
    fn from(config: &ReconciliationConfig) -> Self {
        Self {
            max_retries: config.max_attempts.saturating_sub(1),
            initial_delay: Duration::from_millis(config.initial_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier,
        }
    }
}

/// 原地重试异步操作，`is_retryable` 为 false 的错误直接返回
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut failed: u32 = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if failed > 0 {
                    info!(operation = operation_name, failed, "重试后成功");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_retryable(&err) {
            warn!(operation = operation_name, error = %err, "不可重试的错误");
            return Err(err);
        }
        let Some(delay) = policy.next_delay(failed) else {
            warn!(
                operation = operation_name,
                failed = failed + 1,
                error = %err,
                "重试次数已用尽"
            );
            return Err(err);
        };

        warn!(
            operation = operation_name,
            failed = failed + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "操作失败，退避后重试"
        );
        tokio::time::sleep(delay).await;
        failed += 1;
    }
}
