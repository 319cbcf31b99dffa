//! 调用超时控制
//!
//! 所有会阻塞的外部调用（仓储、积分计算服务）都以固定的单次超时包裹。
//! 超时后 future 被丢弃：对 sqlx 事务而言即回滚，不会留下部分写入。

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// 超时错误，由调用方转换为各自的可重试错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elapsed {
    pub operation: &'static str,
    pub limit: Duration,
}

impl std::fmt::Display for Elapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} 超过 {}ms 未完成", self.operation, self.limit.as_millis())
    }
}

impl std::error::Error for Elapsed {}

/// 在限定时间内执行异步操作
///
/// 内层结果原样返回；超时时返回 `E::from(Elapsed)`。
pub async fn bounded<T, E, Fut>(limit: Duration, operation: &'static str, fut: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: From<Elapsed>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation,
                limit_ms = limit.as_millis() as u64,
                "调用超时"
            );
            Err(E::from(Elapsed { operation, limit }))
        }
    }
}
