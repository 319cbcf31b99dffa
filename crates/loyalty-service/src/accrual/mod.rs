//! 积分计算服务客户端
//!
//! 对账 Worker 通过 [`AccrualClient`] 查询单个订单的积分计算状态。
//! 除成功响应外，"未注册" 和 "限流" 都是正常的可恢复结果，不视为错误。

mod http;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::AccrualResult;

pub use http::HttpAccrualClient;

/// 一次查询的结果
#[derive(Debug, Clone, PartialEq)]
pub enum AccrualReply {
    /// 积分计算服务已知该订单，返回当前状态（中间态或终态）
    Registered(AccrualResult),
    /// 订单尚未在积分计算服务注册
    NotRegistered,
    /// 请求过于频繁，需等待后再试
    RateLimited { retry_after: Duration },
}

/// 积分计算服务接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualClient: Send + Sync {
    async fn get_accrual_status(&self, number: &str) -> Result<AccrualReply>;
}
