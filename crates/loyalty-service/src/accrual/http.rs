//! 基于 reqwest 的积分计算服务客户端
//!
//! `GET {base}/api/orders/{number}`：
//! - 200 + JSON → 已注册
//! - 204 → 未注册
//! - 429 → 限流，等待时间取 Retry-After 头（秒），缺失时用配置的默认值
//! - 其他状态码、网络错误、响应解析失败 → 错误（可重试）

use std::time::Duration;

use async_trait::async_trait;
use loyalty_shared::config::AccrualConfig;
use loyalty_shared::timeout::bounded;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use tracing::{debug, instrument};

use super::{AccrualClient, AccrualReply};
use crate::error::{LoyaltyError, Result};
use crate::models::AccrualResult;

#[derive(Clone)]
pub struct HttpAccrualClient {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    default_retry_after: Duration,
}

impl HttpAccrualClient {
    pub fn new(config: &AccrualConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| LoyaltyError::Internal(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
            default_retry_after: config.default_retry_after(),
        })
    }

    fn order_url(&self, number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, number)
    }

    fn retry_after(&self, headers: &reqwest::header::HeaderMap) -> Duration {
        headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_retry_after)
    }
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn get_accrual_status(&self, number: &str) -> Result<AccrualReply> {
        let url = self.order_url(number);

        bounded(self.request_timeout, "accrual_request", async {
            let resp = self.client.get(&url).send().await?;
            let status = resp.status();
            debug!(%status, "积分计算服务响应");

            match status {
                StatusCode::OK => {
                    let result: AccrualResult = resp.json().await?;
                    if result.order != number {
                        return Err(LoyaltyError::AccrualProtocol(format!(
                            "响应订单号不匹配: 请求 {number}, 响应 {}",
                            result.order
                        )));
                    }
                    Ok(AccrualReply::Registered(result))
                }
                StatusCode::NO_CONTENT => Ok(AccrualReply::NotRegistered),
                StatusCode::TOO_MANY_REQUESTS => Ok(AccrualReply::RateLimited {
                    retry_after: self.retry_after(resp.headers()),
                }),
                other => Err(LoyaltyError::AccrualTransport(format!(
                    "积分计算服务返回 HTTP {other}"
                ))),
            }
        })
        .await
    }
}
