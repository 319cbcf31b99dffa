//! 请求/响应 DTO
//!
//! 字段名与对外协议一致（snake_case），积分金额以 JSON 数字输出

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::{ApiError, ApiResult};
use crate::models::{Balance, Order, OrderStatus, Withdrawal};

/// 注册/登录请求
#[derive(Debug, Deserialize, Validate)]
pub struct CredentialsRequest {
    #[validate(length(min = 1, max = 255, message = "登录名长度必须在 1-255 之间"))]
    pub login: String,
    #[validate(length(min = 1, max = 255, message = "密码长度必须在 1-255 之间"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// 提现请求
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Decimal,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct OrderResponse {
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
    pub uploaded_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            accrual: order.visible_accrual(),
            uploaded_at: rfc3339(order.uploaded_at),
            number: order.number,
            status: order.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BalanceResponse {
    pub current: Decimal,
    pub withdrawn: Decimal,
}

impl From<Balance> for BalanceResponse {
    fn from(balance: Balance) -> Self {
        Self {
            current: balance.current,
            withdrawn: balance.withdrawn,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WithdrawalResponse {
    pub order: String,
    pub sum: Decimal,
    pub processed_at: String,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(withdrawal: Withdrawal) -> Self {
        Self {
            order: withdrawal.order_number,
            sum: withdrawal.sum,
            processed_at: rfc3339(withdrawal.processed_at),
        }
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// 解析 JSON 请求体，格式错误统一返回 400
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// 解析并校验 JSON 请求体
pub fn parse_validated<T: DeserializeOwned + Validate>(body: &[u8]) -> ApiResult<T> {
    let value: T = parse_json(body)?;
    value
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(value)
}
