//! 订单实体

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::OrderStatus;

/// 用户上传的订单
///
/// 订单号全局唯一，第一个上传者永久拥有该订单。
/// 状态和积分只由对账流程修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub number: String,
    pub user_id: i64,
    pub status: OrderStatus,
    /// 积分数额，仅 PROCESSED 状态下有意义
    pub accrual: Decimal,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(number: impl Into<String>, user_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            number: number.into(),
            user_id,
            status: OrderStatus::New,
            accrual: Decimal::ZERO,
            uploaded_at: now,
            updated_at: now,
        }
    }

    /// 对外展示的积分：只有已处理的订单才带积分
    pub fn visible_accrual(&self) -> Option<Decimal> {
        (self.status == OrderStatus::Processed).then_some(self.accrual)
    }
}

/// 未完成订单的分页游标
///
/// 按 (上传时间, 订单号) 排序，定期扫描从上次停下的位置继续。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepCursor {
    pub uploaded_at: DateTime<Utc>,
    pub number: String,
}

impl SweepCursor {
    pub fn at(order: &Order) -> Self {
        Self {
            uploaded_at: order.uploaded_at,
            number: order.number.clone(),
        }
    }

    /// 订单是否排在游标之后
    pub fn is_before(&self, order: &Order) -> bool {
        (self.uploaded_at, self.number.as_str()) < (order.uploaded_at, order.number.as_str())
    }
}

/// 积分计算结果
///
/// 来自积分计算服务的一次响应，经对账 Worker 写入订单和余额。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualResult {
    pub order: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub accrual: Option<Decimal>,
}

impl AccrualResult {
    /// 实际应写入的积分
    ///
    /// 非 PROCESSED 状态一律为 0；负数视为 0；保留两位小数。
    pub fn effective_accrual(&self) -> Decimal {
        if self.status != OrderStatus::Processed {
            return Decimal::ZERO;
        }
        self.accrual
            .unwrap_or(Decimal::ZERO)
            .max(Decimal::ZERO)
            .round_dp(2)
    }
}
