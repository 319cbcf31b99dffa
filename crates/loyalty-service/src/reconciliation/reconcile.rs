//! 单次对账
//!
//! 查询一次积分计算服务，把结果交给仓储做条件写入。
//! 本身不重试、不退避，由 Worker 决定后续动作。

use std::time::Duration;

use loyalty_shared::observability::metrics;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info, instrument, warn};

use super::ReconcileTask;
use crate::accrual::{AccrualClient, AccrualReply};
use crate::error::Result;
use crate::models::OrderStatus;
use crate::repository::{ApplyOutcome, OrderRepositoryTrait};

/// 单次对账的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// 订单已到终态（本次写入或此前已写入），不再轮询
    Finished(OrderStatus),
    /// 订单仍处于中间态，稍后再查
    Pending(OrderStatus),
    /// 积分计算服务尚未注册该订单
    NotRegistered,
    /// 被限流，至少等待给定时长
    RateLimited(Duration),
    /// 订单不存在或持有者不符，无法写入
    Orphaned,
}

impl ReconcileOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_) | Self::Orphaned)
    }

    /// 指标标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Finished(_) => "finished",
            Self::Pending(_) => "pending",
            Self::NotRegistered => "not_registered",
            Self::RateLimited(_) => "rate_limited",
            Self::Orphaned => "orphaned",
        }
    }
}

/// 对一个订单执行一次对账
///
/// 未注册和限流不修改订单；查询或写入失败原样返回，由调用方按可重试性处理。
#[instrument(skip(client, repo), fields(order = %task.order_number, user_id = task.user_id))]
pub async fn reconcile_once(
    client: &dyn AccrualClient,
    repo: &dyn OrderRepositoryTrait,
    task: &ReconcileTask,
) -> Result<ReconcileOutcome> {
    let result = match client.get_accrual_status(&task.order_number).await? {
        AccrualReply::Registered(result) => result,
        AccrualReply::NotRegistered => {
            debug!("订单尚未在积分计算服务注册");
            return Ok(ReconcileOutcome::NotRegistered);
        }
        AccrualReply::RateLimited { retry_after } => {
            warn!(retry_after_secs = retry_after.as_secs(), "积分计算服务限流");
            return Ok(ReconcileOutcome::RateLimited(retry_after));
        }
    };

    let outcome = match repo.apply_accrual(task.user_id, &result).await? {
        ApplyOutcome::Applied { status, credited } => {
            if credited > Decimal::ZERO {
                metrics::record_points_credited(to_cents(credited));
            }
            info!(%status, %credited, "积分结果已写入");
            if status.is_terminal() {
                ReconcileOutcome::Finished(status)
            } else {
                ReconcileOutcome::Pending(status)
            }
        }
        ApplyOutcome::Unchanged {
            current: Some(current),
        } => {
            debug!(reported = %result.status, %current, "状态流转不合法，忽略本次结果");
            if current.is_terminal() {
                ReconcileOutcome::Finished(current)
            } else {
                ReconcileOutcome::Pending(current)
            }
        }
        ApplyOutcome::Unchanged { current: None } => {
            warn!("订单不存在或持有者不符，放弃对账");
            ReconcileOutcome::Orphaned
        }
    };

    Ok(outcome)
}

fn to_cents(amount: Decimal) -> u64 {
    (amount * Decimal::ONE_HUNDRED).trunc().to_u64().unwrap_or(0)
}
