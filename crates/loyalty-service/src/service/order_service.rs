//! 订单生命周期服务
//!
//! 处理订单上传：校验订单号 → 解析持有者 → 插入 NEW 订单 → 派发对账任务。
//! 上传请求不等待对账，Accepted 只表示"已受理"。

use std::sync::Arc;

use loyalty_shared::observability::metrics;
use tracing::{error, info, instrument, warn};

use crate::error::{LoyaltyError, Result};
use crate::models::{Listing, Order};
use crate::order_number::OrderNumber;
use crate::reconciliation::ReconciliationScheduler;
use crate::repository::OrderRepositoryTrait;

/// 订单上传结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 新订单已受理，对账任务已派发
    Accepted,
    /// 当前用户此前已上传过该订单
    AlreadyOwnedBySelf,
    /// 订单已被其他用户上传
    OwnedByOther,
}

impl SubmitOutcome {
    fn classify(owner: i64, user_id: i64) -> Self {
        if owner == user_id {
            Self::AlreadyOwnedBySelf
        } else {
            Self::OwnedByOther
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::AlreadyOwnedBySelf => "already_owned",
            Self::OwnedByOther => "owned_by_other",
        }
    }
}

pub struct OrderService {
    order_repo: Arc<dyn OrderRepositoryTrait>,
    scheduler: Arc<dyn ReconciliationScheduler>,
}

impl OrderService {
    pub fn new(
        order_repo: Arc<dyn OrderRepositoryTrait>,
        scheduler: Arc<dyn ReconciliationScheduler>,
    ) -> Self {
        Self {
            order_repo,
            scheduler,
        }
    }

    /// 上传订单
    ///
    /// 订单号格式错误返回 `InvalidOrderNumber`；持久化失败原样返回，
    /// 插入是单条语句，失败时不会留下部分状态。
    #[instrument(skip(self))]
    pub async fn submit_order(&self, user_id: i64, raw_number: &str) -> Result<SubmitOutcome> {
        let number = OrderNumber::parse(raw_number).inspect_err(|_| {
            metrics::record_order_submission("invalid");
            warn!("订单号格式错误");
        })?;

        let outcome = self
            .resolve(user_id, &number)
            .await
            .inspect_err(|e| {
                metrics::record_order_submission("error");
                error!(order = %number, error = %e, "订单上传失败");
            })?;

        metrics::record_order_submission(outcome.label());
        match outcome {
            SubmitOutcome::OwnedByOther => warn!(order = %number, "订单已被其他用户上传"),
            _ => info!(order = %number, outcome = outcome.label(), "订单上传完成"),
        }
        Ok(outcome)
    }

    async fn resolve(&self, user_id: i64, number: &OrderNumber) -> Result<SubmitOutcome> {
        if let Some(owner) = self.order_repo.find_order_owner(number.as_str()).await? {
            return Ok(SubmitOutcome::classify(owner, user_id));
        }

        match self.order_repo.insert_order(user_id, number.as_str()).await {
            Ok(order) => {
                let dispatch = self.scheduler.dispatch(&order.number, order.user_id);
                info!(order = %order.number, ?dispatch, "新订单已受理");
                Ok(SubmitOutcome::Accepted)
            }
            // 并发上传同一订单，唯一约束决定归属
            Err(LoyaltyError::OrderConflict(_)) => {
                match self.order_repo.find_order_owner(number.as_str()).await? {
                    Some(owner) => Ok(SubmitOutcome::classify(owner, user_id)),
                    None => Err(LoyaltyError::Internal(format!(
                        "订单 {number} 插入冲突但查询不到持有者"
                    ))),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// 用户订单列表，按上传时间升序
    #[instrument(skip(self))]
    pub async fn list_orders(&self, user_id: i64) -> Result<Listing<Order>> {
        self.order_repo.list_orders(user_id).await
    }
}
