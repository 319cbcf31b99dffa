//! 订单对账
//!
//! 异步轮询积分计算服务并把结果写入订单和余额。
//!
//! ## 结构
//!
//! - `dispatcher`: 请求路径上的非阻塞派发，有界队列 + 在途去重
//! - `worker`: 有界并发的 Worker 池，指数退避、限流暂停、尝试上限
//! - `registry`: 在途订单登记表，供运维查看
//! - `sweep`: 启动和定期扫描未完成订单
//! - `reconcile`: 单次对账逻辑

mod dispatcher;
mod reconcile;
mod registry;
mod sweep;
mod worker;

use std::sync::Arc;

use loyalty_shared::config::ReconciliationConfig;
use loyalty_shared::retry::RetryPolicy;
use tokio::sync::mpsc;

pub use dispatcher::{DispatchOutcome, ReconciliationDispatcher, ReconciliationScheduler};
#[cfg(test)]
pub use dispatcher::MockReconciliationScheduler;
pub use reconcile::{ReconcileOutcome, reconcile_once};
pub use registry::{InFlightEntry, InFlightRegistry};
pub use sweep::{ReconciliationSweeper, SweepReport};
pub use worker::{PauseGate, ReconciliationWorker};

use crate::accrual::AccrualClient;
use crate::repository::OrderRepositoryTrait;

/// 对账任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileTask {
    pub order_number: String,
    pub user_id: i64,
    /// 已计入预算的尝试次数（限流不计）
    pub attempts: u32,
}

impl ReconcileTask {
    pub fn new(order_number: impl Into<String>, user_id: i64) -> Self {
        Self {
            order_number: order_number.into(),
            user_id,
            attempts: 0,
        }
    }
}

/// 创建派发器和 Worker，二者共享同一个队列和在途登记表
pub fn pool(
    config: &ReconciliationConfig,
    client: Arc<dyn AccrualClient>,
    repo: Arc<dyn OrderRepositoryTrait>,
) -> (Arc<ReconciliationDispatcher>, ReconciliationWorker) {
    let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
    let registry = Arc::new(InFlightRegistry::new());

    let dispatcher = Arc::new(ReconciliationDispatcher::new(
        sender.clone(),
        registry.clone(),
    ));
    let worker = ReconciliationWorker::new(
        receiver,
        sender,
        registry,
        client,
        repo,
        RetryPolicy::from(config),
        config.workers,
    );

    (dispatcher, worker)
}
