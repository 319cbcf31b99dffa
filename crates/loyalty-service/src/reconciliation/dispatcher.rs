//! 对账任务派发
//!
//! 请求路径上调用，永不阻塞：队列满时记录日志和指标后直接返回，
//! 订单留给定期扫描重新派发。

use std::sync::Arc;

use loyalty_shared::observability::metrics;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use super::registry::InFlightRegistry;
use super::ReconcileTask;

/// 派发结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Queued,
    /// 该订单已有对账任务在途
    AlreadyInFlight,
    /// 队列已满，等待扫描
    QueueFull,
    /// Worker 已停止
    Closed,
}

/// 对账调度接口
///
/// 订单服务只依赖该接口，便于测试时替换
#[cfg_attr(test, mockall::automock)]
pub trait ReconciliationScheduler: Send + Sync {
    fn dispatch(&self, order_number: &str, user_id: i64) -> DispatchOutcome;
}

pub struct ReconciliationDispatcher {
    sender: mpsc::Sender<ReconcileTask>,
    registry: Arc<InFlightRegistry>,
}

impl ReconciliationDispatcher {
    pub(super) fn new(sender: mpsc::Sender<ReconcileTask>, registry: Arc<InFlightRegistry>) -> Self {
        Self { sender, registry }
    }

    pub fn registry(&self) -> &Arc<InFlightRegistry> {
        &self.registry
    }
}

impl ReconciliationScheduler for ReconciliationDispatcher {
    fn dispatch(&self, order_number: &str, user_id: i64) -> DispatchOutcome {
        if !self.registry.try_register(order_number, user_id) {
            debug!(order = order_number, "订单已在对账中，跳过派发");
            return DispatchOutcome::AlreadyInFlight;
        }

        match self.sender.try_send(ReconcileTask::new(order_number, user_id)) {
            Ok(()) => {
                debug!(order = order_number, user_id, "对账任务已入队");
                DispatchOutcome::Queued
            }
            Err(TrySendError::Full(task)) => {
                self.registry.release(&task.order_number);
                metrics::record_reconciliation_queue_rejection();
                warn!(order = order_number, user_id, "对账队列已满，等待定期扫描");
                DispatchOutcome::QueueFull
            }
            Err(TrySendError::Closed(task)) => {
                self.registry.release(&task.order_number);
                warn!(order = order_number, "对账 Worker 已停止，任务未派发");
                DispatchOutcome::Closed
            }
        }
    }
}
