//! 未完成订单扫描
//!
//! 启动时扫描一次，之后按固定间隔扫描，把 NEW / PROCESSING 订单重新派发：
//! 用于重启恢复、队列满被拒绝的订单以及放弃后的再次尝试。
//!
//! 每轮最多取 batch_size 条，从上一轮停下的位置继续，到末尾后回到开头，
//! 长期未完成的旧订单不会挡住后面的订单。

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{error, info, instrument};

use super::dispatcher::{DispatchOutcome, ReconciliationScheduler};
use crate::error::Result;
use crate::models::SweepCursor;
use crate::repository::OrderRepositoryTrait;

/// 单次扫描统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub queued: usize,
    pub skipped: usize,
}

pub struct ReconciliationSweeper {
    repo: Arc<dyn OrderRepositoryTrait>,
    scheduler: Arc<dyn ReconciliationScheduler>,
    /// None 表示只在启动时扫描一次
    interval: Option<Duration>,
    batch_size: i64,
    cursor: Mutex<Option<SweepCursor>>,
}

impl ReconciliationSweeper {
    pub fn new(
        repo: Arc<dyn OrderRepositoryTrait>,
        scheduler: Arc<dyn ReconciliationScheduler>,
        interval: Option<Duration>,
        batch_size: i64,
    ) -> Self {
        Self {
            repo,
            scheduler,
            interval,
            batch_size,
            cursor: Mutex::new(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let mut after = self.cursor.lock().clone();
        let mut orders = self.repo.list_unfinished(after.clone(), self.batch_size).await?;
        if orders.is_empty() && after.is_some() {
            after = None;
            orders = self.repo.list_unfinished(None, self.batch_size).await?;
        }

        let mut report = SweepReport {
            scanned: orders.len(),
            ..Default::default()
        };
        let mut last = None;
        let mut interrupted = false;

        for order in &orders {
            match self.scheduler.dispatch(&order.number, order.user_id) {
                DispatchOutcome::Queued => report.queued += 1,
                DispatchOutcome::AlreadyInFlight => report.skipped += 1,
                // 队列满或已关闭时本轮不再继续，下一轮从这条订单开始
                DispatchOutcome::QueueFull | DispatchOutcome::Closed => {
                    report.skipped += 1;
                    interrupted = true;
                    break;
                }
            }
            last = Some(order);
        }

        let page_exhausted = orders.len() < usize::try_from(self.batch_size).unwrap_or(0);
        *self.cursor.lock() = match last {
            _ if page_exhausted && !interrupted => None,
            Some(order) => Some(SweepCursor::at(order)),
            None => after,
        };

        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                queued = report.queued,
                skipped = report.skipped,
                "未完成订单已重新派发"
            );
        }
        Ok(report)
    }

    /// 主循环：直到收到停机信号
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if let Err(e) = self.sweep_once().await {
            error!(error = %e, "启动扫描未完成订单失败");
        }

        let Some(period) = self.interval else {
            return;
        };
        info!(interval_secs = period.as_secs(), "未完成订单定期扫描已启动");

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval 首次 tick 立即返回，启动扫描已经做过
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "扫描未完成订单失败");
                    }
                }
            }
        }
    }
}
