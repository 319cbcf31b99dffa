//! 对账 Worker 池
//!
//! 从有界队列取任务，信号量限制同时访问积分计算服务的任务数。
//! 每次尝试后按结果决定：终态结束；中间态、未注册或瞬时错误按指数退避重新入队；
//! 限流时通过共享的暂停闸门让所有任务一起等待。超过尝试上限即放弃，订单保持未完成，
//! 由定期扫描再给一次机会。

use std::sync::Arc;
use std::time::Duration;

use loyalty_shared::observability::metrics;
use loyalty_shared::retry::RetryPolicy;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::ReconcileTask;
use super::reconcile::{ReconcileOutcome, reconcile_once};
use super::registry::InFlightRegistry;
use crate::accrual::AccrualClient;
use crate::repository::OrderRepositoryTrait;

/// 停机时等待处理中任务的最长时间
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// 限流暂停闸门
///
/// 任一任务收到 429 后设置恢复时间，所有任务在下一次请求前等待到该时间。
#[derive(Default)]
pub struct PauseGate {
    until: Mutex<Option<Instant>>,
}

impl PauseGate {
    /// 暂停至少 duration；已有更晚的恢复时间时保持不变
    pub fn pause_for(&self, duration: Duration) {
        let target = Instant::now() + duration;
        let mut until = self.until.lock();
        if until.is_none_or(|current| current < target) {
            *until = Some(target);
        }
    }

    pub fn resume_at(&self) -> Option<Instant> {
        let until = *self.until.lock();
        until.filter(|t| *t > Instant::now())
    }

    pub async fn wait(&self) {
        while let Some(deadline) = self.resume_at() {
            tokio::time::sleep_until(deadline).await;
        }
    }
}

/// 单次处理后的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Done,
    Retry(Duration),
}

/// Worker 共享上下文
struct WorkerContext {
    client: Arc<dyn AccrualClient>,
    repo: Arc<dyn OrderRepositoryTrait>,
    registry: Arc<InFlightRegistry>,
    pause: PauseGate,
    policy: RetryPolicy,
    requeue_tx: mpsc::Sender<ReconcileTask>,
}

impl WorkerContext {
    async fn process(&self, task: &mut ReconcileTask) -> Next {
        self.pause.wait().await;

        let result = reconcile_once(self.client.as_ref(), self.repo.as_ref(), task).await;
        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "error",
        };
        metrics::record_reconciliation_attempt(label);

        match result {
            Ok(outcome) if outcome.is_finished() => {
                debug!(order = %task.order_number, ?outcome, "对账完成");
                Next::Done
            }
            Ok(ReconcileOutcome::RateLimited(retry_after)) => {
                // 限流不消耗尝试次数
                self.pause.pause_for(retry_after);
                Next::Retry(retry_after)
            }
            Ok(outcome) => self.backoff(task, outcome.label()),
            Err(e) if e.is_retryable() => {
                warn!(order = %task.order_number, error = %e, "对账失败，稍后重试");
                self.backoff(task, e.error_code())
            }
            Err(e) => {
                error!(order = %task.order_number, error = %e, "对账遇到不可重试的错误，放弃");
                metrics::record_reconciliation_give_up();
                Next::Done
            }
        }
    }

    /// 计入一次尝试，返回退避时间或放弃
    fn backoff(&self, task: &mut ReconcileTask, reason: &str) -> Next {
        let failed = task.attempts;
        task.attempts += 1;
        self.registry.record_attempt(&task.order_number, task.attempts);

        if let Some(delay) = self.policy.next_delay(failed) {
            debug!(
                order = %task.order_number,
                attempts = task.attempts,
                delay_ms = delay.as_millis() as u64,
                reason,
                "订单未完成，退避后重试"
            );
            Next::Retry(delay)
        } else {
            warn!(
                order = %task.order_number,
                attempts = task.attempts,
                reason,
                "超过最大尝试次数，放弃本轮对账，等待定期扫描"
            );
            metrics::record_reconciliation_give_up();
            Next::Done
        }
    }

    /// 退避后重新入队；停机或队列关闭时释放登记
    async fn requeue(
        &self,
        task: ReconcileTask,
        delay: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                self.registry.release(&task.order_number);
                return;
            }
        }

        if let Err(mpsc::error::SendError(task)) = self.requeue_tx.send(task).await {
            self.registry.release(&task.order_number);
        }
    }
}

/// 对账 Worker
pub struct ReconciliationWorker {
    receiver: mpsc::Receiver<ReconcileTask>,
    ctx: Arc<WorkerContext>,
    semaphore: Arc<Semaphore>,
    workers: usize,
}

impl ReconciliationWorker {
    pub(super) fn new(
        receiver: mpsc::Receiver<ReconcileTask>,
        requeue: mpsc::Sender<ReconcileTask>,
        registry: Arc<InFlightRegistry>,
        client: Arc<dyn AccrualClient>,
        repo: Arc<dyn OrderRepositoryTrait>,
        policy: RetryPolicy,
        workers: usize,
    ) -> Self {
        let workers = workers.max(1);
        Self {
            receiver,
            ctx: Arc::new(WorkerContext {
                client,
                repo,
                registry,
                pause: PauseGate::default(),
                policy,
                requeue_tx: requeue,
            }),
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// 主循环：持续处理任务直到收到停机信号
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            workers = self.workers,
            max_retries = self.ctx.policy.max_retries,
            "对账 Worker 已启动"
        );

        loop {
            let permit = tokio::select! {
                _ = shutdown.changed() => break,
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let mut task = tokio::select! {
                _ = shutdown.changed() => break,
                task = self.receiver.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            let ctx = self.ctx.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let next = ctx.process(&mut task).await;
                drop(permit);
                match next {
                    Next::Done => ctx.registry.release(&task.order_number),
                    Next::Retry(delay) => ctx.requeue(task, delay, shutdown).await,
                }
            });
        }

        // 等待处理中的任务结束（退避等待中的任务已随停机信号退出）
        let drained = tokio::time::timeout(
            SHUTDOWN_GRACE,
            self.semaphore.acquire_many(self.workers as u32),
        )
        .await;
        if drained.is_err() {
            warn!(
                in_flight = self.ctx.registry.len(),
                "等待对账任务结束超时，剩余订单由下次启动扫描处理"
            );
        }
        info!("对账 Worker 已停止");
    }
}
