//! 集成测试公共工具
//!
//! 内存仓储 + 可编排响应的积分计算服务替身，无需外部依赖。

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use loyalty::accrual::{AccrualClient, AccrualReply};
use loyalty::app::{Application, Repositories};
use loyalty::models::{AccrualResult, OrderStatus};
use loyalty::repository::MemoryStore;
use loyalty::{LoyaltyError, Result};
use loyalty_shared::config::AppConfig;
use parking_lot::Mutex;
use rust_decimal::Decimal;

/// 合法订单号（Luhn 校验通过）
pub const ORDER_A: &str = "79927398713";
pub const ORDER_B: &str = "12345678903";
pub const ORDER_C: &str = "4561261212345467";
pub const WITHDRAW_ORDER: &str = "2377225624";

/// 脚本化的积分计算服务替身
///
/// 每个订单按顺序返回预设响应，用完后重复最后一个；没有脚本的订单视为未注册。
#[derive(Default)]
pub struct ScriptedAccrual {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    calls: AtomicUsize,
}

#[derive(Clone)]
pub enum Script {
    Reply(AccrualReply),
    Fail,
}

impl ScriptedAccrual {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, number: &str, steps: Vec<Script>) {
        self.scripts
            .lock()
            .insert(number.to_string(), steps.into_iter().collect());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccrualClient for ScriptedAccrual {
    async fn get_accrual_status(&self, number: &str) -> Result<AccrualReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let step = {
            let mut scripts = self.scripts.lock();
            match scripts.get_mut(number) {
                Some(steps) if steps.len() > 1 => steps.pop_front(),
                Some(steps) => steps.front().cloned(),
                None => None,
            }
        };

        match step {
            Some(Script::Reply(reply)) => Ok(reply),
            Some(Script::Fail) => Err(LoyaltyError::AccrualTransport("connection reset".into())),
            None => Ok(AccrualReply::NotRegistered),
        }
    }
}

pub fn registered(number: &str, status: OrderStatus, accrual: Option<Decimal>) -> Script {
    Script::Reply(AccrualReply::Registered(AccrualResult {
        order: number.to_string(),
        status,
        accrual,
    }))
}

pub fn not_registered() -> Script {
    Script::Reply(AccrualReply::NotRegistered)
}

pub fn rate_limited(retry_after: Duration) -> Script {
    Script::Reply(AccrualReply::RateLimited { retry_after })
}

/// 测试配置：快速退避、关闭定期扫描、低成本 bcrypt
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.bcrypt_cost = 4;
    config.reconciliation.workers = 4;
    config.reconciliation.queue_capacity = 16;
    config.reconciliation.max_attempts = 5;
    config.reconciliation.initial_backoff_ms = 5;
    config.reconciliation.max_backoff_ms = 20;
    config.reconciliation.sweep_interval_secs = 0;
    config
}

pub struct TestApp {
    pub app: Application,
    pub store: Arc<MemoryStore>,
    pub accrual: Arc<ScriptedAccrual>,
}

pub fn build_app(config: &AppConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let accrual = ScriptedAccrual::new();
    let app = Application::build(
        config,
        Repositories::memory(store.clone()),
        accrual.clone(),
        None,
    );
    TestApp {
        app,
        store,
        accrual,
    }
}

/// 轮询直到条件成立，超时则失败
pub async fn eventually<F>(what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "等待超时: {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
