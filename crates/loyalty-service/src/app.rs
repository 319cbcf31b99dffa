//! 组件装配
//!
//! 按配置把仓储、积分计算服务客户端、服务层和对账 Worker 组装起来。
//! 所有组件通过构造函数注入依赖，启动后不再读取全局配置。

use std::sync::Arc;

use loyalty_shared::config::AppConfig;
use loyalty_shared::database::Database;

use crate::accrual::AccrualClient;
use crate::api::AppState;
use crate::auth::JwtManager;
use crate::reconciliation::{self, ReconciliationSweeper, ReconciliationWorker};
use crate::repository::{
    BalanceRepository, BalanceRepositoryTrait, MemoryStore, OrderRepository,
    OrderRepositoryTrait, UserRepository, UserRepositoryTrait,
};
use crate::service::{AuthService, BalanceService, OrderService};

/// 仓储集合
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepositoryTrait>,
    pub orders: Arc<dyn OrderRepositoryTrait>,
    pub balances: Arc<dyn BalanceRepositoryTrait>,
}

impl Repositories {
    pub fn postgres(db: &Database, config: &AppConfig) -> Self {
        let timeout = config.database.call_timeout();
        Self {
            users: Arc::new(UserRepository::new(db.pool().clone(), timeout)),
            orders: Arc::new(OrderRepository::new(db.pool().clone(), timeout)),
            balances: Arc::new(BalanceRepository::new(db.pool().clone(), timeout)),
        }
    }

    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            orders: store.clone(),
            balances: store,
        }
    }
}

/// 装配完成的应用
pub struct Application {
    pub state: AppState,
    pub worker: ReconciliationWorker,
    pub sweeper: ReconciliationSweeper,
}

impl Application {
    pub fn build(
        config: &AppConfig,
        repos: Repositories,
        accrual: Arc<dyn AccrualClient>,
        database: Option<Database>,
    ) -> Self {
        let (dispatcher, worker) =
            reconciliation::pool(&config.reconciliation, accrual, repos.orders.clone());

        let sweeper = ReconciliationSweeper::new(
            repos.orders.clone(),
            dispatcher.clone(),
            config.reconciliation.sweep_interval(),
            config.reconciliation.sweep_batch_size,
        );

        let orders = Arc::new(OrderService::new(repos.orders, dispatcher.clone()));
        let balances = Arc::new(BalanceService::new(repos.balances));
        let auth = Arc::new(AuthService::new(
            repos.users,
            JwtManager::new(&config.auth),
            config.auth.bcrypt_cost,
        ));

        let state = AppState::new(
            orders,
            balances,
            auth,
            dispatcher.registry().clone(),
            database,
        );

        Self {
            state,
            worker,
            sweeper,
        }
    }
}
