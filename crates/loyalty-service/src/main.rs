//! gophermart 积分订单服务
//!
//! 提供用户注册登录、订单上传、余额查询和积分抵扣的 REST API，
//! 后台 Worker 负责向积分计算服务对账。

use std::sync::Arc;

use clap::Parser;
use loyalty::accrual::HttpAccrualClient;
use loyalty::api::{build_router, cors_layer};
use loyalty::app::{Application, Repositories};
use loyalty::repository::MemoryStore;
use loyalty_shared::{
    config::{AppConfig, AuthConfig, ConfigOverrides},
    database::Database,
    error::SharedError,
    observability,
    retry::{RetryPolicy, retry_with_policy},
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

const SERVICE_NAME: &str = "gophermart";

/// 命令行参数，优先级高于环境变量和配置文件
#[derive(Debug, Parser)]
#[command(name = SERVICE_NAME, version, about = "Loyalty points order service")]
struct Cli {
    /// Listen address (host:port)
    #[arg(short = 'a', long = "address")]
    run_address: Option<String>,

    /// PostgreSQL connection string
    #[arg(short = 'd', long = "database")]
    database_uri: Option<String>,

    /// Accrual system base address
    #[arg(short = 'r', long = "accrual")]
    accrual_address: Option<String>,

    /// Keep all data in process memory instead of PostgreSQL
    #[arg(long)]
    memory: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            run_address: self.run_address.clone(),
            database_uri: self.database_uri.clone(),
            accrual_address: self.accrual_address.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 配置文件 → LOYALTY__ 环境变量 → 部署环境变量 → 命令行参数
    let mut config = AppConfig::load(SERVICE_NAME)?;
    let overrides = ConfigOverrides::from_env().merge(cli.overrides());
    config.apply_overrides(&overrides)?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    if config.is_production() && config.auth.jwt_secret == AuthConfig::default().jwt_secret {
        anyhow::bail!("auth.jwt_secret must be set in production");
    }

    let (repos, database) = if cli.memory {
        warn!("Using in-memory storage, data will be lost on restart");
        (Repositories::memory(Arc::new(MemoryStore::new())), None)
    } else {
        let db = connect_database(&config).await?;
        db.run_migrations(&loyalty::MIGRATOR).await?;
        (Repositories::postgres(&db, &config), Some(db))
    };

    let accrual = Arc::new(HttpAccrualClient::new(&config.accrual)?);
    let app = Application::build(&config, repos, accrual, database.clone());

    // 后台 Worker 与 HTTP 服务共享同一个停机信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(app.worker.run(shutdown_rx.clone()));
    let sweeper = tokio::spawn(app.sweeper.run(shutdown_rx));

    if config.is_production() && config.server.cors_origins.trim() == "*" {
        warn!("server.cors_origins=\"*\" 在生产环境中不安全，请设置为具体域名");
    }
    let router = build_router(app.state).layer(cors_layer(&config.server.cors_origins));
    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(worker, sweeper);

    if let Some(db) = database {
        db.close().await;
    }

    info!("Server shutdown complete");

    Ok(())
}

/// 连接数据库，启动时数据库尚未就绪则按退避策略重试
async fn connect_database(config: &AppConfig) -> Result<Database, SharedError> {
    let policy = RetryPolicy::default();
    retry_with_policy(
        &policy,
        "database_connect",
        SharedError::is_retryable,
        || Database::connect(&config.database),
    )
    .await
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
