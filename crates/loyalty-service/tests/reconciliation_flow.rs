//! 订单对账流程集成测试
//!
//! 上传订单 → Worker 轮询积分计算服务 → 订单状态与余额更新

mod common;

use std::time::Duration;

use std::sync::Arc;

use futures::future::join_all;
use loyalty::models::{AccrualResult, Listing, OrderStatus};
use loyalty::repository::{ApplyOutcome, BalanceRepositoryTrait, OrderRepositoryTrait};
use loyalty::service::SubmitOutcome;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tokio::sync::watch;

use common::*;

fn dec(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap().round_dp(2)
}

#[tokio::test]
async fn test_order_reaches_processed_and_credits_balance() {
    let t = build_app(&test_config());
    t.accrual.script(
        ORDER_A,
        vec![
            not_registered(),
            registered(ORDER_A, OrderStatus::Processing, None),
            registered(ORDER_A, OrderStatus::Processed, Some(dec(729.98))),
        ],
    );

    let state = t.app.state.clone();
    let user = state.auth.register("alice", "secret").await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(t.app.worker.run(shutdown_rx));

    let outcome = state.orders.submit_order(user.user_id, ORDER_A).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Accepted);

    let store = t.store.clone();
    eventually("订单进入 PROCESSED", || {
        store
            .order(ORDER_A)
            .is_some_and(|o| o.status == OrderStatus::Processed)
    })
    .await;

    let balance = state.balances.get_balance(user.user_id).await.unwrap();
    assert_eq!(balance.current, dec(729.98));
    assert_eq!(balance.withdrawn, Decimal::ZERO);

    let orders = state.orders.list_orders(user.user_id).await.unwrap().into_vec();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].accrual, dec(729.98));

    eventually("在途登记已释放", || state.in_flight.is_empty()).await;
    assert_eq!(t.accrual.calls(), 3);

    shutdown_tx.send(true).unwrap();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_invalid_order_is_terminal_without_credit() {
    let t = build_app(&test_config());
    t.accrual
        .script(ORDER_A, vec![registered(ORDER_A, OrderStatus::Invalid, None)]);

    let state = t.app.state.clone();
    let user = state.auth.register("bob", "secret").await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(t.app.worker.run(shutdown_rx));

    state.orders.submit_order(user.user_id, ORDER_A).await.unwrap();

    let store = t.store.clone();
    eventually("订单进入 INVALID", || {
        store
            .order(ORDER_A)
            .is_some_and(|o| o.status == OrderStatus::Invalid)
    })
    .await;

    let balance = state.balances.get_balance(user.user_id).await.unwrap();
    assert_eq!(balance.current, Decimal::ZERO);

    shutdown_tx.send(true).unwrap();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_rate_limit_pauses_then_recovers() {
    let t = build_app(&test_config());
    t.accrual.script(
        ORDER_A,
        vec![
            rate_limited(Duration::from_millis(50)),
            registered(ORDER_A, OrderStatus::Processed, Some(dec(100.0))),
        ],
    );

    let state = t.app.state.clone();
    let user = state.auth.register("carol", "secret").await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(t.app.worker.run(shutdown_rx));

    let started = tokio::time::Instant::now();
    state.orders.submit_order(user.user_id, ORDER_A).await.unwrap();

    let store = t.store.clone();
    eventually("限流后完成对账", || {
        store
            .order(ORDER_A)
            .is_some_and(|o| o.status == OrderStatus::Processed)
    })
    .await;

    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(t.accrual.calls(), 2);

    shutdown_tx.send(true).unwrap();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let t = build_app(&test_config());
    t.accrual.script(
        ORDER_A,
        vec![
            Script::Fail,
            Script::Fail,
            registered(ORDER_A, OrderStatus::Processed, Some(dec(42.5))),
        ],
    );

    let state = t.app.state.clone();
    let user = state.auth.register("dave", "secret").await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(t.app.worker.run(shutdown_rx));

    state.orders.submit_order(user.user_id, ORDER_A).await.unwrap();

    let balances = state.balances.clone();
    let store = t.store.clone();
    eventually("瞬时错误后完成对账", || {
        store
            .order(ORDER_A)
            .is_some_and(|o| o.status == OrderStatus::Processed)
    })
    .await;

    let balance = balances.get_balance(user.user_id).await.unwrap();
    assert_eq!(balance.current, dec(42.5));

    shutdown_tx.send(true).unwrap();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_gave_up_order_is_picked_up_by_sweep() {
    let mut config = test_config();
    config.reconciliation.max_attempts = 2;
    let t = build_app(&config);
    // 没有脚本：一直未注册，两次尝试后放弃
    let state = t.app.state.clone();
    let user = state.auth.register("erin", "secret").await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(t.app.worker.run(shutdown_rx));

    state.orders.submit_order(user.user_id, ORDER_A).await.unwrap();

    let accrual = t.accrual.clone();
    eventually("两次尝试后放弃", || accrual.calls() >= 2).await;
    eventually("放弃后释放在途登记", || state.in_flight.is_empty()).await;
    assert_eq!(t.accrual.calls(), 2);
    assert_eq!(t.store.order(ORDER_A).unwrap().status, OrderStatus::New);

    // 积分计算服务恢复后，定期扫描重新派发
    t.accrual.script(
        ORDER_A,
        vec![registered(ORDER_A, OrderStatus::Processed, Some(dec(10.0)))],
    );
    let report = t.app.sweeper.sweep_once().await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.queued, 1);

    let store = t.store.clone();
    eventually("扫描后完成对账", || {
        store
            .order(ORDER_A)
            .is_some_and(|o| o.status == OrderStatus::Processed)
    })
    .await;

    shutdown_tx.send(true).unwrap();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_sweep_skips_orders_already_in_flight() {
    let t = build_app(&test_config());
    let state = t.app.state.clone();
    let user = state.auth.register("frank", "secret").await.unwrap();

    // Worker 未启动，订单停留在队列和在途登记表中
    state.orders.submit_order(user.user_id, ORDER_A).await.unwrap();
    state.orders.submit_order(user.user_id, ORDER_B).await.unwrap();
    assert_eq!(state.in_flight.len(), 2);

    let report = t.app.sweeper.sweep_once().await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.queued, 0);
    assert_eq!(report.skipped, 2);
}

#[tokio::test]
async fn test_sweep_reaches_orders_behind_stuck_ones() {
    let mut config = test_config();
    config.reconciliation.sweep_batch_size = 1;
    let t = build_app(&config);
    let state = t.app.state.clone();
    let user = state.auth.register("heidi", "secret").await.unwrap();

    // 较早的订单一直在途；较晚的订单错过了首次派发
    state.orders.submit_order(user.user_id, ORDER_A).await.unwrap();
    t.store.insert_order(user.user_id, ORDER_B).await.unwrap();
    assert!(!state.in_flight.contains(ORDER_B));

    let first = t.app.sweeper.sweep_once().await.unwrap();
    let second = t.app.sweeper.sweep_once().await.unwrap();
    assert_eq!((first.scanned, second.scanned), (1, 1));
    assert_eq!(first.queued + second.queued, 1);
    assert!(state.in_flight.contains(ORDER_B));

    // 扫到末尾后回到开头
    let third = t.app.sweeper.sweep_once().await.unwrap();
    assert_eq!(third.scanned, 1);
    assert_eq!(third.skipped, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_processed_results_credit_once() {
    let t = build_app(&test_config());
    let user = t.app.state.auth.register("ivan", "secret").await.unwrap();
    t.store.insert_order(user.user_id, ORDER_A).await.unwrap();

    let result = AccrualResult {
        order: ORDER_A.to_string(),
        status: OrderStatus::Processed,
        accrual: Some(dec(500.0)),
    };
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = t.store.clone();
            let result = result.clone();
            tokio::spawn(async move { store.apply_accrual(user.user_id, &result).await })
        })
        .collect();

    let outcomes: Vec<ApplyOutcome> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    assert_eq!(outcomes.iter().filter(|o| o.is_applied()).count(), 1);

    let balance = t.store.get_balance(user.user_id).await.unwrap();
    assert_eq!(balance.current, dec(500.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_have_single_owner() {
    let t = build_app(&test_config());
    let state = t.app.state.clone();
    let alice = state.auth.register("alice", "secret").await.unwrap();
    let bob = state.auth.register("bob", "secret").await.unwrap();

    let handles: Vec<_> = [alice.user_id, bob.user_id]
        .into_iter()
        .map(|user_id| {
            let orders = Arc::clone(&state.orders);
            tokio::spawn(async move { orders.submit_order(user_id, ORDER_A).await })
        })
        .collect();

    let mut outcomes: Vec<SubmitOutcome> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    outcomes.sort_by_key(|o| o.label());
    assert_eq!(
        outcomes,
        vec![SubmitOutcome::Accepted, SubmitOutcome::OwnedByOther]
    );

    let owner = t.store.find_order_owner(ORDER_A).await.unwrap();
    assert!(owner == Some(alice.user_id) || owner == Some(bob.user_id));
}

#[tokio::test]
async fn test_resubmission_and_foreign_order() {
    let t = build_app(&test_config());
    let state = t.app.state.clone();
    let alice = state.auth.register("alice", "secret").await.unwrap();
    let bob = state.auth.register("bob", "secret").await.unwrap();

    assert_eq!(
        state.orders.submit_order(alice.user_id, ORDER_A).await.unwrap(),
        SubmitOutcome::Accepted
    );
    assert_eq!(
        state.orders.submit_order(alice.user_id, ORDER_A).await.unwrap(),
        SubmitOutcome::AlreadyOwnedBySelf
    );
    assert_eq!(
        state.orders.submit_order(bob.user_id, ORDER_A).await.unwrap(),
        SubmitOutcome::OwnedByOther
    );

    // 重复上传不产生新订单，也不影响对方
    assert_eq!(
        state.orders.list_orders(alice.user_id).await.unwrap().into_vec().len(),
        1
    );
    assert!(matches!(
        state.orders.list_orders(bob.user_id).await.unwrap(),
        Listing::Empty
    ));
}

#[tokio::test]
async fn test_withdraw_after_accrual() {
    let t = build_app(&test_config());
    t.accrual.script(
        ORDER_A,
        vec![registered(ORDER_A, OrderStatus::Processed, Some(dec(500.0)))],
    );

    let state = t.app.state.clone();
    let user = state.auth.register("grace", "secret").await.unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(t.app.worker.run(shutdown_rx));

    state.orders.submit_order(user.user_id, ORDER_A).await.unwrap();
    let store = t.store.clone();
    eventually("积分入账", || {
        store
            .order(ORDER_A)
            .is_some_and(|o| o.status == OrderStatus::Processed)
    })
    .await;

    // 余额不足不改变余额
    let err = state
        .balances
        .withdraw(user.user_id, WITHDRAW_ORDER, dec(751.0))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");

    let withdrawal = state
        .balances
        .withdraw(user.user_id, WITHDRAW_ORDER, dec(200.0))
        .await
        .unwrap();
    assert_eq!(withdrawal.sum, dec(200.0));

    let balance = state.balances.get_balance(user.user_id).await.unwrap();
    assert_eq!(balance.current, dec(300.0));
    assert_eq!(balance.withdrawn, dec(200.0));

    let history = state
        .balances
        .withdrawal_history(user.user_id)
        .await
        .unwrap()
        .into_vec();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].order_number, WITHDRAW_ORDER);

    shutdown_tx.send(true).unwrap();
    worker.await.unwrap();
}
