//! 余额、提现与提现记录

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::auth::AuthUser;
use crate::api::dto::{BalanceResponse, WithdrawRequest, WithdrawalResponse, parse_json};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::models::Listing;

/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<BalanceResponse>> {
    let balance = state.balances.get_balance(user.user_id).await?;
    Ok(Json(balance.into()))
}

/// 使用积分抵扣订单
///
/// POST /api/user/balance/withdraw
/// - 402 余额不足
/// - 422 订单号格式错误
pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthUser,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let req: WithdrawRequest = parse_json(&body)?;
    state
        .balances
        .withdraw(user.user_id, &req.order, req.sum)
        .await?;
    Ok(StatusCode::OK)
}

/// 提现记录，按处理时间升序；没有记录返回 204
///
/// GET /api/user/withdrawals
pub async fn list_withdrawals(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Response> {
    let withdrawals = state.balances.withdrawal_history(user.user_id).await?;

    Ok(match withdrawals.map(WithdrawalResponse::from) {
        Listing::Empty => StatusCode::NO_CONTENT.into_response(),
        Listing::Items(items) => Json(items).into_response(),
    })
}
