//! 订单上传与查询

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::auth::AuthUser;
use crate::api::dto::OrderResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::error::LoyaltyError;
use crate::models::Listing;
use crate::service::SubmitOutcome;

/// 上传订单号（纯文本请求体）
///
/// POST /api/user/orders
/// - 202 新订单已受理
/// - 200 本人已上传过
/// - 409 已被其他用户上传
/// - 422 订单号格式错误
pub async fn upload_order(
    State(state): State<AppState>,
    user: AuthUser,
    body: String,
) -> ApiResult<StatusCode> {
    let number = body.trim();
    if number.is_empty() {
        return Err(ApiError::BadRequest("订单号不能为空".into()));
    }

    match state.orders.submit_order(user.user_id, number).await? {
        SubmitOutcome::Accepted => Ok(StatusCode::ACCEPTED),
        SubmitOutcome::AlreadyOwnedBySelf => Ok(StatusCode::OK),
        SubmitOutcome::OwnedByOther => {
            Err(LoyaltyError::OrderConflict(number.to_string()).into())
        }
    }
}

/// 当前用户的订单列表，按上传时间升序；没有订单返回 204
///
/// GET /api/user/orders
pub async fn list_orders(State(state): State<AppState>, user: AuthUser) -> ApiResult<Response> {
    let orders = state.orders.list_orders(user.user_id).await?;

    Ok(match orders.map(OrderResponse::from) {
        Listing::Empty => StatusCode::NO_CONTENT.into_response(),
        Listing::Items(items) => Json(items).into_response(),
    })
}
