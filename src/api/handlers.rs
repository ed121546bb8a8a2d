use crate::error::{AppError, AppResult};
use crate::models::{BankTransaction, SkippedOrder};
use crate::service::{order_payment, statement, PaymentUpdate};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::AppState;

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 200;

/// 通用响应体
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// 自动对账响应体
#[derive(Debug, Serialize)]
pub struct AutoMatchResponse {
    pub success: bool,
    pub message: String,
    pub matched: usize,
    pub skipped: Vec<SkippedOrder>,
}

/// 流水导入响应体
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub imported: u64,
    pub skipped_rows: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<BankTransaction>,
}

/// 人工支付操作响应体
#[derive(Debug, Serialize)]
pub struct PaymentUpdateResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub update: PaymentUpdate,
}

/// 上传凭证请求体
#[derive(Debug, Deserialize)]
pub struct PaymentProofRequest {
    pub proof: String,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 自动对账接口
pub async fn auto_match(State(state): State<AppState>) -> Response {
    match state.reconciler.run().await {
        Ok(report) => {
            let response = AutoMatchResponse {
                success: true,
                message: format!("Auto-match finished, {} orders matched", report.matched),
                matched: report.matched,
                skipped: report.skipped,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!("Auto-match failed: {}", e);
            error_response(&e)
        }
    }
}

/// 银行流水导入接口 (请求体为 CSV 原文)
pub async fn import_statement(State(state): State<AppState>, body: String) -> Response {
    match statement::import_statement(state.store.as_ref(), body.as_bytes(), &state.bank_label).await {
        Ok(summary) => {
            let response = ImportResponse {
                success: true,
                message: format!("Imported {} bank transactions", summary.imported),
                imported: summary.imported,
                skipped_rows: summary.skipped_rows,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!("Statement import failed: {}", e);
            error_response(&e)
        }
    }
}

/// 最近的银行流水
pub async fn list_bank_transactions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

    match state.store.recent_transactions(limit).await {
        Ok(data) => {
            let response = TransactionListResponse {
                success: true,
                count: data.len(),
                data,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!("Listing bank transactions failed: {}", e);
            error_response(&e)
        }
    }
}

/// 买家提交转账凭证
pub async fn submit_payment_proof(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(body): Json<PaymentProofRequest>,
) -> Response {
    let result = order_payment::submit_proof(state.store.as_ref(), &order_id, &body.proof).await;
    payment_update_response(result, "Payment proof submitted")
}

/// 管理员审核通过
pub async fn approve_payment(State(state): State<AppState>, Path(order_id): Path<String>) -> Response {
    let result = order_payment::approve(state.store.as_ref(), &order_id).await;
    payment_update_response(result, "Payment approved")
}

/// 管理员驳回凭证
pub async fn reject_payment(State(state): State<AppState>, Path(order_id): Path<String>) -> Response {
    let result = order_payment::reject(state.store.as_ref(), &order_id).await;
    payment_update_response(result, "Payment rejected")
}

/// 管理员手动标记已付款
pub async fn pay_manual(State(state): State<AppState>, Path(order_id): Path<String>) -> Response {
    let result = order_payment::pay_manual(state.store.as_ref(), &order_id).await;
    let message = match &result {
        Ok(update) if !update.changed => "Order is already paid",
        _ => "Order marked as paid",
    };
    payment_update_response(result, message)
}

fn payment_update_response(result: AppResult<PaymentUpdate>, message: &str) -> Response {
    match result {
        Ok(update) => {
            let response = PaymentUpdateResponse {
                success: true,
                message: message.to_string(),
                update,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::warn!("Payment action failed: {}", e);
            error_response(&e)
        }
    }
}

fn error_response(e: &AppError) -> Response {
    let status = match e {
        AppError::Csv(_) | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        AppError::OrderNotFound(_) | AppError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
        AppError::OrderStatusConflict { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let response = MessageResponse {
        success: false,
        message: format!("Error: {}", e),
    };
    (status, Json(response)).into_response()
}
