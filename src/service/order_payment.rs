//! 自动对账之外的人工支付流程：买家上传凭证、管理员审核或直接标记已付款

use chrono::Utc;
use serde::Serialize;

use crate::db::PaymentStore;
use crate::error::{AppError, AppResult};
use crate::models::{PaymentAction, PaymentStatus};

/// 凭证引用 (文件名或存储路径) 的最大长度，与 orders.payment_proof 列一致
pub const MAX_PROOF_LEN: usize = 255;

/// 人工支付操作的结果
#[derive(Debug, Clone, Serialize)]
pub struct PaymentUpdate {
    pub order_id: String,
    pub payment_status: String,
    /// false 表示订单已是目标状态，本次没有写库
    pub changed: bool,
}

/// 买家提交转账凭证，订单进入 waiting_review
pub async fn submit_proof(store: &dyn PaymentStore, order_id: &str, proof: &str) -> AppResult<PaymentUpdate> {
    let proof = proof.trim();
    if proof.is_empty() {
        return Err(AppError::InvalidRequest("payment proof is required".to_string()));
    }
    if proof.chars().count() > MAX_PROOF_LEN {
        return Err(AppError::InvalidRequest(format!(
            "payment proof is longer than {} characters",
            MAX_PROOF_LEN
        )));
    }
    apply(store, order_id, PaymentAction::SubmitProof, Some(proof)).await
}

pub async fn approve(store: &dyn PaymentStore, order_id: &str) -> AppResult<PaymentUpdate> {
    apply(store, order_id, PaymentAction::Approve, None).await
}

pub async fn reject(store: &dyn PaymentStore, order_id: &str) -> AppResult<PaymentUpdate> {
    apply(store, order_id, PaymentAction::Reject, None).await
}

/// 管理员直接标记已付款；已付款的订单原样返回
pub async fn pay_manual(store: &dyn PaymentStore, order_id: &str) -> AppResult<PaymentUpdate> {
    match apply(store, order_id, PaymentAction::PayManual, None).await {
        Err(AppError::OrderStatusConflict { status, .. }) if status == PaymentStatus::Paid.as_str() => {
            tracing::info!("[Payment] Order {}: 已是已付款状态，跳过", order_id);
            Ok(PaymentUpdate {
                order_id: order_id.to_string(),
                payment_status: status,
                changed: false,
            })
        }
        other => other,
    }
}

async fn apply(
    store: &dyn PaymentStore,
    order_id: &str,
    action: PaymentAction,
    proof: Option<&str>,
) -> AppResult<PaymentUpdate> {
    let order = store.apply_payment_action(order_id, action, proof, Utc::now()).await?;

    tracing::info!(
        "[Payment] Order {}: {} -> {}",
        order.id, action.as_str(), order.payment_status
    );

    Ok(PaymentUpdate {
        order_id: order.id,
        payment_status: order.payment_status,
        changed: true,
    })
}
