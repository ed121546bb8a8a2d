pub mod handlers;

pub use handlers::*;

use crate::db::PaymentStore;
use crate::service::PaymentReconciler;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;

/// 请求共享状态
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<PaymentReconciler>,
    pub store: Arc<dyn PaymentStore>,
    pub bank_label: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        payment_method: impl Into<String>,
        bank_label: impl Into<String>,
    ) -> Self {
        Self {
            reconciler: Arc::new(PaymentReconciler::new(store.clone(), payment_method)),
            store,
            bank_label: bank_label.into(),
        }
    }
}

/// 构建路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/payments/auto-match", post(auto_match))
        .route("/api/payments/import", post(import_statement))
        .route("/api/payments/bank-transactions", get(list_bank_transactions))
        .route("/api/orders/:id/payment-proof", post(submit_payment_proof))
        .route("/api/orders/:id/payment/approve", post(approve_payment))
        .route("/api/orders/:id/payment/reject", post(reject_payment))
        .route("/api/orders/:id/pay-manual", post(pay_manual))
        .with_state(state)
        .layer(ServiceBuilder::new())
}
