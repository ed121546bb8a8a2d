use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::db::queries;
use crate::error::AppResult;
use crate::models::{BankTransaction, NewBankTransaction, Order, PaymentAction};

/// 对账所需的数据访问接口
///
/// 生产环境使用 [`PgPaymentStore`]，测试使用 [`crate::db::MemoryStore`]。
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// 未付款、指定支付方式、应付金额 > 0 的订单
    async fn list_unpaid_transfer_orders(&self, payment_method: &str) -> AppResult<Vec<Order>>;

    /// 尚未配对的银行流水
    async fn list_unmatched_transactions(&self) -> AppResult<Vec<BankTransaction>>;

    /// 原子地将订单标记为已付款、流水标记为已配对
    ///
    /// 流水已被配对时返回 `AppError::AlreadyMatched`，订单已不是 unpaid 时返回
    /// `AppError::OrderNotUnpaid`，两种情况下都不做任何修改。
    async fn mark_paired(&self, order_id: &str, transaction_id: i64, at: DateTime<Utc>) -> AppResult<()>;

    /// 人工支付操作 (上传凭证 / 审核通过 / 驳回 / 手动标记已付款)
    ///
    /// 当前状态不在 `action.allowed_from()` 内时返回 `AppError::OrderStatusConflict`，
    /// 订单不存在时返回 `AppError::OrderNotFound`。成功时返回更新后的订单。
    async fn apply_payment_action(
        &self,
        order_id: &str,
        action: PaymentAction,
        proof: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<Order>;

    /// 批量写入新流水，返回写入条数
    async fn insert_transactions(&self, transactions: &[NewBankTransaction]) -> AppResult<u64>;

    /// 最近的流水 (按交易时间倒序)
    async fn recent_transactions(&self, limit: i64) -> AppResult<Vec<BankTransaction>>;
}

/// PostgreSQL 实现
#[derive(Clone)]
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn list_unpaid_transfer_orders(&self, payment_method: &str) -> AppResult<Vec<Order>> {
        Ok(queries::list_unpaid_orders(&self.pool, payment_method).await?)
    }

    async fn list_unmatched_transactions(&self) -> AppResult<Vec<BankTransaction>> {
        Ok(queries::list_unmatched_transactions(&self.pool).await?)
    }

    async fn mark_paired(&self, order_id: &str, transaction_id: i64, at: DateTime<Utc>) -> AppResult<()> {
        queries::mark_paired(&self.pool, order_id, transaction_id, at).await
    }

    async fn apply_payment_action(
        &self,
        order_id: &str,
        action: PaymentAction,
        proof: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<Order> {
        queries::apply_payment_action(&self.pool, order_id, action, proof, at).await
    }

    async fn insert_transactions(&self, transactions: &[NewBankTransaction]) -> AppResult<u64> {
        let mut inserted = 0;
        for chunk in transactions.chunks(1000) {
            inserted += queries::insert_batch(&self.pool, chunk).await?;
        }
        Ok(inserted)
    }

    async fn recent_transactions(&self, limit: i64) -> AppResult<Vec<BankTransaction>> {
        Ok(queries::recent_transactions(&self.pool, limit).await?)
    }
}
