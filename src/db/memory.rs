//! 内存存储实现，用于测试和本地调试

use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::RwLock;

use crate::db::PaymentStore;
use crate::error::{AppError, AppResult};
use crate::models::{BankTransaction, NewBankTransaction, Order, PaymentAction, PaymentStatus};

#[derive(Debug, Default)]
pub struct MemoryStore {
    orders: RwLock<Vec<Order>>,
    transactions: RwLock<Vec<BankTransaction>>,
    /// mark_paired 对这些订单返回错误，模拟写库失败
    failing_orders: RwLock<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_order(&self, order: Order) {
        self.orders.write().await.push(order);
    }

    pub async fn order(&self, id: &str) -> Option<Order> {
        self.orders.read().await.iter().find(|o| o.id == id).cloned()
    }

    pub async fn transaction(&self, id: i64) -> Option<BankTransaction> {
        self.transactions.read().await.iter().find(|t| t.id == id).cloned()
    }

    pub async fn transactions(&self) -> Vec<BankTransaction> {
        self.transactions.read().await.clone()
    }

    pub async fn fail_pairing_for(&self, order_id: &str) {
        self.failing_orders.write().await.insert(order_id.to_string());
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn list_unpaid_transfer_orders(&self, payment_method: &str) -> AppResult<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .filter(|o| {
                o.status() == Some(PaymentStatus::Unpaid)
                    && o.payment_method == payment_method
                    && o.payment_total > BigDecimal::zero()
            })
            .cloned()
            .collect())
    }

    async fn list_unmatched_transactions(&self) -> AppResult<Vec<BankTransaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.iter().filter(|t| !t.matched).cloned().collect())
    }

    async fn mark_paired(&self, order_id: &str, transaction_id: i64, at: DateTime<Utc>) -> AppResult<()> {
        if self.failing_orders.read().await.contains(order_id) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }

        // 锁顺序固定: orders -> transactions
        let mut orders = self.orders.write().await;
        let mut transactions = self.transactions.write().await;

        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| AppError::OrderNotFound(order_id.to_string()))?;
        let tx = transactions
            .iter_mut()
            .find(|t| t.id == transaction_id)
            .ok_or(AppError::TransactionNotFound(transaction_id))?;

        if tx.matched {
            return Err(AppError::AlreadyMatched(transaction_id));
        }
        if order.status() != Some(PaymentStatus::Unpaid) {
            return Err(AppError::OrderNotUnpaid(order_id.to_string()));
        }

        tx.matched = true;
        tx.matched_order = Some(order_id.to_string());
        tx.matched_at = Some(at);
        order.mark_paid(at);

        Ok(())
    }

    async fn apply_payment_action(
        &self,
        order_id: &str,
        action: PaymentAction,
        proof: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| AppError::OrderNotFound(order_id.to_string()))?;

        if !order.apply(action, proof, at) {
            return Err(AppError::OrderStatusConflict {
                order_id: order_id.to_string(),
                status: order.payment_status.clone(),
                action: action.as_str().to_string(),
            });
        }

        Ok(order.clone())
    }

    async fn insert_transactions(&self, new_transactions: &[NewBankTransaction]) -> AppResult<u64> {
        let mut transactions = self.transactions.write().await;
        let mut next_id = transactions.iter().map(|t| t.id).max().unwrap_or(0) + 1;

        for tx in new_transactions {
            transactions.push(tx.clone().into_transaction(next_id));
            next_id += 1;
        }

        Ok(new_transactions.len() as u64)
    }

    async fn recent_transactions(&self, limit: i64) -> AppResult<Vec<BankTransaction>> {
        let mut transactions = self.transactions.read().await.clone();
        transactions.sort_by(|a, b| b.trx_time.cmp(&a.trx_time).then_with(|| b.id.cmp(&a.id)));
        transactions.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(transactions)
    }
}
