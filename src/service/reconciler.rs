use chrono::Utc;
use std::sync::Arc;

use crate::db::PaymentStore;
use crate::error::AppResult;
use crate::models::{
    round_to_unit, AmountIndex, BankTransaction, MatchedPair, Order, ReconcileReport, SkipReason,
};

/// 银行转账自动对账服务
///
/// 按金额把未付款订单和未配对流水配对：先用整数金额索引找同金额候选，
/// 再按时间接近度和附言中的订单号挑出最佳流水。每个订单独立做贪心选择，
/// 不做全局最优分配。
pub struct PaymentReconciler {
    store: Arc<dyn PaymentStore>,
    payment_method: String,
}

impl PaymentReconciler {
    pub fn new(store: Arc<dyn PaymentStore>, payment_method: impl Into<String>) -> Self {
        Self {
            store,
            payment_method: payment_method.into(),
        }
    }

    /// 对账入口：读取订单和流水后执行配对
    ///
    /// 只有读取失败会返回错误；单笔配对写库失败只会记录到报告里。
    pub async fn run(&self) -> AppResult<ReconcileReport> {
        let orders = self.store.list_unpaid_transfer_orders(&self.payment_method).await?;
        if orders.is_empty() {
            tracing::info!("[Auto-Match] 没有待付款的{}订单", self.payment_method);
            return Ok(ReconcileReport::default());
        }

        let transactions = self.store.list_unmatched_transactions().await?;
        if transactions.is_empty() {
            tracing::info!("[Auto-Match] 没有未配对的银行流水");
            return Ok(ReconcileReport::default());
        }

        Ok(self.reconcile(&orders, &transactions).await)
    }

    /// 按输入顺序逐个订单配对
    pub async fn reconcile(&self, orders: &[Order], transactions: &[BankTransaction]) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        if orders.is_empty() || transactions.is_empty() {
            return report;
        }

        // Phase 1: 构建金额索引
        let mut index = AmountIndex::from_transactions(transactions);

        tracing::info!(
            "[Auto-Match] 开始对账: {} 个订单, {} 条候选流水",
            orders.len(), index.remaining()
        );

        // Phase 2: 逐个订单选择最佳流水
        for order in orders {
            let Some(amount) = round_to_unit(&order.payment_total) else {
                tracing::warn!("[Auto-Match] Order {}: 金额 {} 超出范围", order.id, order.payment_total);
                report.skip(&order.id, SkipReason::NoCandidate, None);
                continue;
            };

            let Some((idx, best)) = index.best_candidate(amount, order, transactions) else {
                tracing::debug!("[Auto-Match] Order {}: 没有金额为 {} 的流水", order.id, amount);
                report.skip(&order.id, SkipReason::NoCandidate, None);
                continue;
            };

            let tx = &transactions[idx];

            if best.is_weak_evidence() {
                tracing::info!(
                    "[Auto-Match] Order {}: 跳过流水 {}, 分数 {}, 时间差 {}h",
                    order.id, tx.id, best.score, best.time_diff.num_hours()
                );
                report.skip(
                    &order.id,
                    SkipReason::WeakEvidence,
                    Some(format!(
                        "transaction {} score {} time diff {}h",
                        tx.id, best.score, best.time_diff.num_hours()
                    )),
                );
                continue;
            }

            // 选中即移出索引，本轮不再参与其他订单的配对
            index.take(amount, idx);

            // Phase 3: 写库 (订单 + 流水在同一事务内)
            let now = Utc::now();
            if let Err(e) = self.store.mark_paired(&order.id, tx.id, now).await {
                tracing::warn!(
                    "[Auto-Match] Order {}: 与流水 {} 配对写库失败: {}",
                    order.id, tx.id, e
                );
                report.skip(&order.id, SkipReason::PersistFailed, Some(e.to_string()));
                continue;
            }

            tracing::info!(
                "[Auto-Match] Order {} <- 流水 {}, 金额 {}, 分数 {}",
                order.id, tx.id, tx.amount, best.score
            );

            report.record(MatchedPair {
                order_id: order.id.clone(),
                transaction_id: tx.id,
                amount: tx.amount.clone(),
                score: best.score,
                time_diff_secs: best.time_diff.num_seconds(),
                matched_at: now,
            });
        }

        tracing::info!(
            "[Auto-Match] 对账完成: 配对 {}/{}, 跳过 {}",
            report.matched, orders.len(), report.skipped.len()
        );

        report
    }
}
