use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::models::{BankTransaction, Order};

/// 时间差在此窗口内加 1 分，同时也是"陈旧"判定线
pub const NEAR_WINDOW_HOURS: i64 = 24;
/// 时间差在此窗口内再加 1 分
pub const CLOSE_WINDOW_HOURS: i64 = 6;
/// 附言包含订单号时的加分
pub const NOTE_HINT_POINTS: i32 = 2;
/// 超出 24 小时的候选至少需要的分数
pub const MIN_STALE_SCORE: i32 = 2;

/// 金额四舍五入到整数货币单位 (0.5 远离零)
///
/// 超出 i64 范围时返回 None。
pub fn round_to_unit(amount: &BigDecimal) -> Option<i64> {
    let whole = amount.with_scale(0); // 向零截断
    let frac = amount - &whole;
    let mut units = whole.to_i64()?;

    if frac.abs() * BigDecimal::from(2) >= BigDecimal::from(1) {
        if *amount < BigDecimal::zero() {
            units = units.checked_sub(1)?;
        } else {
            units = units.checked_add(1)?;
        }
    }

    Some(units)
}

/// 订单与流水的匹配评分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchScore {
    pub score: i32,
    pub time_diff: Duration, // 绝对时间差
}

impl MatchScore {
    /// 分数高者优先，同分取时间差更小者
    pub fn beats(&self, other: &MatchScore) -> bool {
        self.score > other.score || (self.score == other.score && self.time_diff < other.time_diff)
    }

    /// 时间差超过 24 小时且分数不足 2：证据不足，不能只凭金额配对
    pub fn is_weak_evidence(&self) -> bool {
        self.time_diff > Duration::hours(NEAR_WINDOW_HOURS) && self.score < MIN_STALE_SCORE
    }
}

/// 计算订单与流水的匹配评分
/// 返回 (分数, 绝对时间差)
pub fn calculate_match_score(order: &Order, tx: &BankTransaction) -> MatchScore {
    let mut score = 0;

    let diff = abs_duration(tx.trx_time - order.created_at);
    if diff <= Duration::hours(NEAR_WINDOW_HOURS) {
        score += 1;
    }
    if diff <= Duration::hours(CLOSE_WINDOW_HOURS) {
        score += 1;
    }

    if note_mentions_order(&tx.note, &order.id) {
        score += NOTE_HINT_POINTS;
    }

    MatchScore { score, time_diff: diff }
}

fn abs_duration(d: Duration) -> Duration {
    if d < Duration::zero() {
        -d
    } else {
        d
    }
}

/// 附言是否包含订单号 (不区分大小写)
fn note_mentions_order(note: &str, order_id: &str) -> bool {
    if note.is_empty() || order_id.is_empty() {
        return false;
    }
    note.to_lowercase().contains(&order_id.to_lowercase())
}

/// 金额索引：整数金额 -> 流水下标列表
///
/// 下标指向构建时传入的流水切片，选中的流水会被移出索引，保证单次对账内不重复使用。
#[derive(Debug, Default)]
pub struct AmountIndex {
    by_amount: HashMap<i64, Vec<usize>>,
}

impl AmountIndex {
    /// 从流水列表构建索引，已配对的流水不会进入索引
    pub fn from_transactions(transactions: &[BankTransaction]) -> Self {
        let mut by_amount: HashMap<i64, Vec<usize>> = HashMap::new();

        for (idx, tx) in transactions.iter().enumerate() {
            if tx.matched {
                continue;
            }
            let Some(key) = round_to_unit(&tx.amount) else {
                tracing::warn!("Bank transaction {} amount {} out of range, ignored", tx.id, tx.amount);
                continue;
            };
            by_amount.entry(key).or_default().push(idx);
        }

        Self { by_amount }
    }

    /// 获取某金额下的候选流水下标
    pub fn candidates(&self, amount: i64) -> &[usize] {
        self.by_amount.get(&amount).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 从候选中挑出评分最高的流水
    /// 返回 (流水下标, 评分)
    pub fn best_candidate(
        &self,
        amount: i64,
        order: &Order,
        transactions: &[BankTransaction],
    ) -> Option<(usize, MatchScore)> {
        let mut best: Option<(usize, MatchScore)> = None;

        for &idx in self.candidates(amount) {
            let score = calculate_match_score(order, &transactions[idx]);

            let is_better = match &best {
                None => true,
                Some((_, best_score)) => score.beats(best_score),
            };

            if is_better {
                best = Some((idx, score));
            }
        }

        best
    }

    /// 移出某条流水，之后的订单不会再看到它
    pub fn take(&mut self, amount: i64, idx: usize) {
        if let Some(list) = self.by_amount.get_mut(&amount) {
            list.retain(|&i| i != idx);
            if list.is_empty() {
                self.by_amount.remove(&amount);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_amount.is_empty()
    }

    /// 剩余候选流水数量
    pub fn remaining(&self) -> usize {
        self.by_amount.values().map(Vec::len).sum()
    }
}

/// 订单未配对的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// 没有同金额的流水
    NoCandidate,
    /// 最佳候选超过 24 小时且分数不足
    WeakEvidence,
    /// 写库失败
    PersistFailed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::NoCandidate => "no bank transaction with the same amount",
            SkipReason::WeakEvidence => "best candidate is older than 24h without a note hint",
            SkipReason::PersistFailed => "failed to persist the pairing",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedOrder {
    pub order_id: String,
    pub reason: SkipReason,
    pub detail: Option<String>,
}

/// 成功配对的订单与流水
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedPair {
    pub order_id: String,
    pub transaction_id: i64,
    pub amount: BigDecimal,
    pub score: i32,
    pub time_diff_secs: i64,
    pub matched_at: DateTime<Utc>,
}

/// 单次自动对账结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub matched: usize,
    pub pairs: Vec<MatchedPair>,
    pub skipped: Vec<SkippedOrder>,
}

impl ReconcileReport {
    pub fn skip(&mut self, order_id: &str, reason: SkipReason, detail: Option<String>) {
        self.skipped.push(SkippedOrder {
            order_id: order_id.to_string(),
            reason,
            detail,
        });
    }

    pub fn record(&mut self, pair: MatchedPair) {
        self.matched += 1;
        self.pairs.push(pair);
    }
}
