use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// 订单 (仅对账需要的字段)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub payment_total: BigDecimal, // 应付金额 = 总额 + 识别码
    pub payment_status: String,
    pub payment_method: String,
    pub payment_proof: Option<String>, // 买家上传的转账凭证
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn unpaid(
        id: impl Into<String>,
        created_at: DateTime<Utc>,
        payment_total: BigDecimal,
        payment_method: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            created_at,
            payment_total,
            payment_status: PaymentStatus::Unpaid.to_string(),
            payment_method: payment_method.into(),
            payment_proof: None,
            paid_at: None,
        }
    }

    /// 下单时按 [`PaymentTotal`] 生成应付金额
    pub fn checkout(
        id: impl Into<String>,
        created_at: DateTime<Utc>,
        total: &PaymentTotal,
        payment_method: impl Into<String>,
    ) -> Self {
        Self::unpaid(id, created_at, total.amount(), payment_method)
    }

    pub fn status(&self) -> Option<PaymentStatus> {
        self.payment_status.parse().ok()
    }

    /// paid_at 有值或状态为 paid 都视为已付款
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some() || self.status() == Some(PaymentStatus::Paid)
    }

    pub fn mark_paid(&mut self, at: DateTime<Utc>) {
        self.paid_at = Some(at);
        self.payment_status = PaymentStatus::Paid.to_string();
    }

    /// 执行人工支付操作，当前状态不允许时返回 false 且不做修改
    pub fn apply(&mut self, action: PaymentAction, proof: Option<&str>, at: DateTime<Utc>) -> bool {
        if !self.status().is_some_and(|s| action.allowed_from().contains(&s)) {
            return false;
        }

        match action.target() {
            PaymentStatus::Paid => self.mark_paid(at),
            target => self.payment_status = target.to_string(),
        }
        if let Some(proof) = proof {
            self.payment_proof = Some(proof.to_string());
        }
        true
    }
}

/// 自动对账之外的人工支付操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentAction {
    /// 买家上传转账凭证，等待审核
    SubmitProof,
    /// 管理员确认凭证
    Approve,
    /// 管理员驳回凭证，买家可重新上传
    Reject,
    /// 管理员直接标记已付款
    PayManual,
}

impl PaymentAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentAction::SubmitProof => "submit_proof",
            PaymentAction::Approve => "approve",
            PaymentAction::Reject => "reject",
            PaymentAction::PayManual => "pay_manual",
        }
    }

    pub fn allowed_from(self) -> &'static [PaymentStatus] {
        match self {
            PaymentAction::SubmitProof => &[PaymentStatus::Unpaid, PaymentStatus::Rejected],
            PaymentAction::Approve | PaymentAction::Reject => &[PaymentStatus::WaitingReview],
            PaymentAction::PayManual => &[
                PaymentStatus::Unpaid,
                PaymentStatus::WaitingReview,
                PaymentStatus::Rejected,
            ],
        }
    }

    pub fn target(self) -> PaymentStatus {
        match self {
            PaymentAction::SubmitProof => PaymentStatus::WaitingReview,
            PaymentAction::Approve | PaymentAction::PayManual => PaymentStatus::Paid,
            PaymentAction::Reject => PaymentStatus::Rejected,
        }
    }
}

/// 订单支付状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    WaitingReview,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::WaitingReview => "waiting_review",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            "waiting_review" => Ok(PaymentStatus::WaitingReview),
            "rejected" => Ok(PaymentStatus::Rejected),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

pub const MIN_UNIQUE_CODE: u32 = 100;
pub const MAX_UNIQUE_CODE: u32 = 999;

/// 下单时确定的应付金额：订单总额 + 三位识别码
///
/// 识别码让总额相同的订单在银行流水里也能区分开，见 [`Order::checkout`]。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTotal {
    pub grand_total: BigDecimal,
    pub unique_code: u32,
}

impl PaymentTotal {
    pub fn new(grand_total: BigDecimal, unique_code: u32) -> AppResult<Self> {
        if !(MIN_UNIQUE_CODE..=MAX_UNIQUE_CODE).contains(&unique_code) {
            return Err(AppError::InvalidUniqueCode(unique_code));
        }
        Ok(Self { grand_total, unique_code })
    }

    /// 随机生成识别码
    pub fn generate(grand_total: BigDecimal) -> Self {
        let unique_code = rand::thread_rng().gen_range(MIN_UNIQUE_CODE..=MAX_UNIQUE_CODE);
        Self { grand_total, unique_code }
    }

    pub fn amount(&self) -> BigDecimal {
        self.grand_total.clone() + BigDecimal::from(self.unique_code)
    }
}
