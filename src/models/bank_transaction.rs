use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 银行流水 (bank_transactions)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: i64,
    pub bank: String,
    pub account: String,
    pub amount: BigDecimal,
    pub note: String,                    // 银行附言
    pub ref_code: String,
    pub trx_time: DateTime<Utc>,
    pub matched: bool,
    pub matched_order: Option<String>,   // orders.id
    pub matched_at: Option<DateTime<Utc>>,
}

/// 导入时写入的新流水，尚未配对
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBankTransaction {
    pub bank: String,
    pub account: String,
    pub amount: BigDecimal,
    pub note: String,
    pub ref_code: String,
    pub trx_time: DateTime<Utc>,
}

impl NewBankTransaction {
    pub fn into_transaction(self, id: i64) -> BankTransaction {
        BankTransaction {
            id,
            bank: self.bank,
            account: self.account,
            amount: self.amount,
            note: self.note,
            ref_code: self.ref_code,
            trx_time: self.trx_time,
            matched: false,
            matched_order: None,
            matched_at: None,
        }
    }
}
