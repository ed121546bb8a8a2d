pub mod bank_transaction;
pub mod matching;
pub mod order;

pub use bank_transaction::{BankTransaction, NewBankTransaction};
pub use matching::{
    calculate_match_score, round_to_unit, AmountIndex, MatchScore, MatchedPair,
    ReconcileReport, SkipReason, SkippedOrder,
};
pub use order::{Order, PaymentAction, PaymentStatus, PaymentTotal};
