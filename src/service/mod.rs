pub mod order_payment;
pub mod reconciler;
pub mod statement;

pub use reconciler::PaymentReconciler;
pub use statement::{import_statement, parse_statement, ImportSummary, StatementImport};
pub use order_payment::PaymentUpdate;
