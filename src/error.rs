use thiserror::Error;

/// 服务统一错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// 条件更新未命中：流水已被其他请求配对
    #[error("Bank transaction {0} is already matched")]
    AlreadyMatched(i64),

    /// 条件更新未命中：订单已不是 unpaid
    #[error("Order {0} is not unpaid")]
    OrderNotUnpaid(String),

    /// 当前支付状态不允许该操作
    #[error("Order {order_id} is {status}, cannot {action}")]
    OrderStatusConflict {
        order_id: String,
        status: String,
        action: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Order {0} not found")]
    OrderNotFound(String),

    #[error("Bank transaction {0} not found")]
    TransactionNotFound(i64),

    #[error("Payment unique code {0} is outside 100..=999")]
    InvalidUniqueCode(u32),
}

pub type AppResult<T> = Result<T, AppError>;
