use crate::error::{AppError, AppResult};
use crate::models::{BankTransaction, NewBankTransaction, Order, PaymentAction, PaymentStatus};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// 查询待对账订单 (按下单时间升序)
pub async fn list_unpaid_orders(
    pool: &PgPool,
    payment_method: &str,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT id, created_at, payment_total, payment_status, payment_method, payment_proof, paid_at
        FROM orders
        WHERE payment_status = $1
          AND payment_method = $2
          AND payment_total > 0
          AND deleted_at IS NULL
        ORDER BY created_at ASC, id ASC
        "#
    )
    .bind(PaymentStatus::Unpaid.as_str())
    .bind(payment_method)
    .fetch_all(pool)
    .await
}

/// 查询未配对流水
pub async fn list_unmatched_transactions(
    pool: &PgPool,
) -> Result<Vec<BankTransaction>, sqlx::Error> {
    sqlx::query_as::<_, BankTransaction>(
        r#"
        SELECT id, bank, account, amount, note, ref_code, trx_time,
               matched, matched_order, matched_at
        FROM bank_transactions
        WHERE matched = FALSE
        ORDER BY id ASC
        "#
    )
    .fetch_all(pool)
    .await
}

/// 最近的流水
pub async fn recent_transactions(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<BankTransaction>, sqlx::Error> {
    sqlx::query_as::<_, BankTransaction>(
        r#"
        SELECT id, bank, account, amount, note, ref_code, trx_time,
               matched, matched_order, matched_at
        FROM bank_transactions
        ORDER BY trx_time DESC, id DESC
        LIMIT $1
        "#
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// 在同一个数据库事务中标记订单已付款、流水已配对
///
/// 两条 UPDATE 都带状态条件，并发对账时只有一方能成功认领同一条流水。
pub async fn mark_paired(
    pool: &PgPool,
    order_id: &str,
    transaction_id: i64,
    at: DateTime<Utc>,
) -> AppResult<()> {
    let mut db_tx = pool.begin().await?;

    let claimed = sqlx::query(
        r#"
        UPDATE bank_transactions
        SET matched = TRUE, matched_order = $2, matched_at = $3, updated_at = $3
        WHERE id = $1 AND matched = FALSE
        "#
    )
    .bind(transaction_id)
    .bind(order_id)
    .bind(at)
    .execute(&mut *db_tx)
    .await?;

    if claimed.rows_affected() == 0 {
        db_tx.rollback().await?;
        return Err(AppError::AlreadyMatched(transaction_id));
    }

    let paid = sqlx::query(
        r#"
        UPDATE orders
        SET paid_at = $2, payment_status = $3, updated_at = $2
        WHERE id = $1 AND payment_status = $4
        "#
    )
    .bind(order_id)
    .bind(at)
    .bind(PaymentStatus::Paid.as_str())
    .bind(PaymentStatus::Unpaid.as_str())
    .execute(&mut *db_tx)
    .await?;

    if paid.rows_affected() == 0 {
        db_tx.rollback().await?;
        return Err(AppError::OrderNotUnpaid(order_id.to_string()));
    }

    db_tx.commit().await?;
    Ok(())
}

/// 人工支付操作：只在当前状态允许时更新
///
/// 更新未命中时再查一次当前状态，区分订单不存在和状态冲突。
pub async fn apply_payment_action(
    pool: &PgPool,
    order_id: &str,
    action: PaymentAction,
    proof: Option<&str>,
    at: DateTime<Utc>,
) -> AppResult<Order> {
    let allowed: Vec<&'static str> = action.allowed_from().iter().map(|s| s.as_str()).collect();

    let updated = sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders
        SET payment_status = $2,
            paid_at = CASE WHEN $2 = 'paid' THEN $3 ELSE paid_at END,
            payment_proof = COALESCE($4, payment_proof),
            updated_at = $3
        WHERE id = $1
          AND payment_status = ANY($5)
          AND deleted_at IS NULL
        RETURNING id, created_at, payment_total, payment_status, payment_method, payment_proof, paid_at
        "#
    )
    .bind(order_id)
    .bind(action.target().as_str())
    .bind(at)
    .bind(proof)
    .bind(allowed)
    .fetch_optional(pool)
    .await?;

    if let Some(order) = updated {
        return Ok(order);
    }

    let current = sqlx::query_scalar::<_, String>(
        "SELECT payment_status FROM orders WHERE id = $1 AND deleted_at IS NULL"
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    match current {
        Some(status) => Err(AppError::OrderStatusConflict {
            order_id: order_id.to_string(),
            status,
            action: action.as_str().to_string(),
        }),
        None => Err(AppError::OrderNotFound(order_id.to_string())),
    }
}

/// 批量插入流水
pub async fn insert_batch(
    pool: &PgPool,
    transactions: &[NewBankTransaction],
) -> Result<u64, sqlx::Error> {
    if transactions.is_empty() {
        return Ok(0);
    }

    tracing::debug!("开始构建批量插入语句, {} 条流水", transactions.len());
    let start_time = std::time::Instant::now();

    let mut query_builder = sqlx::QueryBuilder::new(
        "INSERT INTO bank_transactions (
            bank, account, amount, note, ref_code, trx_time, matched
        ) "
    );

    query_builder.push_values(transactions, |mut b, tx| {
        b.push_bind(&tx.bank)
            .push_bind(&tx.account)
            .push_bind(tx.amount.clone())
            .push_bind(&tx.note)
            .push_bind(&tx.ref_code)
            .push_bind(tx.trx_time)
            .push_bind(false);
    });

    tracing::debug!("SQL构建完成, 耗时: {:?}", start_time.elapsed());

    let execute_start = std::time::Instant::now();

    // 超时控制: 30秒
    let execute_result = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        query_builder.build().execute(pool)
    ).await;

    match execute_result {
        Ok(Ok(result)) => {
            tracing::info!("✓ INSERT执行成功, 影响 {} 行, 耗时: {:?}", result.rows_affected(), execute_start.elapsed());
            Ok(result.rows_affected())
        },
        Ok(Err(e)) => {
            tracing::error!("✗ INSERT执行失败, 耗时: {:?}, 错误: {:?}", execute_start.elapsed(), e);
            Err(e)
        },
        Err(_) => {
            tracing::error!("✗ INSERT操作超时 (>30秒)!");
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}
