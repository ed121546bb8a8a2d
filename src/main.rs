use payment_reconciler::{api, create_pool, db, AppConfig, AppState, PgPaymentStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    // 创建数据库连接池
    let pool = create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;
    info!("Database pool created, migrations applied");

    let store = Arc::new(PgPaymentStore::new(pool));
    let state = AppState::new(
        store,
        config.reconcile.payment_method.clone(),
        config.reconcile.bank_label.clone(),
    );
    let app = api::router(state);

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/payments/auto-match        - 自动对账");
    info!("  POST /api/payments/import            - 导入银行流水 CSV");
    info!("  GET  /api/payments/bank-transactions - 最近流水");
    info!("  POST /api/orders/:id/payment-proof   - 提交转账凭证");
    info!("  POST /api/orders/:id/payment/approve - 审核通过");
    info!("  POST /api/orders/:id/payment/reject  - 驳回凭证");
    info!("  POST /api/orders/:id/pay-manual      - 手动标记已付款");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
