//! HTTP 接口测试

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use bigdecimal::BigDecimal;
use chrono::{Duration, TimeZone, Utc};
use payment_reconciler::models::Order;
use payment_reconciler::{api, AppState, MemoryStore};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const STATEMENT: &str = "\
Tanggal;Deskripsi;Debit;Kredit;Saldo
01/03/2024;TRSF E-BANKING CR ORDER-42;;344.389,00;1.344.389,00
01/03/2024;BIAYA ADM;15.000,00;;1.329.389,00
";

fn app(store: Arc<MemoryStore>) -> axum::Router {
    api::router(AppState::new(store, "Transfer Bank", "BCA"))
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let response = app(Arc::new(MemoryStore::new()))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_import_then_auto_match() {
    let store = Arc::new(MemoryStore::new());
    // 流水日期为 2024-03-01 00:00，订单在 40 小时后创建，靠附言中的订单号配对
    let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(40);
    store
        .insert_order(Order::unpaid("order-42", created_at, BigDecimal::from(344_389), "Transfer Bank"))
        .await;

    let response = app(store.clone())
        .oneshot(
            Request::post("/api/payments/import")
                .header("content-type", "text/csv")
                .body(Body::from(STATEMENT))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["imported"], 1);
    assert_eq!(body["skipped_rows"], 1);

    let response = app(store.clone())
        .oneshot(Request::post("/api/payments/auto-match").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["matched"], 1);
    assert!(store.order("order-42").await.unwrap().is_paid());

    let tx = store.transaction(1).await.unwrap();
    assert_eq!(tx.bank, "BCA");
    assert_eq!(tx.matched_order.as_deref(), Some("order-42"));
}

#[tokio::test]
async fn test_auto_match_reports_skipped_orders() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_order(Order::unpaid("lonely", Utc::now(), BigDecimal::from(70_111), "Transfer Bank"))
        .await;

    let response = app(store.clone())
        .oneshot(
            Request::post("/api/payments/import")
                .body(Body::from("Tanggal;Deskripsi;Debit;Kredit;Saldo\n01/03/2024;SETORAN;;10.000;10.000\n"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(store)
        .oneshot(Request::post("/api/payments/auto-match").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["matched"], 0);
    assert_eq!(body["skipped"][0]["order_id"], "lonely");
    assert_eq!(body["skipped"][0]["reason"], "no_candidate");
}

#[tokio::test]
async fn test_list_bank_transactions_newest_first() {
    let store = Arc::new(MemoryStore::new());
    let statement = "\
Tanggal;Deskripsi;Debit;Kredit;Saldo
01/03/2024;A;;1.000;1.000
03/03/2024;B;;2.000;3.000
02/03/2024;C;;3.000;6.000
";

    app(store.clone())
        .oneshot(Request::post("/api/payments/import").body(Body::from(statement)).unwrap())
        .await
        .unwrap();

    let response = app(store)
        .oneshot(
            Request::get("/api/payments/bank-transactions?limit=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["note"], "B");
    assert_eq!(body["data"][1]["note"], "C");
}

#[tokio::test]
async fn test_non_text_statement_is_bad_request() {
    let response = app(Arc::new(MemoryStore::new()))
        .oneshot(
            Request::post("/api/payments/import")
                .body(Body::from(vec![0xffu8, 0xfe, b';', b'\n']))
                .unwrap(),
        )
        .await
        .unwrap();

    // String 提取器先拒绝非 UTF-8 请求体
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

async fn post_json(store: Arc<MemoryStore>, uri: &str, body: &str) -> axum::response::Response {
    app(store)
        .oneshot(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_payment_proof_review_routes() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_order(Order::unpaid("order-7", Utc::now(), BigDecimal::from(52_431), "Transfer Bank"))
        .await;

    let response = post_json(store.clone(), "/api/orders/order-7/payment-proof", r#"{"proof":"order-7.jpg"}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["payment_status"], "waiting_review");

    let response = post_json(store.clone(), "/api/orders/order-7/payment/reject", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["payment_status"], "rejected");

    post_json(store.clone(), "/api/orders/order-7/payment-proof", r#"{"proof":"order-7-b.jpg"}"#).await;
    let response = post_json(store.clone(), "/api/orders/order-7/payment/approve", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["payment_status"], "paid");
    assert_eq!(body["changed"], true);

    assert!(store.order("order-7").await.unwrap().is_paid());
}

#[tokio::test]
async fn test_approve_unpaid_order_is_conflict() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_order(Order::unpaid("order-8", Utc::now(), BigDecimal::from(52_432), "Transfer Bank"))
        .await;

    let response = post_json(store.clone(), "/api/orders/order-8/payment/approve", "").await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["success"], false);
    assert!(!store.order("order-8").await.unwrap().is_paid());
}

#[tokio::test]
async fn test_pay_manual_route() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_order(Order::unpaid("order-9", Utc::now(), BigDecimal::from(52_433), "Transfer Bank"))
        .await;

    let response = post_json(store.clone(), "/api/orders/order-9/pay-manual", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["changed"], true);

    let response = post_json(store.clone(), "/api/orders/order-9/pay-manual", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["changed"], false);
    assert_eq!(body["message"], "Order is already paid");

    let response = post_json(store, "/api/orders/missing/pay-manual", "").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_payment_proof_is_bad_request() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_order(Order::unpaid("order-10", Utc::now(), BigDecimal::from(52_434), "Transfer Bank"))
        .await;

    let response = post_json(store.clone(), "/api/orders/order-10/payment-proof", r#"{"proof":""}"#).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.order("order-10").await.unwrap().payment_status, "unpaid");
}
