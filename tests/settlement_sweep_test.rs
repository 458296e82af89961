mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::json;
use uuid::Uuid;

use checkout_api::entities::order::OrderStatus;
use checkout_api::entities::Order;

use common::{backdate_order, seed_order, seed_user, TestApp};

async fn status_of(app: &TestApp, order_id: Uuid) -> OrderStatus {
    Order::find_by_id(order_id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn approved_payment_marks_the_order_paid() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    let order = seed_order(app.db(), user.id, OrderStatus::New, "op-paid", dec!(1900)).await;
    app.gateway.set_status("op-paid", "APPROVED");

    let summary = app.state.services.settlement.run_sweep().await.unwrap();

    assert_eq!(summary.examined, 1);
    assert_eq!(summary.marked_paid, 1);
    assert_eq!(summary.marked_canceled, 0);
    assert_eq!(status_of(&app, order.id).await, OrderStatus::Paid);
}

#[tokio::test]
async fn created_stays_pending_and_other_verdicts_cancel() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    let pending = seed_order(app.db(), user.id, OrderStatus::New, "op-created", dec!(500)).await;
    let declined = seed_order(app.db(), user.id, OrderStatus::New, "op-declined", dec!(700)).await;
    app.gateway.set_status("op-created", "CREATED");
    app.gateway.set_status("op-declined", "DECLINED");

    let summary = app.state.services.settlement.run_sweep().await.unwrap();

    assert_eq!(summary.examined, 2);
    assert_eq!(summary.marked_paid, 0);
    assert_eq!(summary.marked_canceled, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(status_of(&app, pending.id).await, OrderStatus::New);
    assert_eq!(status_of(&app, declined.id).await, OrderStatus::Canceled);
}

#[tokio::test]
async fn gateway_failure_skips_the_order_but_not_the_batch() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    // No scripted status: polling this operation fails.
    let unreachable = seed_order(app.db(), user.id, OrderStatus::New, "op-dark", dec!(500)).await;
    let approved = seed_order(app.db(), user.id, OrderStatus::New, "op-ok", dec!(900)).await;
    app.gateway.set_status("op-ok", "APPROVED");

    let summary = app.state.services.settlement.run_sweep().await.unwrap();

    assert_eq!(summary.examined, 2);
    assert_eq!(summary.marked_paid, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(status_of(&app, unreachable.id).await, OrderStatus::New);
    assert_eq!(status_of(&app, approved.id).await, OrderStatus::Paid);
}

#[tokio::test]
async fn stale_orders_expire_even_when_the_gateway_is_down() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    let stale = seed_order(app.db(), user.id, OrderStatus::New, "op-stale", dec!(500)).await;
    let stale_id = stale.id;
    backdate_order(app.db(), stale, 8).await;

    let summary = app.state.services.settlement.run_sweep().await.unwrap();

    assert_eq!(summary.examined, 1);
    assert_eq!(summary.marked_canceled, 1);
    assert_eq!(summary.expired, 1);
    assert_eq!(status_of(&app, stale_id).await, OrderStatus::Canceled);
}

#[tokio::test]
async fn fresh_orders_do_not_expire() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    let fresh = seed_order(app.db(), user.id, OrderStatus::New, "op-fresh", dec!(500)).await;
    let fresh_id = fresh.id;
    // Six days old: inside the payment window, gateway unreachable.
    backdate_order(app.db(), fresh, 6).await;

    let summary = app.state.services.settlement.run_sweep().await.unwrap();

    assert_eq!(summary.expired, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(status_of(&app, fresh_id).await, OrderStatus::New);
}

#[tokio::test]
async fn settled_orders_are_never_touched() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    let paid = seed_order(app.db(), user.id, OrderStatus::Paid, "op-1", dec!(100)).await;
    let shipped = seed_order(app.db(), user.id, OrderStatus::Shipped, "op-2", dec!(200)).await;
    let canceled = seed_order(app.db(), user.id, OrderStatus::Canceled, "op-3", dec!(300)).await;
    // Even a contradictory provider verdict must not resurrect them.
    app.gateway.set_status("op-3", "APPROVED");

    let summary = app.state.services.settlement.run_sweep().await.unwrap();

    assert_eq!(summary.examined, 0);
    assert_eq!(status_of(&app, paid.id).await, OrderStatus::Paid);
    assert_eq!(status_of(&app, shipped.id).await, OrderStatus::Shipped);
    assert_eq!(status_of(&app, canceled.id).await, OrderStatus::Canceled);
}

#[tokio::test]
async fn pending_listing_sweeps_first() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    seed_order(app.db(), user.id, OrderStatus::New, "op-late", dec!(400)).await;
    app.gateway.set_status("op-late", "APPROVED");

    let (status, body) = app
        .request(Method::GET, "/api/v1/admin/orders/pending", None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sweep"]["marked_paid"], 1);
    // The order settled during the sweep, so the pending list is empty.
    assert!(body["orders"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn paid_orders_can_be_shipped() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    let order = seed_order(app.db(), user.id, OrderStatus::Paid, "op-ship", dec!(900)).await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/admin/orders/{}/ship", order.id),
            None,
            Some(json!({ "tracking_number": "RR123456789RU" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "shipped");
    assert_eq!(body["tracking_number"], "RR123456789RU");
    assert_eq!(status_of(&app, order.id).await, OrderStatus::Shipped);
}

#[tokio::test]
async fn unpaid_orders_cannot_be_shipped() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    let order = seed_order(app.db(), user.id, OrderStatus::New, "op-early", dec!(900)).await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/v1/admin/orders/{}/ship", order.id),
            None,
            Some(json!({ "tracking_number": "RR123456789RU" })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(status_of(&app, order.id).await, OrderStatus::New);
}
