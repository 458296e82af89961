mod common;

use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use common::{seed_product, seed_promo, seed_user, TestApp};

#[tokio::test]
async fn adding_a_product_creates_a_cart_line() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    let mug = seed_product(app.db(), "Mug", dec!(500), Some(dec!(450))).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(user.id),
            Some(json!({ "product_id": mug.id, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .request(Method::GET, "/api/v1/cart", Some(user.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let lines = body.as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["title"], "Mug");
    assert_eq!(lines[0]["quantity"], 2);
    // Discount price wins, and the line total follows it.
    let as_decimal = |v: &serde_json::Value| v.as_str().unwrap().parse::<Decimal>().unwrap();
    assert_eq!(as_decimal(&lines[0]["unit_price"]), dec!(450));
    assert_eq!(as_decimal(&lines[0]["line_total"]), dec!(900));
}

#[tokio::test]
async fn re_adding_a_product_replaces_the_quantity() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    let mug = seed_product(app.db(), "Mug", dec!(500), None).await;

    for quantity in [2, 5] {
        let (status, _) = app
            .request(
                Method::POST,
                "/api/v1/cart",
                Some(user.id),
                Some(json!({ "product_id": mug.id, "quantity": quantity })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = app
        .request(Method::GET, "/api/v1/cart", Some(user.id), None)
        .await;
    let lines = body.as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"], 5);
}

#[tokio::test]
async fn quantity_is_bounded() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    let mug = seed_product(app.db(), "Mug", dec!(500), None).await;

    for quantity in [0, 101] {
        let (status, _) = app
            .request(
                Method::POST,
                "/api/v1/cart",
                Some(user.id),
                Some(json!({ "product_id": mug.id, "quantity": quantity })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "quantity {quantity}");
    }
}

#[tokio::test]
async fn unknown_products_cannot_be_added() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(user.id),
            Some(json!({ "product_id": Uuid::new_v4(), "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn updating_a_line_changes_its_quantity() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    let mug = seed_product(app.db(), "Mug", dec!(500), None).await;

    let (_, created) = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(user.id),
            Some(json!({ "product_id": mug.id, "quantity": 1 })),
        )
        .await;
    let line_id = created["id"].as_str().unwrap().to_string();

    let (status, updated) = app
        .request(
            Method::PATCH,
            &format!("/api/v1/cart/{line_id}"),
            Some(user.id),
            Some(json!({ "quantity": 7 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["quantity"], 7);
}

#[tokio::test]
async fn lines_are_owned_by_their_user() {
    let app = TestApp::spawn().await;
    let owner = seed_user(app.db(), true).await;
    let intruder = seed_user(app.db(), true).await;
    let mug = seed_product(app.db(), "Mug", dec!(500), None).await;

    let (_, created) = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(owner.id),
            Some(json!({ "product_id": mug.id, "quantity": 1 })),
        )
        .await;
    let line_id = created["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/api/v1/cart/{line_id}"),
            Some(intruder.id),
            Some(json!({ "quantity": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/{line_id}"),
            Some(intruder.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn removing_a_line_empties_the_cart() {
    let app = TestApp::spawn().await;
    let user = seed_user(app.db(), true).await;
    let mug = seed_product(app.db(), "Mug", dec!(500), None).await;

    let (_, created) = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(user.id),
            Some(json!({ "product_id": mug.id, "quantity": 1 })),
        )
        .await;
    let line_id = created["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/{line_id}"),
            Some(user.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app
        .request(Method::GET, "/api/v1/cart", Some(user.id), None)
        .await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cart_requires_an_identity() {
    let app = TestApp::spawn().await;

    let (status, _) = app.request(Method::GET, "/api/v1/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn promocodes_are_looked_up_by_code() {
    let app = TestApp::spawn().await;
    seed_promo(app.db(), "WELCOME10", true, 10, dec!(1000)).await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/promocodes/WELCOME10", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], "WELCOME10");
    assert_eq!(body["percent"], 10);
    assert_eq!(body["active"], true);

    let (status, _) = app
        .request(Method::GET, "/api/v1/promocodes/NOPE", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
