#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use checkout_api::config::AppConfig;
use checkout_api::entities::order::OrderStatus;
use checkout_api::entities::{cart_item, order, product, promocode, user};
use checkout_api::errors::ServiceError;
use checkout_api::events::{Event, EventSender};
use checkout_api::gateway::{
    MerchantIdentity, PaymentGateway, PaymentSession, PaymentSessionRequest, PaymentStatus,
};
use checkout_api::migrator::Migrator;
use checkout_api::{app_router, AppState};

/// Scripted stand-in for the acquiring provider.
///
/// Payment statuses are keyed by operation id; an operation with no
/// scripted status behaves like an unreachable gateway, as does session
/// creation when `fail_sessions` is set.
#[derive(Default)]
pub struct MockGateway {
    pub fail_sessions: AtomicBool,
    sessions_created: AtomicUsize,
    statuses: Mutex<HashMap<String, String>>,
}

impl MockGateway {
    pub fn set_status(&self, operation_id: &str, raw_status: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(operation_id.to_string(), raw_status.to_string());
    }

    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn resolve_merchant_identity(&self) -> Result<MerchantIdentity, ServiceError> {
        Ok(MerchantIdentity {
            customer_code: "304000000".to_string(),
            merchant_id: "MB0000000001".to_string(),
            payment_modes: vec!["sbp".to_string(), "card".to_string()],
            supplier_name: "Test Shop LLC".to_string(),
            tax_code: "7700000000".to_string(),
        })
    }

    async fn create_payment_session(
        &self,
        _request: PaymentSessionRequest,
    ) -> Result<PaymentSession, ServiceError> {
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayUnavailable);
        }
        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentSession {
            operation_id: format!("op-{n}"),
            payment_link: format!("https://pay.test/op-{n}"),
        })
    }

    async fn poll_payment_status(
        &self,
        operation_id: &str,
    ) -> Result<PaymentStatus, ServiceError> {
        match self.statuses.lock().unwrap().get(operation_id) {
            Some(raw) => Ok(PaymentStatus::from_provider(raw)),
            None => Err(ServiceError::GatewayUnavailable),
        }
    }
}

/// Full application over an in-memory SQLite database and a scripted
/// gateway. Each test gets an isolated instance.
pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    _event_rx: mpsc::Receiver<Event>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        // A single connection keeps every query on the same in-memory
        // database.
        let mut options = ConnectOptions::new("sqlite::memory:");
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        let db = Database::connect(options)
            .await
            .expect("connect to in-memory sqlite");
        Migrator::up(&db, None).await.expect("run migrations");

        let (tx, rx) = mpsc::channel(64);
        let gateway = Arc::new(MockGateway::default());
        let config = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        let state = AppState::new(Arc::new(db), config, gateway.clone(), EventSender::new(tx));

        Self {
            state,
            gateway,
            _event_rx: rx,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    pub fn router(&self) -> Router {
        app_router(self.state.clone())
    }

    /// Sends one request through the router and decodes the JSON body
    /// (empty bodies decode to `null`).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user_id: Option<Uuid>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header("x-user-id", user_id.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self.router().oneshot(request).await.expect("send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("decode JSON body")
        };
        (status, json)
    }
}

pub async fn seed_user(db: &DatabaseConnection, complete_profile: bool) -> user::Model {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(format!("buyer-{}@example.com", Uuid::new_v4())),
        phone: Set(complete_profile.then(|| "79990001122".to_string())),
        first_name: Set(Some("Anna".to_string())),
        last_name: Set(Some("Ivanova".to_string())),
        patronymic: Set(complete_profile.then(|| "Petrovna".to_string())),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed user")
}

pub async fn seed_product(
    db: &DatabaseConnection,
    title: &str,
    price: Decimal,
    discount_price: Option<Decimal>,
) -> product::Model {
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title.to_string()),
        price: Set(price),
        discount_price: Set(discount_price),
    }
    .insert(db)
    .await
    .expect("seed product")
}

pub async fn seed_promo(
    db: &DatabaseConnection,
    code: &str,
    active: bool,
    percent: i32,
    min_subtotal: Decimal,
) -> promocode::Model {
    promocode::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        active: Set(active),
        percent: Set(percent),
        min_subtotal: Set(min_subtotal),
    }
    .insert(db)
    .await
    .expect("seed promocode")
}

pub async fn add_cart_line(
    db: &DatabaseConnection,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> cart_item::Model {
    let now = Utc::now();
    cart_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        product_id: Set(product_id),
        quantity: Set(quantity),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed cart line")
}

pub async fn seed_order(
    db: &DatabaseConnection,
    user_id: Uuid,
    status: OrderStatus,
    operation_id: &str,
    total_price: Decimal,
) -> order::Model {
    let now = Utc::now();
    order::ActiveModel {
        id: Set(Uuid::new_v4()),
        status: Set(status),
        user_id: Set(user_id),
        total_price: Set(total_price),
        operation_id: Set(operation_id.to_string()),
        payment_link: Set(format!("https://pay.test/{operation_id}")),
        promo_id: Set(None),
        shipping_address: Set("Moscow, Tverskaya 1".to_string()),
        tracking_number: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed order")
}

/// Rewinds an order's creation time, for exercising the expiry cutoff.
pub async fn backdate_order(db: &DatabaseConnection, order: order::Model, days: i64) {
    let created_at = Utc::now() - Duration::days(days);
    let mut update: order::ActiveModel = order.into();
    update.created_at = Set(created_at);
    update.update(db).await.expect("backdate order");
}
