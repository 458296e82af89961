pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;
use crate::services::cart::CartService;
use crate::services::checkout::CheckoutService;
use crate::services::orders::OrderService;
use crate::services::pricing::PricingEngine;
use crate::services::promotions::PromoService;
use crate::services::settlement::SettlementService;

/// Business services wired once at startup and shared by handlers and
/// background tasks.
#[derive(Clone)]
pub struct AppServices {
    pub cart: CartService,
    pub promos: PromoService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub settlement: SettlementService,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
    ) -> Self {
        let pricing = PricingEngine::new(&config.pricing);
        let promos = PromoService::new(db.clone());
        let orders = OrderService::new(db.clone(), event_sender.clone());

        Self {
            cart: CartService::new(db.clone()),
            checkout: CheckoutService::new(
                db.clone(),
                gateway.clone(),
                pricing,
                promos.clone(),
                event_sender.clone(),
            ),
            settlement: SettlementService::new(
                gateway,
                orders.clone(),
                event_sender,
                config.settlement.expiry_days,
            ),
            promos,
            orders,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
    ) -> Self {
        let services = AppServices::new(db.clone(), &config, gateway, event_sender);
        Self {
            db,
            config: Arc::new(config),
            services,
        }
    }
}

/// Builds the full application router with tracing and CORS applied.
pub fn app_router(state: AppState) -> Router {
    handlers::routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
