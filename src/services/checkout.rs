//! Checkout orchestration: validate the cart, price it, open a remote
//! payment session, then atomically convert the cart into an order.
//!
//! The gateway call happens before the database transaction opens, so the
//! local commit never waits on remote I/O. A failure anywhere before the
//! commit leaves zero order rows and an untouched cart.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{cart_item, order, order_item, user, CartItem, OrderItem, Product, User};
use crate::entities::order::OrderStatus;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{Buyer, PaymentGateway, PaymentSessionRequest, ReceiptLine};
use crate::services::pricing::{PriceBreakdown, PricedLine, PricingEngine};
use crate::services::promotions::PromoService;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    pub promo_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order_id: Uuid,
    pub payment_link: String,
    pub total_price: rust_decimal::Decimal,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    pricing: PricingEngine,
    promos: PromoService,
    event_sender: EventSender,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        pricing: PricingEngine,
        promos: PromoService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            gateway,
            pricing,
            promos,
            event_sender,
        }
    }

    /// Converts the user's cart into an order.
    ///
    /// Precondition failures (empty cart, incomplete profile, unqualified
    /// promo) surface before any gateway call. A gateway failure aborts
    /// the whole checkout with no local state; the caller re-submits.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn checkout(
        &self,
        user_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let user = User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        // Snapshot the cart with prices as of right now; order totals are
        // frozen from this snapshot, not from fulfillment-time prices.
        let snapshot = self.snapshot_cart(user_id).await?;
        if snapshot.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let recipient = user.recipient().ok_or(ServiceError::IncompleteProfile)?;

        // An unknown code is a checkout precondition failure, not a lookup
        // miss: the buyer supplied a code that cannot apply.
        let promo = match &request.promo_code {
            Some(code) => Some(self.promos.find_by_code(code).await?.ok_or_else(|| {
                ServiceError::PromoNotApplicable(format!("unknown promo code {}", code))
            })?),
            None => None,
        };

        let breakdown = self.pricing.price(&snapshot, promo.as_ref())?;

        let session = self
            .gateway
            .create_payment_session(Self::session_request(&recipient.into_buyer(), &snapshot, &breakdown))
            .await?;

        let order_id = self
            .commit_order(user_id, &request, promo.as_ref().map(|p| p.id), &snapshot, &breakdown, &session.operation_id, &session.payment_link)
            .await?;

        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;
        info!(
            order_id = %order_id,
            operation_id = %session.operation_id,
            total = %breakdown.final_price,
            "Checkout completed"
        );

        Ok(CheckoutOutcome {
            order_id,
            payment_link: session.payment_link,
            total_price: breakdown.final_price,
        })
    }

    async fn snapshot_cart(&self, user_id: Uuid) -> Result<Vec<PricedLine>, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        rows.into_iter()
            .map(|(line, product)| {
                let product = product.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "cart line {} references a missing product",
                        line.id
                    ))
                })?;
                Ok(PricedLine {
                    product_id: product.id,
                    title: product.title,
                    price: product.price,
                    discount_price: product.discount_price,
                    quantity: line.quantity,
                })
            })
            .collect()
    }

    fn session_request(
        buyer: &Buyer,
        snapshot: &[PricedLine],
        breakdown: &PriceBreakdown,
    ) -> PaymentSessionRequest {
        let lines = snapshot
            .iter()
            .map(|line| ReceiptLine {
                name: line.title.clone(),
                unit_amount: line.charged_unit_price(breakdown.promo_multiplier),
                quantity: line.quantity,
            })
            .collect();

        PaymentSessionRequest {
            buyer: buyer.clone(),
            lines,
            amount: breakdown.final_price,
            delivery_fee: (!breakdown.delivery_fee.is_zero()).then_some(breakdown.delivery_fee),
        }
    }

    /// The atomic tail of checkout: insert the order and its items and
    /// clear the cart in one transaction. The cart is re-read inside the
    /// transaction and compared against the snapshot; any divergence
    /// (concurrent mutation or a competing checkout) aborts with a
    /// conflict and creates nothing.
    #[allow(clippy::too_many_arguments)]
    async fn commit_order(
        &self,
        user_id: Uuid,
        request: &CheckoutRequest,
        promo_id: Option<Uuid>,
        snapshot: &[PricedLine],
        breakdown: &PriceBreakdown,
        operation_id: &str,
        payment_link: &str,
    ) -> Result<Uuid, ServiceError> {
        let txn = self.db.begin().await?;

        // SELECT ... FOR UPDATE: a competing checkout's commit blocks here
        // until ours finishes, so under READ COMMITTED it re-reads the cart
        // we already consumed instead of the shared snapshot.
        let current: Vec<(Uuid, i32)> = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .lock_exclusive()
            .all(&txn)
            .await?
            .into_iter()
            .map(|line| (line.product_id, line.quantity))
            .collect();
        let snapshot_pairs: Vec<(Uuid, i32)> = snapshot
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect();
        if current != snapshot_pairs {
            warn!(user_id = %user_id, "Cart changed while the payment session was being created");
            txn.rollback().await?;
            return Err(ServiceError::Conflict(
                "Cart changed during checkout; please retry".to_string(),
            ));
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        order::ActiveModel {
            id: Set(order_id),
            status: Set(OrderStatus::New),
            user_id: Set(user_id),
            total_price: Set(breakdown.final_price),
            operation_id: Set(operation_id.to_string()),
            payment_link: Set(payment_link.to_string()),
            promo_id: Set(promo_id),
            shipping_address: Set(request.shipping_address.clone()),
            tracking_number: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let items = snapshot.iter().map(|line| order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            unit_price: Set(line.effective_unit_price()),
        });
        OrderItem::insert_many(items).exec(&txn).await?;

        let deleted = CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        // Belt and braces on top of the row locks: deleting fewer rows than
        // the snapshot held means another transaction consumed the cart.
        if deleted.rows_affected != snapshot.len() as u64 {
            warn!(
                user_id = %user_id,
                expected = snapshot.len(),
                deleted = deleted.rows_affected,
                "Cart rows vanished during checkout commit"
            );
            txn.rollback().await?;
            return Err(ServiceError::Conflict(
                "Cart changed during checkout; please retry".to_string(),
            ));
        }

        txn.commit().await?;
        Ok(order_id)
    }
}

impl user::Recipient {
    fn into_buyer(self) -> Buyer {
        Buyer {
            full_name: self.full_name,
            email: self.email,
            phone: self.phone,
        }
    }
}
