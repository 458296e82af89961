//! Pure pricing computation over snapshot data.
//!
//! No I/O happens here: the checkout orchestrator snapshots cart lines
//! with their current product prices and hands them in together with an
//! optional promo code.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::entities::promocode;
use crate::errors::ServiceError;

/// A cart line frozen at checkout time: base price, optional discount
/// price, and quantity.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub quantity: i32,
}

impl PricedLine {
    /// Discount price wins over the base price when present.
    pub fn effective_unit_price(&self) -> Decimal {
        self.discount_price.unwrap_or(self.price)
    }

    /// Per-unit amount actually charged after the promo multiplier,
    /// rounded to 2 decimal places (used on the fiscal receipt).
    pub fn charged_unit_price(&self, promo_multiplier: Decimal) -> Decimal {
        round_money(self.effective_unit_price() * promo_multiplier)
    }
}

/// Canonical monetary breakdown of a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBreakdown {
    /// Σ quantity × effective unit price, before promo and delivery
    pub subtotal: Decimal,
    /// 1 for no promo, 1 − percent/100 for a qualifying promo
    pub promo_multiplier: Decimal,
    /// Zero when the subtotal clears the free-delivery threshold
    pub delivery_fee: Decimal,
    /// round_half_up(subtotal × multiplier) + delivery fee
    pub final_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct PricingEngine {
    delivery_fee: Decimal,
    free_delivery_min: Decimal,
}

impl PricingEngine {
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            delivery_fee: config.delivery_fee,
            free_delivery_min: config.free_delivery_min,
        }
    }

    /// Computes the full monetary breakdown for a set of priced lines and
    /// an optional promo code.
    pub fn price(
        &self,
        lines: &[PricedLine],
        promo: Option<&promocode::Model>,
    ) -> Result<PriceBreakdown, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let subtotal: Decimal = lines
            .iter()
            .map(|line| line.effective_unit_price() * Decimal::from(line.quantity))
            .sum();

        let promo_multiplier = match promo {
            None => Decimal::ONE,
            Some(promo) => {
                if !promo.active {
                    return Err(ServiceError::PromoNotApplicable(format!(
                        "promo code {} is no longer active",
                        promo.code
                    )));
                }
                if subtotal < promo.min_subtotal {
                    return Err(ServiceError::PromoNotApplicable(format!(
                        "promo code {} requires a cart subtotal of at least {}",
                        promo.code, promo.min_subtotal
                    )));
                }
                Decimal::ONE - Decimal::from(promo.percent) / dec!(100)
            }
        };

        let delivery_fee = if subtotal < self.free_delivery_min {
            self.delivery_fee
        } else {
            Decimal::ZERO
        };

        let final_price = round_money(subtotal * promo_multiplier) + delivery_fee;

        Ok(PriceBreakdown {
            subtotal,
            promo_multiplier,
            delivery_fee,
            final_price,
        })
    }
}

/// Round half-up to 2 decimal places.
fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
