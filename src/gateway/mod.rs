//! Payment gateway boundary.
//!
//! Everything the core needs from the acquiring provider sits behind the
//! [`PaymentGateway`] trait: merchant identity discovery, payment-session
//! creation, and status polling. The production implementation is
//! [`acquiring::AcquiringClient`]; tests substitute a scripted double.

pub mod acquiring;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::ServiceError;

/// Merchant-side identity the provider requires on every payment session.
/// Resolved freshly before each session creation; deliberately not cached.
#[derive(Debug, Clone)]
pub struct MerchantIdentity {
    pub customer_code: String,
    pub merchant_id: String,
    pub payment_modes: Vec<String>,
    pub supplier_name: String,
    pub tax_code: String,
}

/// Buyer details placed on the payment request and fiscal receipt.
#[derive(Debug, Clone)]
pub struct Buyer {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

/// One receipt line with its per-unit amount already discounted and
/// rounded to 2 decimal places.
#[derive(Debug, Clone)]
pub struct ReceiptLine {
    pub name: String,
    pub unit_amount: Decimal,
    pub quantity: i32,
}

/// Request to open a payment session for a checkout.
#[derive(Debug, Clone)]
pub struct PaymentSessionRequest {
    pub buyer: Buyer,
    pub lines: Vec<ReceiptLine>,
    /// Amount actually charged, promo and delivery fee included
    pub amount: Decimal,
    /// Delivery fee, when one is charged; rides as its own receipt line
    pub delivery_fee: Option<Decimal>,
}

/// Provider handle for a created payment session.
#[derive(Debug, Clone)]
pub struct PaymentSession {
    pub operation_id: String,
    pub payment_link: String,
}

/// Provider-reported payment state. Anything that is neither `CREATED`
/// nor `APPROVED` is a terminal non-success state for settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Created,
    Approved,
    Other(String),
}

impl PaymentStatus {
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "CREATED" => PaymentStatus::Created,
            "APPROVED" => PaymentStatus::Approved,
            other => PaymentStatus::Other(other.to_string()),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Two-step customer → retailer lookup against the provider.
    async fn resolve_merchant_identity(&self) -> Result<MerchantIdentity, ServiceError>;

    /// Creates a remote payment session and returns its handle.
    /// Never partially succeeds: any failure is `GatewayUnavailable`.
    async fn create_payment_session(
        &self,
        request: PaymentSessionRequest,
    ) -> Result<PaymentSession, ServiceError>;

    /// Polls the provider for the state of a payment session.
    async fn poll_payment_status(&self, operation_id: &str)
        -> Result<PaymentStatus, ServiceError>;
}
