//! Reqwest client for the Tochka-style acquiring API.
//!
//! Response payloads are strongly typed with optional fields; a missing
//! field and a transport failure both surface to callers as
//! [`ServiceError::GatewayUnavailable`], with the distinction preserved in
//! the logs.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::config::GatewayConfig;
use crate::errors::ServiceError;

use super::{
    MerchantIdentity, PaymentGateway, PaymentSession, PaymentSessionRequest, PaymentStatus,
};

const CUSTOMERS_PATH: &str = "/uapi/open-banking/v1.0/customers";
const RETAILERS_PATH: &str = "/uapi/acquiring/v1.0/retailers";
const PAYMENTS_PATH: &str = "/uapi/acquiring/v1.0/payments_with_receipt";
const PAYMENT_STATUS_PATH: &str = "/uapi/acquiring/v1.0/payments";

const PAYMENT_PURPOSE: &str = "Order payment";
const DELIVERY_LINE_NAME: &str = "Delivery";
const VAT_TYPE: &str = "none";
const PAYMENT_METHOD: &str = "full_payment";
const PAYMENT_OBJECT_GOODS: &str = "goods";
const PAYMENT_OBJECT_SERVICE: &str = "service";

#[derive(Clone)]
pub struct AcquiringClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl AcquiringClient {
    pub fn new(config: GatewayConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        context: &str,
    ) -> Result<T, ServiceError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(context, &e))?;
        decode_response(response, context).await
    }
}

fn transport_error(context: &str, error: &reqwest::Error) -> ServiceError {
    warn!(context, error = %error, "Acquiring API unreachable");
    ServiceError::GatewayUnavailable
}

/// Non-200 and undecodable bodies both collapse into `GatewayUnavailable`.
async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T, ServiceError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(context, &e))?;

    if !status.is_success() {
        warn!(context, %status, body = %body, "Acquiring API returned an error");
        return Err(ServiceError::GatewayUnavailable);
    }

    serde_json::from_str(&body).map_err(|e| {
        warn!(context, error = %e, body = %body, "Malformed acquiring API payload");
        ServiceError::GatewayUnavailable
    })
}

/// Gateway reachable but an expected field was absent.
fn missing_field(context: &str, field: &str) -> ServiceError {
    warn!(context, field, "Acquiring API response is missing an expected field");
    ServiceError::GatewayUnavailable
}

fn money(amount: Decimal) -> f64 {
    // Amounts reach this point already rounded to 2 decimal places.
    amount.to_f64().unwrap_or_default()
}

#[async_trait]
impl PaymentGateway for AcquiringClient {
    #[instrument(skip(self))]
    async fn resolve_merchant_identity(&self) -> Result<MerchantIdentity, ServiceError> {
        let customers: Envelope<CustomersPayload> = self
            .get_json(&self.url(CUSTOMERS_PATH), "customers lookup")
            .await?;
        let customer = customers
            .data
            .and_then(|d| d.customers)
            .and_then(|mut c| if c.is_empty() { None } else { Some(c.remove(0)) })
            .ok_or_else(|| missing_field("customers lookup", "Data.Customer"))?;
        let customer_code = customer
            .customer_code
            .ok_or_else(|| missing_field("customers lookup", "customerCode"))?;
        let supplier_name = customer
            .short_name
            .ok_or_else(|| missing_field("customers lookup", "shortName"))?;
        let tax_code = customer
            .tax_code
            .ok_or_else(|| missing_field("customers lookup", "taxCode"))?;

        let retailers_url = format!(
            "{}?customerCode={}",
            self.url(RETAILERS_PATH),
            customer_code
        );
        let retailers: Envelope<RetailersPayload> =
            self.get_json(&retailers_url, "retailers lookup").await?;
        let retailer = retailers
            .data
            .and_then(|d| d.retailers)
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| missing_field("retailers lookup", "Data.Retailer"))?;
        let merchant_id = retailer
            .merchant_id
            .ok_or_else(|| missing_field("retailers lookup", "merchantId"))?;
        let payment_modes = retailer
            .payment_modes
            .ok_or_else(|| missing_field("retailers lookup", "paymentModes"))?;

        Ok(MerchantIdentity {
            customer_code,
            merchant_id,
            payment_modes,
            supplier_name,
            tax_code,
        })
    }

    #[instrument(skip(self, request), fields(amount = %request.amount))]
    async fn create_payment_session(
        &self,
        request: PaymentSessionRequest,
    ) -> Result<PaymentSession, ServiceError> {
        // The provider wants fresh merchant data on every session; identity
        // is re-resolved here rather than cached.
        let identity = self.resolve_merchant_identity().await?;

        let mut items: Vec<ReceiptItem> = request
            .lines
            .iter()
            .map(|line| ReceiptItem {
                vat_type: VAT_TYPE.to_string(),
                name: line.name.clone(),
                amount: money(line.unit_amount),
                quantity: line.quantity,
                payment_method: PAYMENT_METHOD.to_string(),
                payment_object: PAYMENT_OBJECT_GOODS.to_string(),
            })
            .collect();
        if let Some(fee) = request.delivery_fee {
            items.push(ReceiptItem {
                vat_type: VAT_TYPE.to_string(),
                name: DELIVERY_LINE_NAME.to_string(),
                amount: money(fee),
                quantity: 1,
                payment_method: PAYMENT_METHOD.to_string(),
                payment_object: PAYMENT_OBJECT_SERVICE.to_string(),
            });
        }

        let payload = PaymentRequestEnvelope {
            data: PaymentRequestData {
                customer_code: identity.customer_code.clone(),
                amount: money(request.amount),
                purpose: PAYMENT_PURPOSE.to_string(),
                redirect_url: self.config.redirect_url.clone(),
                fail_redirect_url: self.config.fail_redirect_url.clone(),
                payment_mode: identity.payment_modes.clone(),
                merchant_id: identity.merchant_id.clone(),
                tax_system_code: self.config.tax_system_code.clone(),
                client: ClientInfo {
                    name: request.buyer.full_name.clone(),
                    email: request.buyer.email.clone(),
                    phone: request.buyer.phone.clone(),
                },
                items,
                supplier: SupplierInfo {
                    phone: self.config.supplier_phone.clone(),
                    name: identity.supplier_name.clone(),
                    tax_code: identity.tax_code.clone(),
                },
            },
        };

        let context = "payment session creation";
        let response = self
            .http
            .post(self.url(PAYMENTS_PATH))
            .bearer_auth(&self.config.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(context, &e))?;
        let session: Envelope<SessionPayload> = decode_response(response, context).await?;

        let data = session
            .data
            .ok_or_else(|| missing_field(context, "Data"))?;
        let operation_id = data
            .operation_id
            .ok_or_else(|| missing_field(context, "operationId"))?;
        let payment_link = data
            .payment_link
            .ok_or_else(|| missing_field(context, "paymentLink"))?;

        info!(operation_id = %operation_id, "Payment session created");
        Ok(PaymentSession {
            operation_id,
            payment_link,
        })
    }

    #[instrument(skip(self))]
    async fn poll_payment_status(
        &self,
        operation_id: &str,
    ) -> Result<PaymentStatus, ServiceError> {
        let context = "payment status poll";
        let url = format!("{}/{}", self.url(PAYMENT_STATUS_PATH), operation_id);
        let envelope: Envelope<OperationsPayload> = self.get_json(&url, context).await?;

        let status = envelope
            .data
            .and_then(|d| d.operations)
            .and_then(|mut ops| if ops.is_empty() { None } else { Some(ops.remove(0)) })
            .and_then(|op| op.status)
            .ok_or_else(|| missing_field(context, "Data.Operation[0].status"))?;

        Ok(PaymentStatus::from_provider(&status))
    }
}

// ---- wire types ----

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "Data")]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CustomersPayload {
    #[serde(rename = "Customer")]
    customers: Option<Vec<CustomerInfo>>,
}

#[derive(Debug, Deserialize)]
struct CustomerInfo {
    #[serde(rename = "customerCode")]
    customer_code: Option<String>,
    #[serde(rename = "shortName")]
    short_name: Option<String>,
    #[serde(rename = "taxCode")]
    tax_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetailersPayload {
    #[serde(rename = "Retailer")]
    retailers: Option<Vec<RetailerInfo>>,
}

#[derive(Debug, Deserialize)]
struct RetailerInfo {
    #[serde(rename = "merchantId")]
    merchant_id: Option<String>,
    #[serde(rename = "paymentModes")]
    payment_modes: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct PaymentRequestEnvelope {
    #[serde(rename = "Data")]
    data: PaymentRequestData,
}

#[derive(Debug, Serialize)]
struct PaymentRequestData {
    #[serde(rename = "customerCode")]
    customer_code: String,
    amount: f64,
    purpose: String,
    #[serde(rename = "redirectUrl")]
    redirect_url: String,
    #[serde(rename = "failRedirectUrl")]
    fail_redirect_url: String,
    #[serde(rename = "paymentMode")]
    payment_mode: Vec<String>,
    #[serde(rename = "merchantId")]
    merchant_id: String,
    #[serde(rename = "taxSystemCode")]
    tax_system_code: String,
    #[serde(rename = "Client")]
    client: ClientInfo,
    #[serde(rename = "Items")]
    items: Vec<ReceiptItem>,
    #[serde(rename = "Supplier")]
    supplier: SupplierInfo,
}

#[derive(Debug, Serialize)]
struct ClientInfo {
    name: String,
    email: String,
    phone: String,
}

#[derive(Debug, Serialize)]
struct ReceiptItem {
    #[serde(rename = "vatType")]
    vat_type: String,
    name: String,
    amount: f64,
    quantity: i32,
    #[serde(rename = "paymentMethod")]
    payment_method: String,
    #[serde(rename = "paymentObject")]
    payment_object: String,
}

#[derive(Debug, Serialize)]
struct SupplierInfo {
    phone: String,
    name: String,
    #[serde(rename = "taxCode")]
    tax_code: String,
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    #[serde(rename = "operationId")]
    operation_id: Option<String>,
    #[serde(rename = "paymentLink")]
    payment_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationsPayload {
    #[serde(rename = "Operation")]
    operations: Option<Vec<OperationInfo>>,
}

#[derive(Debug, Deserialize)]
struct OperationInfo {
    status: Option<String>,
}
