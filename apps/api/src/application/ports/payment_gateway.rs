use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app_error::AppResult;

// ============================================================================
// Port Types - Gateway-agnostic domain types
// ============================================================================

/// Unique identifier for a customer at the payment gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a payment intent at the payment gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentIntentId(pub String);

impl PaymentIntentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PaymentIntentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// String-to-string tags stored on gateway objects. Ordered so requests are
/// deterministic.
pub type GatewayMetadata = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct CreatedPaymentIntent {
    pub id: PaymentIntentId,
    /// Handed to the client to confirm the payment
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct CreatedSubscription {
    pub id: String,
    /// Raw gateway status, e.g. `incomplete`
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    /// Client secret of the first invoice's payment intent, when expanded
    pub client_secret: Option<String>,
}

/// Reasons the gateway accepts for a refund
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    Duplicate,
    Fraudulent,
    RequestedByCustomer,
}

impl RefundReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundReason::Duplicate => "duplicate",
            RefundReason::Fraudulent => "fraudulent",
            RefundReason::RequestedByCustomer => "requested_by_customer",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatedRefund {
    pub id: String,
    pub status: String,
    pub amount_minor: i64,
}

// ============================================================================
// Webhook events
// ============================================================================

/// A verified gateway event. `object` is the event's `data.object`, decoded
/// lazily by the handler that knows its shape.
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub id: String,
    pub event_type: String,
    pub created_at: Option<DateTime<Utc>>,
    pub object: serde_json::Value,
}

impl GatewayEvent {
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.object.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentErrorObject {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_received: i64,
    pub currency: String,
    pub customer: Option<String>,
    pub latest_charge: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub last_payment_error: Option<PaymentErrorObject>,
}

impl PaymentIntentObject {
    /// Amount actually collected, falling back to the requested amount
    pub fn settled_amount_minor(&self) -> i64 {
        if self.amount_received > 0 {
            self.amount_received
        } else {
            self.amount
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: Option<String>,
    pub status: String,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargeObject {
    pub id: String,
    pub payment_intent: Option<String>,
    pub amount: i64,
    /// Running total across every refund of the charge
    #[serde(default)]
    pub amount_refunded: i64,
    /// Set once the whole charge has been refunded
    #[serde(default)]
    pub refunded: bool,
    pub currency: String,
}

impl ChargeObject {
    /// Refunded total in minor units. A fully refunded charge counts its
    /// whole amount.
    pub fn refunded_minor(&self) -> i64 {
        if self.refunded {
            self.amount_refunded.max(self.amount)
        } else {
            self.amount_refunded
        }
    }
}

// ============================================================================
// Payment Gateway Port
// ============================================================================

/// Operations the billing core needs from the payment processor.
/// Implementations hold no local state.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        metadata: &GatewayMetadata,
    ) -> AppResult<CustomerId>;

    async fn create_payment_intent(
        &self,
        customer: &CustomerId,
        amount_minor: i64,
        currency: &str,
        metadata: &GatewayMetadata,
    ) -> AppResult<CreatedPaymentIntent>;

    /// Creates a subscription that stays incomplete until its first invoice
    /// is paid, with the invoice's payment intent expanded.
    async fn create_subscription(
        &self,
        customer: &CustomerId,
        price_id: &str,
        metadata: &GatewayMetadata,
    ) -> AppResult<CreatedSubscription>;

    async fn create_refund(
        &self,
        payment_intent: &PaymentIntentId,
        amount_minor: Option<i64>,
        reason: Option<RefundReason>,
    ) -> AppResult<CreatedRefund>;

    /// Verifies the signature header against the raw body and parses the
    /// events it carries. Any verification failure rejects the whole body.
    fn verify_and_parse_webhook(
        &self,
        raw_body: &str,
        signature_header: &str,
    ) -> AppResult<Vec<GatewayEvent>>;
}
