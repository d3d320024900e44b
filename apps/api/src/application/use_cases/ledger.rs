//! Store-side contracts of the billing core. Every method that guards an
//! invariant under concurrency is a single atomic operation in the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::entities::{
        payment::{Payment, PaymentTransition, TransitionOutcome},
        payment_kind::{PaymentKind, PaymentMethod},
        payment_status::PaymentStatus,
        property::Property,
        user::{SubscriptionStatus, User},
    },
};

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreatePaymentInput {
    pub tenant_id: Uuid,
    pub landlord_id: Uuid,
    pub property_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub gateway_payment_intent_id: Option<String>,
    pub gateway_invoice_id: Option<String>,
    pub gateway_subscription_id: Option<String>,
    pub gateway_customer_id: Option<String>,
}

impl CreatePaymentInput {
    /// A pending gateway payment with no gateway ids yet
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        tenant_id: Uuid,
        landlord_id: Uuid,
        property_id: Option<Uuid>,
        amount: Decimal,
        currency: String,
        kind: PaymentKind,
        description: Option<String>,
        due_date: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            landlord_id,
            property_id,
            amount,
            currency,
            kind,
            status: PaymentStatus::Pending,
            method: PaymentMethod::Stripe,
            description,
            notes: None,
            due_date,
            paid_at: None,
            gateway_payment_intent_id: None,
            gateway_invoice_id: None,
            gateway_subscription_id: None,
            gateway_customer_id: None,
        }
    }
}

/// Invoice outcome reported by the gateway for a subscriber
#[derive(Debug, Clone)]
pub struct InvoicePaymentInput {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub succeeded: bool,
    pub occurred_at: DateTime<Utc>,
    pub gateway_invoice_id: String,
    pub gateway_subscription_id: String,
    pub gateway_customer_id: String,
    pub gateway_payment_intent_id: Option<String>,
}

impl From<&InvoicePaymentInput> for CreatePaymentInput {
    fn from(invoice: &InvoicePaymentInput) -> Self {
        let (status, paid_at, description) = if invoice.succeeded {
            (
                PaymentStatus::Completed,
                Some(invoice.occurred_at),
                "Subscription payment",
            )
        } else {
            (PaymentStatus::Failed, None, "Subscription payment failed")
        };

        Self {
            tenant_id: invoice.user_id,
            landlord_id: invoice.user_id,
            property_id: None,
            amount: invoice.amount,
            currency: invoice.currency.clone(),
            kind: PaymentKind::Subscription,
            status,
            method: PaymentMethod::Stripe,
            description: Some(description.to_string()),
            notes: None,
            due_date: invoice.occurred_at,
            paid_at,
            gateway_payment_intent_id: invoice.gateway_payment_intent_id.clone(),
            gateway_invoice_id: Some(invoice.gateway_invoice_id.clone()),
            gateway_subscription_id: Some(invoice.gateway_subscription_id.clone()),
            gateway_customer_id: Some(invoice.gateway_customer_id.clone()),
        }
    }
}

/// Absolute subscription fields written in one statement. `None` leaves the
/// stored value as it is.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionUpdate {
    pub gateway_subscription_id: String,
    pub status: SubscriptionStatus,
    pub plan: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Which key a conditional payment write is addressed by
#[derive(Debug, Clone, Copy)]
pub enum PaymentKey<'a> {
    Id(Uuid),
    PaymentIntent(&'a str),
}

impl std::fmt::Display for PaymentKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentKey::Id(id) => write!(f, "payment {}", id),
            PaymentKey::PaymentIntent(intent) => write!(f, "payment intent {}", intent),
        }
    }
}

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait PaymentRepo: Send + Sync {
    async fn create(&self, input: &CreatePaymentInput) -> AppResult<Payment>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Payment>>;

    /// Links a pending payment to the intent created for it
    async fn attach_gateway_ids(
        &self,
        id: Uuid,
        payment_intent_id: &str,
        customer_id: &str,
    ) -> AppResult<()>;

    /// Applies the transition only if the payment is still in the
    /// transition's starting status, as one conditional write
    async fn apply_transition(
        &self,
        key: PaymentKey<'_>,
        transition: &PaymentTransition,
    ) -> AppResult<TransitionOutcome>;

    /// Inserts the invoice payment unless a row for the same invoice and
    /// status exists. Returns `None` for a duplicate.
    async fn record_invoice_payment(&self, input: &CreatePaymentInput)
    -> AppResult<Option<Payment>>;
}

#[async_trait]
pub trait BillingUserRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn get_by_gateway_customer_id(&self, customer_id: &str) -> AppResult<Option<User>>;

    /// Stores the customer id unless one is already set. Returns the id that
    /// is stored afterwards, which is the caller's only if it won.
    async fn set_gateway_customer_id_if_absent(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> AppResult<String>;

    /// Returns false when no such user exists
    async fn apply_subscription_update(
        &self,
        user_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> AppResult<bool>;
}

#[async_trait]
pub trait PropertyRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Property>>;

    /// Marks the payment's occupancy as applied and increments the property's
    /// tenant count, both at most once per payment. Returns true only for the
    /// call that performed the increment.
    async fn apply_occupancy_once(&self, payment_id: Uuid, property_id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait ProcessedEventRepo: Send + Sync {
    /// Atomically claims the event id. False means another delivery owns it.
    async fn claim(&self, event_id: &str, event_type: &str) -> AppResult<bool>;

    /// Gives the claim back so a redelivery can process the event
    async fn release(&self, event_id: &str) -> AppResult<()>;
}
