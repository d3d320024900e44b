//! Applies verified gateway events to the ledger.
//!
//! Events can arrive duplicated, out of order, or before the local write they
//! refer to has committed. Handlers therefore write absolute state through
//! conditional store operations, and the one relative write (occupancy) is
//! guarded per payment.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rentflow_types::metadata_keys;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::ports::payment_gateway::{
        ChargeObject, GatewayEvent, InvoiceObject, PaymentGateway, PaymentIntentObject,
        SubscriptionObject,
    },
    domain::entities::{
        money::from_minor_units,
        payment::{PaymentTransition, TransitionOutcome},
        payment_status::PaymentStatus,
        user::{DEFAULT_PAID_PLAN, FREE_PLAN, SubscriptionStatus},
    },
};

use super::ledger::{
    BillingUserRepo, CreatePaymentInput, InvoicePaymentInput, PaymentKey, PaymentRepo,
    ProcessedEventRepo, PropertyRepo, SubscriptionUpdate,
};

/// Gateway event types the reconciler acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEventType {
    PaymentIntentSucceeded,
    PaymentIntentFailed,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    ChargeRefunded,
}

impl GatewayEventType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payment_intent.succeeded" => Some(Self::PaymentIntentSucceeded),
            "payment_intent.payment_failed" => Some(Self::PaymentIntentFailed),
            "customer.subscription.created" => Some(Self::SubscriptionCreated),
            "customer.subscription.updated" => Some(Self::SubscriptionUpdated),
            "customer.subscription.deleted" => Some(Self::SubscriptionDeleted),
            "invoice.payment_succeeded" => Some(Self::InvoicePaymentSucceeded),
            "invoice.payment_failed" => Some(Self::InvoicePaymentFailed),
            "charge.refunded" => Some(Self::ChargeRefunded),
            _ => None,
        }
    }
}

/// What happened to one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    /// The event id was already claimed by an earlier delivery
    Duplicate,
    /// The ledger already reflected the event
    AlreadyApplied,
    /// Not acted on. Retryable drops give their claim back so a redelivery
    /// can try again.
    Dropped { reason: String, retryable: bool },
    Ignored,
    /// The handler failed; the error was logged and the claim released
    Failed,
}

impl EventOutcome {
    fn dropped(reason: impl Into<String>, retryable: bool) -> Self {
        EventOutcome::Dropped {
            reason: reason.into(),
            retryable,
        }
    }

    fn releases_claim(&self) -> bool {
        matches!(
            self,
            EventOutcome::Failed
                | EventOutcome::Dropped {
                    retryable: true,
                    ..
                }
        )
    }
}

/// Per-event outcomes of one webhook delivery
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub outcomes: Vec<(String, EventOutcome)>,
}

impl DeliveryReport {
    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == EventOutcome::Applied)
            .count()
    }
}

#[derive(Clone)]
pub struct WebhookReconciler {
    gateway: Arc<dyn PaymentGateway>,
    payments: Arc<dyn PaymentRepo>,
    users: Arc<dyn BillingUserRepo>,
    properties: Arc<dyn PropertyRepo>,
    events: Arc<dyn ProcessedEventRepo>,
}

impl WebhookReconciler {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        payments: Arc<dyn PaymentRepo>,
        users: Arc<dyn BillingUserRepo>,
        properties: Arc<dyn PropertyRepo>,
        events: Arc<dyn ProcessedEventRepo>,
    ) -> Self {
        Self {
            gateway,
            payments,
            users,
            properties,
            events,
        }
    }

    /// Verifies a delivery and applies each event it carries.
    ///
    /// Only a verification failure is returned as an error. After that every
    /// event is handled inside its own failure boundary.
    pub async fn handle_delivery(
        &self,
        raw_body: &str,
        signature_header: &str,
    ) -> AppResult<DeliveryReport> {
        let events = self
            .gateway
            .verify_and_parse_webhook(raw_body, signature_header)
            .inspect_err(|e| tracing::warn!(error = %e, "Rejected webhook delivery"))?;

        let mut report = DeliveryReport::default();
        for event in &events {
            let outcome = self.process_event(event).await;
            report.outcomes.push((event.id.clone(), outcome));
        }
        Ok(report)
    }

    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn process_event(&self, event: &GatewayEvent) -> EventOutcome {
        match self.events.claim(&event.id, &event.event_type).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("Duplicate webhook event, skipping");
                return EventOutcome::Duplicate;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim webhook event");
                return EventOutcome::Failed;
            }
        }

        let outcome = match self.dispatch(event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Webhook event handler failed");
                EventOutcome::Failed
            }
        };

        match &outcome {
            EventOutcome::Dropped { reason, retryable } => {
                tracing::warn!(reason = %reason, retryable, "Webhook event dropped");
            }
            EventOutcome::Ignored => tracing::debug!("Unhandled webhook event type"),
            other => tracing::info!(outcome = ?other, "Webhook event processed"),
        }

        if outcome.releases_claim() {
            if let Err(e) = self.events.release(&event.id).await {
                tracing::error!(error = %e, "Failed to release webhook event claim");
            }
        }

        outcome
    }

    async fn dispatch(&self, event: &GatewayEvent) -> AppResult<EventOutcome> {
        let Some(event_type) = GatewayEventType::parse(&event.event_type) else {
            return Ok(EventOutcome::Ignored);
        };

        match event_type {
            GatewayEventType::PaymentIntentSucceeded => match event.decode() {
                Ok(intent) => self.handle_intent_succeeded(intent).await,
                Err(e) => Ok(malformed(e)),
            },
            GatewayEventType::PaymentIntentFailed => match event.decode() {
                Ok(intent) => self.handle_intent_failed(intent).await,
                Err(e) => Ok(malformed(e)),
            },
            GatewayEventType::SubscriptionCreated
            | GatewayEventType::SubscriptionUpdated
            | GatewayEventType::SubscriptionDeleted => match event.decode() {
                Ok(subscription) => self.handle_subscription(event_type, subscription).await,
                Err(e) => Ok(malformed(e)),
            },
            GatewayEventType::InvoicePaymentSucceeded | GatewayEventType::InvoicePaymentFailed => {
                match event.decode() {
                    Ok(invoice) => {
                        let succeeded = event_type == GatewayEventType::InvoicePaymentSucceeded;
                        self.handle_invoice(invoice, succeeded, event.created_at)
                            .await
                    }
                    Err(e) => Ok(malformed(e)),
                }
            }
            GatewayEventType::ChargeRefunded => match event.decode() {
                Ok(charge) => self.handle_charge_refunded(charge).await,
                Err(e) => Ok(malformed(e)),
            },
        }
    }

    // ========================================================================
    // Payment intents
    // ========================================================================

    async fn handle_intent_succeeded(&self, intent: PaymentIntentObject) -> AppResult<EventOutcome> {
        let transition = PaymentTransition::Complete {
            paid_at: Utc::now(),
            amount: Some(from_minor_units(
                intent.settled_amount_minor(),
                &intent.currency,
            )),
            customer_id: intent.customer.clone(),
            charge_id: intent.latest_charge.clone(),
        };

        let payment = match self
            .payments
            .apply_transition(PaymentKey::PaymentIntent(&intent.id), &transition)
            .await?
        {
            TransitionOutcome::Applied(payment) => {
                tracing::info!(payment_id = %payment.id, amount = %payment.amount, "Payment completed");
                payment
            }
            // A redelivery after a partial failure still owes the occupancy step
            TransitionOutcome::Unchanged(payment) if payment.status == PaymentStatus::Completed => {
                self.apply_occupancy(&intent, payment.id).await?;
                return Ok(EventOutcome::AlreadyApplied);
            }
            TransitionOutcome::Unchanged(payment) => {
                tracing::warn!(
                    payment_id = %payment.id,
                    status = %payment.status,
                    "Succeeded event for a payment that can no longer complete"
                );
                return Ok(EventOutcome::AlreadyApplied);
            }
            TransitionOutcome::NotFound => return Ok(unmatched_intent(&intent)),
        };

        self.apply_occupancy(&intent, payment.id).await?;
        Ok(EventOutcome::Applied)
    }

    /// Occupies the property named in the intent's metadata, once per payment
    async fn apply_occupancy(&self, intent: &PaymentIntentObject, payment_id: Uuid) -> AppResult<()> {
        let property_id = metadata_uuid(intent, metadata_keys::PROPERTY_ID);
        let tenant_id = metadata_uuid(intent, metadata_keys::TENANT_ID);
        let (Some(property_id), Some(_tenant_id)) = (property_id, tenant_id) else {
            return Ok(());
        };

        if self
            .properties
            .apply_occupancy_once(payment_id, property_id)
            .await?
        {
            tracing::info!(%payment_id, %property_id, "Property occupancy incremented");
        } else {
            tracing::debug!(%payment_id, %property_id, "Occupancy already applied for payment");
        }
        Ok(())
    }

    async fn handle_intent_failed(&self, intent: PaymentIntentObject) -> AppResult<EventOutcome> {
        let reason = intent
            .last_payment_error
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| "Unknown error".to_string());

        match self
            .payments
            .apply_transition(
                PaymentKey::PaymentIntent(&intent.id),
                &PaymentTransition::Fail { reason },
            )
            .await?
        {
            TransitionOutcome::Applied(payment) => {
                tracing::info!(payment_id = %payment.id, "Payment failed");
                Ok(EventOutcome::Applied)
            }
            TransitionOutcome::Unchanged(payment) => {
                tracing::debug!(payment_id = %payment.id, status = %payment.status, "Failure event ignored");
                Ok(EventOutcome::AlreadyApplied)
            }
            TransitionOutcome::NotFound => Ok(unmatched_intent(&intent)),
        }
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    async fn handle_subscription(
        &self,
        event_type: GatewayEventType,
        subscription: SubscriptionObject,
    ) -> AppResult<EventOutcome> {
        let Some(user_id) = subscription
            .metadata
            .get(metadata_keys::USER_ID)
            .and_then(|id| Uuid::parse_str(id).ok())
        else {
            return Ok(EventOutcome::dropped(
                format!("subscription {} has no userId metadata", subscription.id),
                false,
            ));
        };

        let current_period_end = subscription
            .current_period_end
            .and_then(|ts| DateTime::from_timestamp(ts, 0));

        let update = match event_type {
            GatewayEventType::SubscriptionDeleted => SubscriptionUpdate {
                gateway_subscription_id: subscription.id.clone(),
                status: SubscriptionStatus::Cancelled,
                plan: Some(FREE_PLAN.to_string()),
                current_period_end,
            },
            GatewayEventType::SubscriptionCreated => SubscriptionUpdate {
                gateway_subscription_id: subscription.id.clone(),
                status: SubscriptionStatus::from_gateway(&subscription.status),
                plan: Some(
                    subscription
                        .metadata
                        .get(metadata_keys::PLAN)
                        .cloned()
                        .unwrap_or_else(|| DEFAULT_PAID_PLAN.to_string()),
                ),
                current_period_end,
            },
            _ => SubscriptionUpdate {
                gateway_subscription_id: subscription.id.clone(),
                status: SubscriptionStatus::from_gateway(&subscription.status),
                plan: None,
                current_period_end,
            },
        };

        if self.users.apply_subscription_update(user_id, &update).await? {
            tracing::info!(
                %user_id,
                subscription_id = %subscription.id,
                status = %update.status,
                "Subscription state updated"
            );
            Ok(EventOutcome::Applied)
        } else {
            Ok(EventOutcome::dropped(
                format!("user {} not found", user_id),
                false,
            ))
        }
    }

    // ========================================================================
    // Invoices and refunds
    // ========================================================================

    async fn handle_invoice(
        &self,
        invoice: InvoiceObject,
        succeeded: bool,
        occurred_at: Option<DateTime<Utc>>,
    ) -> AppResult<EventOutcome> {
        let (Some(subscription_id), Some(customer_id)) = (&invoice.subscription, &invoice.customer)
        else {
            return Ok(EventOutcome::dropped(
                format!("invoice {} is not a subscription invoice", invoice.id),
                false,
            ));
        };

        let amount_minor = if succeeded {
            invoice.amount_paid
        } else {
            invoice.amount_due
        };
        if amount_minor <= 0 {
            return Ok(EventOutcome::dropped(
                format!("invoice {} has no amount", invoice.id),
                false,
            ));
        }

        let Some(user) = self.users.get_by_gateway_customer_id(customer_id).await? else {
            return Ok(EventOutcome::dropped(
                format!("no user for customer {}", customer_id),
                false,
            ));
        };

        let input = InvoicePaymentInput {
            user_id: user.id,
            amount: from_minor_units(amount_minor, &invoice.currency),
            currency: invoice.currency.to_ascii_lowercase(),
            succeeded,
            occurred_at: occurred_at.unwrap_or_else(Utc::now),
            gateway_invoice_id: invoice.id.clone(),
            gateway_subscription_id: subscription_id.clone(),
            gateway_customer_id: customer_id.clone(),
            gateway_payment_intent_id: invoice.payment_intent.clone(),
        };

        match self
            .payments
            .record_invoice_payment(&CreatePaymentInput::from(&input))
            .await?
        {
            Some(payment) => {
                tracing::info!(
                    payment_id = %payment.id,
                    invoice_id = %invoice.id,
                    status = %payment.status,
                    "Subscription payment recorded"
                );
                Ok(EventOutcome::Applied)
            }
            None => Ok(EventOutcome::AlreadyApplied),
        }
    }

    async fn handle_charge_refunded(&self, charge: ChargeObject) -> AppResult<EventOutcome> {
        let Some(intent_id) = charge.payment_intent.as_deref() else {
            return Ok(EventOutcome::dropped(
                format!("charge {} has no payment intent", charge.id),
                false,
            ));
        };

        let refunded_minor = charge.refunded_minor();
        if refunded_minor <= 0 {
            return Ok(EventOutcome::dropped(
                format!("charge {} reports no refunded amount", charge.id),
                false,
            ));
        }

        // Absolute totals make redeliveries and reordering harmless
        let total_refunded = from_minor_units(refunded_minor, &charge.currency);
        let transition = PaymentTransition::Refund {
            refunded_at: Utc::now(),
            total_refunded,
            note: Some(format!(
                "Refund total {} {} ({})",
                total_refunded,
                charge.currency.to_uppercase(),
                charge.id
            )),
        };

        match self
            .payments
            .apply_transition(PaymentKey::PaymentIntent(intent_id), &transition)
            .await?
        {
            TransitionOutcome::Applied(payment) => {
                tracing::info!(
                    payment_id = %payment.id,
                    amount_refunded = %payment.amount_refunded,
                    status = %payment.status,
                    "Charge refund recorded"
                );
                Ok(EventOutcome::Applied)
            }
            TransitionOutcome::Unchanged(_) => Ok(EventOutcome::AlreadyApplied),
            TransitionOutcome::NotFound => Ok(EventOutcome::dropped(
                format!("no payment for intent {}", intent_id),
                false,
            )),
        }
    }
}

/// An intent created by the orchestrator carries a payment id; its payment
/// may just not be linked yet, so a redelivery is worth waiting for. Intents
/// without one (subscription invoices) never match.
fn unmatched_intent(intent: &PaymentIntentObject) -> EventOutcome {
    EventOutcome::dropped(
        format!("no payment for intent {}", intent.id),
        intent.metadata.contains_key(metadata_keys::PAYMENT_ID),
    )
}

fn malformed(err: serde_json::Error) -> EventOutcome {
    EventOutcome::dropped(format!("malformed event object: {}", err), false)
}

fn metadata_uuid(intent: &PaymentIntentObject, key: &str) -> Option<Uuid> {
    intent
        .metadata
        .get(key)
        .and_then(|value| Uuid::parse_str(value).ok())
}
