use std::sync::Arc;

use chrono::{DateTime, Utc};
use rentflow_types::metadata_keys;
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        jwt::Actor,
        ports::payment_gateway::{
            CustomerId, GatewayMetadata, PaymentGateway, PaymentIntentId, RefundReason,
        },
        validators::{is_valid_currency, is_valid_plan_code, is_valid_price_id},
    },
    domain::entities::{
        money::to_minor_units,
        payment::{LateFeePolicy, Payment, PaymentTransition, TransitionOutcome},
        payment_kind::PaymentKind,
        payment_status::PaymentStatus,
        user::{SubscriptionStatus, User},
    },
};

use super::ledger::{
    BillingUserRepo, CreatePaymentInput, PaymentKey, PaymentRepo, PropertyRepo,
    SubscriptionUpdate,
};

// ============================================================================
// Inputs and Results
// ============================================================================

#[derive(Debug, Clone)]
pub struct InitiatePaymentInput {
    pub amount: Decimal,
    pub kind: PaymentKind,
    pub property_id: Option<Uuid>,
    pub description: Option<String>,
    pub currency: String,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub payment_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct InitiateSubscriptionInput {
    pub price_id: String,
    pub plan: String,
}

#[derive(Debug, Clone)]
pub struct InitiatedSubscription {
    pub subscription_id: String,
    pub client_secret: Option<String>,
    /// Raw gateway status, e.g. `incomplete` until the first invoice is paid
    pub status: String,
}

#[derive(Debug, Clone, Default)]
pub struct RefundInput {
    /// Partial refund in major units; the full amount when absent
    pub amount: Option<Decimal>,
    pub reason: Option<RefundReason>,
}

#[derive(Debug, Clone)]
pub struct RefundResult {
    pub refund_id: String,
    pub status: String,
}

/// A payment together with its derived amounts at read time
#[derive(Debug, Clone)]
pub struct PaymentView {
    pub payment: Payment,
    pub late_fee: Decimal,
    pub total_due: Decimal,
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct PaymentUseCases {
    payments: Arc<dyn PaymentRepo>,
    users: Arc<dyn BillingUserRepo>,
    properties: Arc<dyn PropertyRepo>,
    gateway: Arc<dyn PaymentGateway>,
    late_fees: LateFeePolicy,
}

impl PaymentUseCases {
    pub fn new(
        payments: Arc<dyn PaymentRepo>,
        users: Arc<dyn BillingUserRepo>,
        properties: Arc<dyn PropertyRepo>,
        gateway: Arc<dyn PaymentGateway>,
        late_fees: LateFeePolicy,
    ) -> Self {
        Self {
            payments,
            users,
            properties,
            gateway,
            late_fees,
        }
    }

    /// Creates a pending payment and a gateway intent for it.
    ///
    /// If the gateway call fails the pending payment stays behind without an
    /// intent id. It is never retried and never charged.
    #[instrument(skip(self, input), fields(user_id = %actor.user_id, kind = %input.kind))]
    pub async fn initiate_rent_payment(
        &self,
        actor: &Actor,
        input: InitiatePaymentInput,
    ) -> AppResult<InitiatedPayment> {
        let currency = input.currency.trim().to_ascii_lowercase();
        if !is_valid_currency(&currency) {
            return Err(AppError::InvalidInput(
                "currency must be a three-letter code".into(),
            ));
        }
        let amount_minor = to_minor_units(input.amount, &currency)?;

        let payer = self
            .users
            .get_by_id(actor.user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let landlord_id = match input.property_id {
            Some(property_id) => {
                self.properties
                    .get_by_id(property_id)
                    .await?
                    .ok_or(AppError::NotFound)?
                    .owner_id
            }
            None => payer.id,
        };

        let customer = self.ensure_customer(&payer).await?;

        let payment = self
            .payments
            .create(&CreatePaymentInput::pending(
                payer.id,
                landlord_id,
                input.property_id,
                input.amount,
                currency.clone(),
                input.kind,
                input.description,
                input.due_date.unwrap_or_else(Utc::now),
            ))
            .await?;

        let intent = self
            .gateway
            .create_payment_intent(
                &customer,
                amount_minor,
                &currency,
                &intent_metadata(&payment),
            )
            .await
            .inspect_err(|e| {
                tracing::error!(
                    payment_id = %payment.id,
                    error = %e,
                    "Payment intent creation failed, payment left pending without intent"
                );
            })?;

        self.payments
            .attach_gateway_ids(payment.id, intent.id.as_str(), customer.as_str())
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            payment_intent_id = %intent.id,
            amount_minor,
            currency = %currency,
            "Payment initiated"
        );

        Ok(InitiatedPayment {
            client_secret: intent.client_secret,
            payment_intent_id: intent.id.0,
            payment_id: payment.id,
        })
    }

    /// Starts a gateway subscription and records plan, status, subscription id
    /// and period end on the user in one write.
    #[instrument(skip(self, input), fields(user_id = %actor.user_id, plan = %input.plan))]
    pub async fn initiate_subscription(
        &self,
        actor: &Actor,
        input: InitiateSubscriptionInput,
    ) -> AppResult<InitiatedSubscription> {
        if !is_valid_price_id(&input.price_id) {
            return Err(AppError::InvalidInput("priceId is not valid".into()));
        }
        if !is_valid_plan_code(&input.plan) {
            return Err(AppError::InvalidInput("plan is not valid".into()));
        }

        let user = self
            .users
            .get_by_id(actor.user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let customer = self.ensure_customer(&user).await?;

        let mut metadata = GatewayMetadata::new();
        metadata.insert(metadata_keys::USER_ID.into(), user.id.to_string());
        metadata.insert(metadata_keys::PLAN.into(), input.plan.clone());
        metadata.insert(metadata_keys::EMAIL.into(), user.email.clone());

        let subscription = self
            .gateway
            .create_subscription(&customer, &input.price_id, &metadata)
            .await?;

        let update = SubscriptionUpdate {
            gateway_subscription_id: subscription.id.clone(),
            status: SubscriptionStatus::from_gateway(&subscription.status),
            plan: Some(input.plan),
            current_period_end: subscription.current_period_end,
        };
        if !self.users.apply_subscription_update(user.id, &update).await? {
            tracing::error!(
                subscription_id = %subscription.id,
                "User disappeared while creating subscription"
            );
            return Err(AppError::NotFound);
        }

        tracing::info!(
            subscription_id = %subscription.id,
            gateway_status = %subscription.status,
            "Subscription initiated"
        );

        Ok(InitiatedSubscription {
            subscription_id: subscription.id,
            client_secret: subscription.client_secret,
            status: subscription.status,
        })
    }

    /// Refunds a completed payment at the gateway and records the new refund
    /// total. The payment becomes refunded once nothing is left to refund.
    /// Only the payee or a manager may refund.
    #[instrument(skip(self, input), fields(user_id = %actor.user_id))]
    pub async fn refund_payment(
        &self,
        actor: &Actor,
        payment_id: Uuid,
        input: RefundInput,
    ) -> AppResult<RefundResult> {
        let payment = self.get_visible_payment(actor, payment_id).await?;
        if payment.landlord_id != actor.user_id && !actor.is_manager() {
            return Err(AppError::Forbidden);
        }
        if payment.status != PaymentStatus::Completed {
            return Err(AppError::InvalidInput(
                "Only completed payments can be refunded".into(),
            ));
        }
        let Some(intent_id) = payment.gateway_payment_intent_id.clone() else {
            return Err(AppError::InvalidInput(
                "Payment was not collected through the gateway".into(),
            ));
        };

        let refundable = payment.amount - payment.amount_refunded;
        let (refund_amount, amount_minor) = match input.amount {
            Some(amount) if amount > refundable => {
                return Err(AppError::InvalidInput(
                    "Refund amount exceeds the amount left to refund".into(),
                ));
            }
            Some(amount) => (amount, Some(to_minor_units(amount, &payment.currency)?)),
            // The gateway refunds whatever is left when no amount is sent
            None => (refundable, None),
        };

        let refund = self
            .gateway
            .create_refund(&PaymentIntentId::new(intent_id), amount_minor, input.reason)
            .await?;

        let transition = PaymentTransition::Refund {
            refunded_at: Utc::now(),
            total_refunded: payment.amount_refunded + refund_amount,
            note: Some(format!(
                "Refunded {} {} ({})",
                refund_amount,
                payment.currency.to_uppercase(),
                refund.id
            )),
        };
        match self
            .payments
            .apply_transition(PaymentKey::Id(payment.id), &transition)
            .await?
        {
            TransitionOutcome::Applied(updated) => {
                tracing::info!(
                    payment_id = %payment.id,
                    refund_id = %refund.id,
                    amount_refunded = %updated.amount_refunded,
                    status = %updated.status,
                    "Refund recorded"
                );
            }
            TransitionOutcome::Unchanged(current) => {
                tracing::debug!(
                    payment_id = %payment.id,
                    status = %current.status,
                    "Payment already moved on before refund was recorded"
                );
            }
            TransitionOutcome::NotFound => {
                tracing::warn!(payment_id = %payment.id, "Refunded payment vanished");
            }
        }

        Ok(RefundResult {
            refund_id: refund.id,
            status: refund.status,
        })
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn get_payment(&self, actor: &Actor, payment_id: Uuid) -> AppResult<PaymentView> {
        let payment = self.get_visible_payment(actor, payment_id).await?;
        let now = Utc::now();

        Ok(PaymentView {
            late_fee: payment.late_fee(now, &self.late_fees),
            total_due: payment.total_due(now, &self.late_fees),
            payment,
        })
    }

    /// Payments outside the actor's reach look the same as missing ones
    async fn get_visible_payment(&self, actor: &Actor, payment_id: Uuid) -> AppResult<Payment> {
        let payment = self
            .payments
            .get_by_id(payment_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if payment.is_party(actor.user_id) || actor.is_manager() {
            Ok(payment)
        } else {
            Err(AppError::NotFound)
        }
    }

    /// Returns the user's gateway customer, creating it on first use.
    /// Concurrent first uses may each create a customer; only one is stored
    /// and the others are logged as orphaned.
    async fn ensure_customer(&self, user: &User) -> AppResult<CustomerId> {
        if let Some(existing) = &user.gateway_customer_id {
            return Ok(CustomerId::new(existing.clone()));
        }

        let mut metadata = GatewayMetadata::new();
        metadata.insert(metadata_keys::USER_ID.into(), user.id.to_string());
        metadata.insert(metadata_keys::ROLE.into(), user.role.to_string());

        let created = self
            .gateway
            .create_customer(&user.email, user.display_name().as_deref(), &metadata)
            .await?;

        let stored = self
            .users
            .set_gateway_customer_id_if_absent(user.id, created.as_str())
            .await?;

        if stored != created.as_str() {
            tracing::warn!(
                user_id = %user.id,
                orphaned_customer_id = %created,
                customer_id = %stored,
                "Concurrent customer creation, keeping the stored customer"
            );
        }

        Ok(CustomerId::new(stored))
    }
}

fn intent_metadata(payment: &Payment) -> GatewayMetadata {
    let mut metadata = GatewayMetadata::new();
    metadata.insert(metadata_keys::PAYMENT_ID.into(), payment.id.to_string());
    metadata.insert(metadata_keys::USER_ID.into(), payment.tenant_id.to_string());
    metadata.insert(metadata_keys::TENANT_ID.into(), payment.tenant_id.to_string());
    if let Some(property_id) = payment.property_id {
        metadata.insert(metadata_keys::PROPERTY_ID.into(), property_id.to_string());
    }
    metadata.insert(metadata_keys::KIND.into(), payment.kind.to_string());
    if let Some(description) = &payment.description {
        metadata.insert(metadata_keys::DESCRIPTION.into(), description.clone());
    }
    metadata
}
