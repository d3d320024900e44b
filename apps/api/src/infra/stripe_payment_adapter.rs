use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        CreatedPaymentIntent, CreatedRefund, CreatedSubscription, CustomerId, GatewayEvent,
        GatewayMetadata, PaymentGateway, PaymentIntentId, RefundReason,
    },
    infra::stripe_client::{StripeClient, StripeWebhookEvent},
};
use rentflow_types::metadata_keys;

/// Adapter that wraps StripeClient to implement PaymentGateway.
pub struct StripePaymentAdapter {
    client: StripeClient,
    webhook_secret: SecretString,
    webhook_tolerance_secs: i64,
}

impl StripePaymentAdapter {
    pub fn new(
        client: StripeClient,
        webhook_secret: SecretString,
        webhook_tolerance_secs: i64,
    ) -> Self {
        Self {
            client,
            webhook_secret,
            webhook_tolerance_secs,
        }
    }

    /// Verification against an explicit clock
    pub fn verify_and_parse_at(
        &self,
        raw_body: &str,
        signature_header: &str,
        now: i64,
    ) -> AppResult<Vec<GatewayEvent>> {
        verify_and_parse(
            raw_body,
            signature_header,
            self.webhook_secret.expose_secret(),
            self.webhook_tolerance_secs,
            now,
        )
    }

    fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(ts, 0).single()
    }
}

/// Shared by the Stripe adapter and the test gateway so both reject the same
/// deliveries.
pub fn verify_and_parse(
    raw_body: &str,
    signature_header: &str,
    webhook_secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> AppResult<Vec<GatewayEvent>> {
    StripeClient::verify_webhook_signature(
        raw_body,
        signature_header,
        webhook_secret,
        tolerance_secs,
        now,
    )?;

    let events = StripeClient::parse_webhook_events(raw_body)?;
    Ok(events.into_iter().map(to_gateway_event).collect())
}

fn to_gateway_event(event: StripeWebhookEvent) -> GatewayEvent {
    GatewayEvent {
        id: event.id,
        event_type: event.event_type,
        created_at: event
            .created
            .and_then(StripePaymentAdapter::timestamp_to_datetime),
        object: event.data.object,
    }
}

#[async_trait]
impl PaymentGateway for StripePaymentAdapter {
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        metadata: &GatewayMetadata,
    ) -> AppResult<CustomerId> {
        let customer = self.client.create_customer(email, name, metadata).await?;
        Ok(CustomerId::new(customer.id))
    }

    async fn create_payment_intent(
        &self,
        customer: &CustomerId,
        amount_minor: i64,
        currency: &str,
        metadata: &GatewayMetadata,
    ) -> AppResult<CreatedPaymentIntent> {
        // Resending the call for the same local payment returns its first intent
        let idempotency_key = metadata
            .get(metadata_keys::PAYMENT_ID)
            .map(|payment_id| format!("payment-intent-{}", payment_id));

        let intent = self
            .client
            .create_payment_intent(
                customer.as_str(),
                amount_minor,
                currency,
                metadata,
                idempotency_key.as_deref(),
            )
            .await?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            tracing::error!(payment_intent_id = %intent.id, "Payment intent has no client secret");
            AppError::Upstream("Payment intent returned without a client secret".into())
        })?;

        Ok(CreatedPaymentIntent {
            id: PaymentIntentId::new(intent.id),
            client_secret,
        })
    }

    async fn create_subscription(
        &self,
        customer: &CustomerId,
        price_id: &str,
        metadata: &GatewayMetadata,
    ) -> AppResult<CreatedSubscription> {
        let subscription = self
            .client
            .create_subscription(customer.as_str(), price_id, metadata)
            .await?;

        Ok(CreatedSubscription {
            client_secret: subscription.client_secret().map(str::to_string),
            current_period_end: subscription
                .current_period_end
                .and_then(Self::timestamp_to_datetime),
            id: subscription.id,
            status: subscription.status,
        })
    }

    async fn create_refund(
        &self,
        payment_intent: &PaymentIntentId,
        amount_minor: Option<i64>,
        reason: Option<RefundReason>,
    ) -> AppResult<CreatedRefund> {
        let refund = self
            .client
            .create_refund(
                payment_intent.as_str(),
                amount_minor,
                reason.as_ref().map(RefundReason::as_str),
            )
            .await?;

        Ok(CreatedRefund {
            id: refund.id,
            status: refund.status.unwrap_or_else(|| "pending".to_string()),
            amount_minor: refund.amount,
        })
    }

    fn verify_and_parse_webhook(
        &self,
        raw_body: &str,
        signature_header: &str,
    ) -> AppResult<Vec<GatewayEvent>> {
        self.verify_and_parse_at(raw_body, signature_header, Utc::now().timestamp())
    }
}
