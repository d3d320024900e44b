//! Recording payment gateway for use case and route tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        CreatedPaymentIntent, CreatedRefund, CreatedSubscription, CustomerId, GatewayEvent,
        GatewayMetadata, PaymentGateway, PaymentIntentId, RefundReason,
    },
    infra::stripe_payment_adapter::verify_and_parse,
    test_utils::TEST_WEBHOOK_SECRET,
};

#[derive(Debug, Clone)]
pub struct RecordedCustomer {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub metadata: GatewayMetadata,
}

#[derive(Debug, Clone)]
pub struct RecordedIntent {
    pub id: String,
    pub customer_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: GatewayMetadata,
}

#[derive(Debug, Clone)]
pub struct RecordedSubscription {
    pub id: String,
    pub customer_id: String,
    pub price_id: String,
    pub metadata: GatewayMetadata,
}

#[derive(Debug, Clone)]
pub struct RecordedRefund {
    pub id: String,
    pub payment_intent_id: String,
    pub amount_minor: Option<i64>,
    pub reason: Option<RefundReason>,
}

/// Accepts every call and remembers it. Failures can be switched on per
/// operation.
#[derive(Default)]
pub struct FakeGateway {
    customers: Mutex<Vec<RecordedCustomer>>,
    intents: Mutex<Vec<RecordedIntent>>,
    subscriptions: Mutex<Vec<RecordedSubscription>>,
    refunds: Mutex<Vec<RecordedRefund>>,
    fail_intents: AtomicBool,
    fail_subscriptions: AtomicBool,
    counter: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_payment_intents(&self) {
        self.fail_intents.store(true, Ordering::SeqCst);
    }

    pub fn fail_subscriptions(&self) {
        self.fail_subscriptions.store(true, Ordering::SeqCst);
    }

    pub fn created_customers(&self) -> Vec<RecordedCustomer> {
        self.customers.lock().unwrap().clone()
    }

    pub fn created_intents(&self) -> Vec<RecordedIntent> {
        self.intents.lock().unwrap().clone()
    }

    pub fn created_subscriptions(&self) -> Vec<RecordedSubscription> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn created_refunds(&self) -> Vec<RecordedRefund> {
        self.refunds.lock().unwrap().clone()
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}_fake{}", prefix, n)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        metadata: &GatewayMetadata,
    ) -> AppResult<CustomerId> {
        let id = self.next_id("cus");
        self.customers.lock().unwrap().push(RecordedCustomer {
            id: id.clone(),
            email: email.to_string(),
            name: name.map(str::to_string),
            metadata: metadata.clone(),
        });
        Ok(CustomerId::new(id))
    }

    async fn create_payment_intent(
        &self,
        customer: &CustomerId,
        amount_minor: i64,
        currency: &str,
        metadata: &GatewayMetadata,
    ) -> AppResult<CreatedPaymentIntent> {
        if self.fail_intents.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("card network unavailable".into()));
        }

        let id = self.next_id("pi");
        self.intents.lock().unwrap().push(RecordedIntent {
            id: id.clone(),
            customer_id: customer.as_str().to_string(),
            amount_minor,
            currency: currency.to_string(),
            metadata: metadata.clone(),
        });
        Ok(CreatedPaymentIntent {
            client_secret: format!("{}_secret_test", id),
            id: PaymentIntentId::new(id),
        })
    }

    async fn create_subscription(
        &self,
        customer: &CustomerId,
        price_id: &str,
        metadata: &GatewayMetadata,
    ) -> AppResult<CreatedSubscription> {
        if self.fail_subscriptions.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("subscription rejected".into()));
        }

        let id = self.next_id("sub");
        self.subscriptions.lock().unwrap().push(RecordedSubscription {
            id: id.clone(),
            customer_id: customer.as_str().to_string(),
            price_id: price_id.to_string(),
            metadata: metadata.clone(),
        });
        Ok(CreatedSubscription {
            client_secret: Some(format!("{}_secret_test", id)),
            current_period_end: Some(Utc::now() + Duration::days(30)),
            status: "incomplete".to_string(),
            id,
        })
    }

    async fn create_refund(
        &self,
        payment_intent: &PaymentIntentId,
        amount_minor: Option<i64>,
        reason: Option<RefundReason>,
    ) -> AppResult<CreatedRefund> {
        let id = self.next_id("re");
        self.refunds.lock().unwrap().push(RecordedRefund {
            id: id.clone(),
            payment_intent_id: payment_intent.as_str().to_string(),
            amount_minor,
            reason,
        });
        Ok(CreatedRefund {
            id,
            status: "succeeded".to_string(),
            amount_minor: amount_minor.unwrap_or_default(),
        })
    }

    fn verify_and_parse_webhook(
        &self,
        raw_body: &str,
        signature_header: &str,
    ) -> AppResult<Vec<GatewayEvent>> {
        verify_and_parse(
            raw_body,
            signature_header,
            TEST_WEBHOOK_SECRET,
            300,
            Utc::now().timestamp(),
        )
    }
}
