//! In-memory ledger implementing every store trait of the billing core.
//!
//! All state sits behind one mutex so each trait method is atomic, like the
//! single-statement writes of the Postgres adapter.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::ledger::{
        BillingUserRepo, CreatePaymentInput, PaymentKey, PaymentRepo, ProcessedEventRepo,
        PropertyRepo, SubscriptionUpdate,
    },
    domain::entities::{
        payment::{Payment, PaymentTransition, TransitionOutcome},
        property::Property,
        user::User,
    },
};

#[derive(Default)]
struct LedgerState {
    /// Insertion order is kept so tests can index results
    payments: Vec<Payment>,
    users: HashMap<Uuid, User>,
    properties: HashMap<Uuid, Property>,
    claimed_events: HashSet<String>,
}

impl LedgerState {
    fn find_payment_mut(&mut self, key: PaymentKey<'_>) -> Option<&mut Payment> {
        self.payments.iter_mut().find(|p| match key {
            PaymentKey::Id(id) => p.id == id,
            PaymentKey::PaymentIntent(intent_id) => {
                p.gateway_payment_intent_id.as_deref() == Some(intent_id)
                    && p.gateway_invoice_id.is_none()
            }
        })
    }
}

#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    fail_writes: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) -> User {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(user.id, user.clone());
        user
    }

    pub fn insert_property(&self, property: Property) -> Property {
        self.state
            .lock()
            .unwrap()
            .properties
            .insert(property.id, property.clone());
        property
    }

    pub fn insert_payment(&self, payment: Payment) -> Payment {
        self.state.lock().unwrap().payments.push(payment.clone());
        payment
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        self.state.lock().unwrap().users.get(&id).cloned()
    }

    pub fn property(&self, id: Uuid) -> Option<Property> {
        self.state.lock().unwrap().properties.get(&id).cloned()
    }

    pub fn payment(&self, id: Uuid) -> Option<Payment> {
        self.state
            .lock()
            .unwrap()
            .payments
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.state.lock().unwrap().payments.clone()
    }

    pub fn payment_count(&self) -> usize {
        self.state.lock().unwrap().payments.len()
    }

    pub fn is_event_claimed(&self, event_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .claimed_events
            .contains(event_id)
    }

    /// Makes payment, user and property writes fail. Event claims still work.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database("simulated write failure".into()));
        }
        Ok(())
    }

    fn build_payment(input: &CreatePaymentInput) -> AppResult<Payment> {
        if input.amount <= rust_decimal::Decimal::ZERO {
            return Err(AppError::InvalidInput(
                "Value violates a ledger constraint".into(),
            ));
        }
        let now = Utc::now();
        Ok(Payment {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            landlord_id: input.landlord_id,
            property_id: input.property_id,
            amount: input.amount,
            amount_refunded: rust_decimal::Decimal::ZERO,
            currency: input.currency.clone(),
            kind: input.kind,
            status: input.status,
            method: input.method,
            description: input.description.clone(),
            notes: input.notes.clone(),
            due_date: input.due_date,
            paid_at: input.paid_at,
            refunded_at: None,
            recurring: false,
            recurring_group_id: None,
            gateway_payment_intent_id: input.gateway_payment_intent_id.clone(),
            gateway_charge_id: None,
            gateway_invoice_id: input.gateway_invoice_id.clone(),
            gateway_subscription_id: input.gateway_subscription_id.clone(),
            gateway_customer_id: input.gateway_customer_id.clone(),
            occupancy_applied_at: None,
            created_at: now,
            updated_at: now,
        })
    }
}

#[async_trait]
impl PaymentRepo for InMemoryLedger {
    async fn create(&self, input: &CreatePaymentInput) -> AppResult<Payment> {
        self.check_writable()?;
        let payment = Self::build_payment(input)?;
        self.state.lock().unwrap().payments.push(payment.clone());
        Ok(payment)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Payment>> {
        Ok(self.payment(id))
    }

    async fn attach_gateway_ids(
        &self,
        id: Uuid,
        payment_intent_id: &str,
        customer_id: &str,
    ) -> AppResult<()> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        if let Some(payment) = state.find_payment_mut(PaymentKey::Id(id)) {
            payment.gateway_payment_intent_id = Some(payment_intent_id.to_string());
            payment.gateway_customer_id = Some(customer_id.to_string());
            payment.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn apply_transition(
        &self,
        key: PaymentKey<'_>,
        transition: &PaymentTransition,
    ) -> AppResult<TransitionOutcome> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let Some(payment) = state.find_payment_mut(key) else {
            return Ok(TransitionOutcome::NotFound);
        };

        if transition.apply(payment, Utc::now()) {
            Ok(TransitionOutcome::Applied(payment.clone()))
        } else {
            Ok(TransitionOutcome::Unchanged(payment.clone()))
        }
    }

    async fn record_invoice_payment(
        &self,
        input: &CreatePaymentInput,
    ) -> AppResult<Option<Payment>> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let duplicate = input.gateway_invoice_id.is_some()
            && state.payments.iter().any(|p| {
                p.gateway_invoice_id == input.gateway_invoice_id && p.status == input.status
            });
        if duplicate {
            return Ok(None);
        }

        let payment = Self::build_payment(input)?;
        state.payments.push(payment.clone());
        Ok(Some(payment))
    }
}

#[async_trait]
impl BillingUserRepo for InMemoryLedger {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.user(id))
    }

    async fn get_by_gateway_customer_id(&self, customer_id: &str) -> AppResult<Option<User>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.gateway_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn set_gateway_customer_id_if_absent(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> AppResult<String> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let user = state.users.get_mut(&user_id).ok_or(AppError::NotFound)?;
        if user.gateway_customer_id.is_none() {
            user.gateway_customer_id = Some(customer_id.to_string());
            user.updated_at = Utc::now();
        }
        Ok(user.gateway_customer_id.clone().unwrap_or_default())
    }

    async fn apply_subscription_update(
        &self,
        user_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> AppResult<bool> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        let Some(user) = state.users.get_mut(&user_id) else {
            return Ok(false);
        };

        user.subscription.gateway_subscription_id = Some(update.gateway_subscription_id.clone());
        user.subscription.status = update.status;
        if let Some(plan) = &update.plan {
            user.subscription.plan = plan.clone();
        }
        if update.current_period_end.is_some() {
            user.subscription.current_period_end = update.current_period_end;
        }
        user.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl PropertyRepo for InMemoryLedger {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Property>> {
        Ok(self.property(id))
    }

    async fn apply_occupancy_once(&self, payment_id: Uuid, property_id: Uuid) -> AppResult<bool> {
        self.check_writable()?;
        let mut state = self.state.lock().unwrap();
        if !state.properties.contains_key(&property_id) {
            return Ok(false);
        }

        let now = Utc::now();
        match state.find_payment_mut(PaymentKey::Id(payment_id)) {
            Some(payment) if payment.occupancy_applied_at.is_none() => {
                payment.occupancy_applied_at = Some(now);
            }
            _ => return Ok(false),
        }

        if let Some(property) = state.properties.get_mut(&property_id) {
            property.occupy(now);
        }
        Ok(true)
    }
}

#[async_trait]
impl ProcessedEventRepo for InMemoryLedger {
    async fn claim(&self, event_id: &str, _event_type: &str) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .claimed_events
            .insert(event_id.to_string()))
    }

    async fn release(&self, event_id: &str) -> AppResult<()> {
        self.state
            .lock()
            .unwrap()
            .claimed_events
            .remove(event_id);
        Ok(())
    }
}
