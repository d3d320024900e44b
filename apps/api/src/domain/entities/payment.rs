use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use super::money::minor_unit_exponent;
use super::payment_kind::{PaymentKind, PaymentMethod};
use super::payment_status::PaymentStatus;

#[derive(Debug, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub landlord_id: Uuid,
    pub property_id: Option<Uuid>,
    pub amount: Decimal,
    /// Running total refunded at the gateway, in major units
    pub amount_refunded: Decimal,
    pub currency: String,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub recurring: bool,
    pub recurring_group_id: Option<String>,
    pub gateway_payment_intent_id: Option<String>,
    pub gateway_charge_id: Option<String>,
    pub gateway_invoice_id: Option<String>,
    pub gateway_subscription_id: Option<String>,
    pub gateway_customer_id: Option<String>,
    pub occupancy_applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Late fee owed at `now`. Derived on every read, never stored.
    pub fn late_fee(&self, now: DateTime<Utc>, policy: &LateFeePolicy) -> Decimal {
        late_fee(
            self.kind,
            self.status,
            self.amount,
            &self.currency,
            self.due_date,
            now,
            policy,
        )
    }

    pub fn total_due(&self, now: DateTime<Utc>, policy: &LateFeePolicy) -> Decimal {
        self.amount + self.late_fee(now, policy)
    }

    /// A paid date exists exactly when the payment is completed
    pub fn paid_date_consistent(&self) -> bool {
        (self.status == PaymentStatus::Completed) == self.paid_at.is_some()
    }

    /// True for the payer and the payee
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.tenant_id == user_id || self.landlord_id == user_id
    }
}

/// Late fee terms for overdue rent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LateFeePolicy {
    pub grace_days: i64,
    /// Fee as basis points of the payment amount (500 = 5%)
    pub rate_bps: u32,
}

impl Default for LateFeePolicy {
    fn default() -> Self {
        Self {
            grace_days: 5,
            rate_bps: 500,
        }
    }
}

pub fn late_fee(
    kind: PaymentKind,
    status: PaymentStatus,
    amount: Decimal,
    currency: &str,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &LateFeePolicy,
) -> Decimal {
    if !kind.accrues_late_fee() || status != PaymentStatus::Pending {
        return Decimal::ZERO;
    }
    if now <= due_date + Duration::days(policy.grace_days) {
        return Decimal::ZERO;
    }

    (amount * Decimal::new(policy.rate_bps as i64, 4)).round_dp_with_strategy(
        minor_unit_exponent(currency),
        RoundingStrategy::MidpointAwayFromZero,
    )
}

/// A requested status change, carrying the fields written alongside it
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentTransition {
    Complete {
        paid_at: DateTime<Utc>,
        amount: Option<Decimal>,
        customer_id: Option<String>,
        charge_id: Option<String>,
    },
    Fail {
        reason: String,
    },
    /// Records the gateway's running refund total. The payment becomes
    /// refunded only once the total covers its amount.
    Refund {
        refunded_at: DateTime<Utc>,
        total_refunded: Decimal,
        note: Option<String>,
    },
}

impl PaymentTransition {
    /// The only status this transition may start from
    pub fn from_status(&self) -> PaymentStatus {
        match self {
            PaymentTransition::Complete { .. } | PaymentTransition::Fail { .. } => {
                PaymentStatus::Pending
            }
            PaymentTransition::Refund { .. } => PaymentStatus::Completed,
        }
    }

    /// Status reached when the transition completes. A partial refund keeps
    /// the payment completed.
    pub fn to_status(&self) -> PaymentStatus {
        match self {
            PaymentTransition::Complete { .. } => PaymentStatus::Completed,
            PaymentTransition::Fail { .. } => PaymentStatus::Failed,
            PaymentTransition::Refund { .. } => PaymentStatus::Refunded,
        }
    }

    /// Applies the transition in memory. Returns false and leaves the payment
    /// untouched when the payment is not in the starting status, or when a
    /// refund total is no larger than the one already recorded.
    pub fn apply(&self, payment: &mut Payment, now: DateTime<Utc>) -> bool {
        if payment.status != self.from_status() {
            return false;
        }

        match self {
            PaymentTransition::Complete {
                paid_at,
                amount,
                customer_id,
                charge_id,
            } => {
                payment.paid_at = Some(*paid_at);
                if let Some(amount) = amount {
                    payment.amount = *amount;
                }
                if customer_id.is_some() {
                    payment.gateway_customer_id = customer_id.clone();
                }
                if charge_id.is_some() {
                    payment.gateway_charge_id = charge_id.clone();
                }
                payment.status = self.to_status();
            }
            PaymentTransition::Fail { reason } => {
                payment.notes = Some(append_note(payment.notes.as_deref(), &failure_note(reason)));
                payment.status = self.to_status();
            }
            PaymentTransition::Refund {
                refunded_at,
                total_refunded,
                note,
            } => {
                if *total_refunded <= payment.amount_refunded {
                    return false;
                }
                payment.amount_refunded = *total_refunded;
                if *total_refunded >= payment.amount {
                    payment.status = self.to_status();
                    payment.paid_at = None;
                    payment.refunded_at = Some(*refunded_at);
                }
                if let Some(note) = note {
                    payment.notes = Some(append_note(payment.notes.as_deref(), note));
                }
            }
        }

        payment.updated_at = now;
        true
    }
}

pub fn failure_note(reason: &str) -> String {
    format!("Payment failed: {}", reason)
}

pub fn append_note(existing: Option<&str>, note: &str) -> String {
    match existing {
        Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, note),
        _ => note.to_string(),
    }
}

/// Result of a conditional status write
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Applied(Payment),
    /// The payment exists but was not in the starting status
    Unchanged(Payment),
    NotFound,
}
