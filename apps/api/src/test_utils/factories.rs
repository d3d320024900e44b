//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rentflow_types::UserRole;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::entities::{
    payment::Payment,
    payment_kind::{PaymentKind, PaymentMethod},
    payment_status::PaymentStatus,
    property::{Property, PropertyStatus},
    user::{SubscriptionState, User},
};

/// Create a test user with sensible defaults.
pub fn create_test_user(overrides: impl FnOnce(&mut User)) -> User {
    let id = Uuid::new_v4();
    let mut user = User {
        id,
        email: format!("user-{}@example.com", id.simple()),
        first_name: Some("Test".to_string()),
        last_name: Some("User".to_string()),
        role: UserRole::Tenant,
        gateway_customer_id: None,
        subscription: SubscriptionState::default(),
        created_at: test_datetime(),
        updated_at: test_datetime(),
    };
    overrides(&mut user);
    user
}

/// Create a test property with sensible defaults.
pub fn create_test_property(overrides: impl FnOnce(&mut Property)) -> Property {
    let mut property = Property {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        manager_id: None,
        name: "12 Elm Street, Unit 4".to_string(),
        status: PropertyStatus::Available,
        current_tenants: 0,
        max_tenants: 4,
        created_at: test_datetime(),
        updated_at: test_datetime(),
    };
    overrides(&mut property);
    property
}

/// Create a pending rent payment of 1200.00 usd, due a month after
/// `test_datetime()`.
pub fn create_test_payment(overrides: impl FnOnce(&mut Payment)) -> Payment {
    let mut payment = Payment {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        landlord_id: Uuid::new_v4(),
        property_id: None,
        amount: Decimal::new(120000, 2),
        amount_refunded: Decimal::ZERO,
        currency: "usd".to_string(),
        kind: PaymentKind::Rent,
        status: PaymentStatus::Pending,
        method: PaymentMethod::Stripe,
        description: Some("Monthly rent".to_string()),
        notes: None,
        due_date: test_datetime() + Duration::days(30),
        paid_at: None,
        refunded_at: None,
        recurring: false,
        recurring_group_id: None,
        gateway_payment_intent_id: None,
        gateway_charge_id: None,
        gateway_invoice_id: None,
        gateway_subscription_id: None,
        gateway_customer_id: None,
        occupancy_applied_at: None,
        created_at: test_datetime(),
        updated_at: test_datetime(),
    };
    overrides(&mut payment);
    payment
}

/// Fixed timestamp for deterministic tests
pub fn test_datetime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
}
