//! Test utilities for integration testing.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - An in-memory ledger standing in for the Postgres adapter
//! - A recording payment gateway
//! - A builder for `AppState` wired to both

mod app_state_builder;
mod factories;
mod gateway_mocks;
mod ledger_mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use gateway_mocks::*;
pub use ledger_mocks::*;

use chrono::Utc;
use hmac::{Hmac, Mac};
use rentflow_types::{AccessClaims, issue_access_token};
use sha2::Sha256;

use crate::{
    application::{jwt::Actor, ports::payment_gateway::GatewayEvent},
    domain::entities::user::User,
};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-test-jwt-secret!";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// A valid one-hour access token for the user.
pub fn token_for(user: &User) -> String {
    let now = Utc::now().timestamp();
    let claims = AccessClaims {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role,
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        iat: now,
        exp: now + 3600,
    };
    issue_access_token(&claims, TEST_JWT_SECRET).unwrap()
}

pub fn actor_for(user: &User) -> Actor {
    Actor {
        user_id: user.id,
        role: user.role,
    }
}

pub fn gateway_event(id: &str, event_type: &str, object: serde_json::Value) -> GatewayEvent {
    GatewayEvent {
        id: id.to_string(),
        event_type: event_type.to_string(),
        created_at: Some(Utc::now()),
        object,
    }
}

/// Builds a `Stripe-Signature` header value for the payload.
pub fn sign_webhook_payload(payload: &str, secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
