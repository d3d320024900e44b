//! Test app state builder for HTTP-level integration testing.
//!
//! `TestAppStateBuilder` wires the real use cases to an in-memory ledger and a
//! recording gateway, so route tests can assert on both.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    application::{
        jwt::JwtAccessVerifier,
        use_cases::{payments::PaymentUseCases, reconciliation::WebhookReconciler},
    },
    domain::entities::payment::LateFeePolicy,
    infra::config::AppConfig,
    test_utils::{FakeGateway, InMemoryLedger, TEST_JWT_SECRET, TEST_WEBHOOK_SECRET},
};

/// Builder for creating `AppState` with in-memory mocks for testing.
///
/// # Example
///
/// ```ignore
/// let ledger = Arc::new(InMemoryLedger::new());
/// let tenant = ledger.insert_user(create_test_user(|_| {}));
///
/// let app_state = TestAppStateBuilder::new()
///     .with_ledger(ledger.clone())
///     .build();
/// ```
pub struct TestAppStateBuilder {
    ledger: Arc<InMemoryLedger>,
    gateway: Arc<FakeGateway>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(InMemoryLedger::new()),
            gateway: Arc::new(FakeGateway::new()),
        }
    }

    /// Share a ledger with the test so it can seed and inspect rows.
    pub fn with_ledger(mut self, ledger: Arc<InMemoryLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Share a gateway with the test so it can inspect recorded calls.
    pub fn with_gateway(mut self, gateway: Arc<FakeGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn build(self) -> AppState {
        let config = Arc::new(test_config());

        let payment_use_cases = Arc::new(PaymentUseCases::new(
            self.ledger.clone(),
            self.ledger.clone(),
            self.ledger.clone(),
            self.gateway.clone(),
            config.late_fee_policy,
        ));

        let reconciler = Arc::new(WebhookReconciler::new(
            self.gateway,
            self.ledger.clone(),
            self.ledger.clone(),
            self.ledger.clone(),
            self.ledger,
        ));

        AppState {
            config,
            payment_use_cases,
            reconciler,
            access_verifier: Arc::new(JwtAccessVerifier::new(
                SecretString::new(TEST_JWT_SECRET.into()),
                0,
            )),
        }
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: String::new(),
        jwt_secret: SecretString::new(TEST_JWT_SECRET.into()),
        jwt_leeway_secs: 0,
        stripe_secret_key: SecretString::new("sk_test_unused".into()),
        stripe_webhook_secret: SecretString::new(TEST_WEBHOOK_SECRET.into()),
        stripe_api_base: Url::parse("http://localhost:12111/v1").unwrap(),
        gateway_timeout: Duration::from_secs(1),
        webhook_tolerance_secs: 300,
        late_fee_policy: LateFeePolicy::default(),
        default_currency: "usd".to_string(),
        bind_addr: "127.0.0.1:3001".parse::<SocketAddr>().unwrap(),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        db_max_connections: 1,
        run_migrations: false,
        log_file: String::new(),
    }
}
