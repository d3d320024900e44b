use std::sync::Arc;

use crate::{
    application::{
        jwt::AccessVerifier,
        use_cases::{payments::PaymentUseCases, reconciliation::WebhookReconciler},
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub payment_use_cases: Arc<PaymentUseCases>,
    pub reconciler: Arc<WebhookReconciler>,
    pub access_verifier: Arc<dyn AccessVerifier>,
}
