pub mod health;
pub mod payments;
pub mod subscriptions;
pub mod webhooks;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/health", health::router())
        .nest("/payments", payments::router())
        .nest("/subscriptions", subscriptions::router())
        .nest("/webhooks", webhooks::router())
}
