use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use serde_json::json;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", post(handle_gateway_webhook))
}

/// POST /api/webhooks/gateway
///
/// Once the signature checks out the delivery is acknowledged, whatever
/// happened to the individual events.
async fn handle_gateway_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::InvalidSignature("Missing stripe-signature header".into()))?;

    let report = app_state
        .reconciler
        .handle_delivery(&body, signature)
        .await?;

    tracing::info!(
        events = report.outcomes.len(),
        applied = report.applied(),
        "Webhook delivery processed"
    );

    Ok(Json(json!({ "received": true })))
}
