use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    adapters::http::{
        app_state::AppState,
        extractors::{AuthenticatedActor, ValidatedJson},
    },
    app_error::AppResult,
    application::{
        use_cases::payments::InitiateSubscriptionInput,
        validators::{validate_plan_code, validate_price_id},
    },
};

pub fn router() -> Router<AppState> {
    Router::new().route("/create", post(create_subscription))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateSubscriptionRequest {
    #[validate(custom(function = "validate_price_id"))]
    price_id: String,
    #[validate(custom(function = "validate_plan_code"))]
    plan: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSubscriptionResponse {
    subscription_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
    status: String,
}

/// POST /api/subscriptions/create
async fn create_subscription(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ValidatedJson(payload): ValidatedJson<CreateSubscriptionRequest>,
) -> AppResult<impl IntoResponse> {
    let created = app_state
        .payment_use_cases
        .initiate_subscription(
            &actor,
            InitiateSubscriptionInput {
                price_id: payload.price_id,
                plan: payload.plan,
            },
        )
        .await?;

    Ok(Json(CreateSubscriptionResponse {
        subscription_id: created.subscription_id,
        client_secret: created.client_secret,
        status: created.status,
    }))
}
