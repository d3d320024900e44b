use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    adapters::http::{
        app_state::AppState,
        extractors::{AuthenticatedActor, ValidatedJson},
    },
    app_error::{AppError, AppResult},
    application::{
        ports::payment_gateway::RefundReason,
        use_cases::payments::{InitiatePaymentInput, PaymentView, RefundInput},
        validators::{validate_currency, validate_positive_amount},
    },
    domain::entities::{
        payment_kind::{PaymentKind, PaymentMethod},
        payment_status::PaymentStatus,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_payment))
        .route("/{id}", get(get_payment))
        .route("/{id}/refund", post(refund_payment))
}

// ============================================================================
// Request / Response bodies
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreatePaymentRequest {
    #[validate(custom(function = "validate_positive_amount"))]
    amount: Decimal,
    #[serde(rename = "type", alias = "kind")]
    kind: PaymentKind,
    property_id: Option<Uuid>,
    #[validate(length(max = 500))]
    description: Option<String>,
    #[validate(custom(function = "validate_currency"))]
    currency: Option<String>,
    due_date: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentResponse {
    client_secret: String,
    payment_intent_id: String,
    payment_id: Uuid,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RefundRequest {
    #[validate(custom(function = "validate_positive_amount"))]
    amount: Option<Decimal>,
    reason: Option<RefundReason>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefundResponse {
    refund_id: String,
    status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResponse {
    id: Uuid,
    tenant_id: Uuid,
    landlord_id: Uuid,
    property_id: Option<Uuid>,
    amount: Decimal,
    amount_refunded: Decimal,
    currency: String,
    #[serde(rename = "type")]
    kind: PaymentKind,
    status: PaymentStatus,
    method: PaymentMethod,
    description: Option<String>,
    notes: Option<String>,
    due_date: DateTime<Utc>,
    paid_date: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    late_fee: Decimal,
    total_due: Decimal,
    payment_intent_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentView> for PaymentResponse {
    fn from(view: PaymentView) -> Self {
        let p = view.payment;
        Self {
            id: p.id,
            tenant_id: p.tenant_id,
            landlord_id: p.landlord_id,
            property_id: p.property_id,
            amount: p.amount,
            amount_refunded: p.amount_refunded,
            currency: p.currency,
            kind: p.kind,
            status: p.status,
            method: p.method,
            description: p.description,
            notes: p.notes,
            due_date: p.due_date,
            paid_date: p.paid_at,
            refunded_at: p.refunded_at,
            late_fee: view.late_fee,
            total_due: view.total_due,
            payment_intent_id: p.gateway_payment_intent_id,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

fn parse_payment_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidInput("Invalid payment id".into()))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/payments/create
async fn create_payment(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ValidatedJson(payload): ValidatedJson<CreatePaymentRequest>,
) -> AppResult<impl IntoResponse> {
    let input = InitiatePaymentInput {
        amount: payload.amount,
        kind: payload.kind,
        property_id: payload.property_id,
        description: payload.description,
        currency: payload
            .currency
            .unwrap_or_else(|| app_state.config.default_currency.clone()),
        due_date: payload.due_date,
    };

    let created = app_state
        .payment_use_cases
        .initiate_rent_payment(&actor, input)
        .await?;

    Ok(Json(CreatePaymentResponse {
        client_secret: created.client_secret,
        payment_intent_id: created.payment_intent_id,
        payment_id: created.payment_id,
    }))
}

/// GET /api/payments/{id}
async fn get_payment(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let payment_id = parse_payment_id(&id)?;
    let view = app_state
        .payment_use_cases
        .get_payment(&actor, payment_id)
        .await?;

    Ok(Json(PaymentResponse::from(view)))
}

/// POST /api/payments/{id}/refund
async fn refund_payment(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<RefundRequest>,
) -> AppResult<impl IntoResponse> {
    let payment_id = parse_payment_id(&id)?;
    let refund = app_state
        .payment_use_cases
        .refund_payment(
            &actor,
            payment_id,
            RefundInput {
                amount: payload.amount,
                reason: payload.reason,
            },
        )
        .await?;

    Ok(Json(RefundResponse {
        refund_id: refund.refund_id,
        status: refund.status,
    }))
}
