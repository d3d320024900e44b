use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::{
    app_error::{AppError, AppResult},
    infra::http_client::build_client,
};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
    api_base: String,
}

impl StripeClient {
    pub fn new(
        secret_key: SecretString,
        api_base: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    // ========================================================================
    // Customers
    // ========================================================================

    pub async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        metadata: &BTreeMap<String, String>,
    ) -> AppResult<StripeCustomer> {
        let mut params: Vec<(String, String)> = vec![("email".to_string(), email.to_string())];
        if let Some(name) = name {
            params.push(("name".to_string(), name.to_string()));
        }
        push_metadata(&mut params, metadata);

        self.post_form("customers", &params, None).await
    }

    // ========================================================================
    // Payment Intents
    // ========================================================================

    pub async fn create_payment_intent(
        &self,
        customer_id: &str,
        amount_minor: i64,
        currency: &str,
        metadata: &BTreeMap<String, String>,
        idempotency_key: Option<&str>,
    ) -> AppResult<StripePaymentIntent> {
        let mut params: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), currency.to_lowercase()),
            ("customer".to_string(), customer_id.to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        push_metadata(&mut params, metadata);

        self.post_form("payment_intents", &params, idempotency_key)
            .await
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// The subscription stays `incomplete` until the first invoice is paid
    /// with the expanded payment intent's client secret.
    pub async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> AppResult<StripeSubscription> {
        let mut params: Vec<(String, String)> = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
            (
                "payment_behavior".to_string(),
                "default_incomplete".to_string(),
            ),
            (
                "payment_settings[save_default_payment_method]".to_string(),
                "on_subscription".to_string(),
            ),
            (
                "expand[]".to_string(),
                "latest_invoice.payment_intent".to_string(),
            ),
        ];
        push_metadata(&mut params, metadata);

        self.post_form("subscriptions", &params, None).await
    }

    // ========================================================================
    // Refunds
    // ========================================================================

    pub async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount_minor: Option<i64>,
        reason: Option<&str>,
    ) -> AppResult<StripeRefund> {
        let mut params: Vec<(String, String)> =
            vec![("payment_intent".to_string(), payment_intent_id.to_string())];

        if let Some(amt) = amount_minor {
            params.push(("amount".to_string(), amt.to_string()));
        }

        if let Some(r) = reason {
            params.push(("reason".to_string(), r.to_string()));
        }

        self.post_form("refunds", &params, None).await
    }

    // ========================================================================
    // Webhook Signature Verification
    // ========================================================================

    /// Checks a `t=<unix>,v1=<hex>` header against the raw payload. The
    /// timestamp must lie within `tolerance_secs` of `now`.
    pub fn verify_webhook_signature(
        payload: &str,
        signature_header: &str,
        webhook_secret: &str,
        tolerance_secs: i64,
        now: i64,
    ) -> AppResult<()> {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => timestamp = Some(value),
                "v1" => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| AppError::InvalidSignature("Missing timestamp in signature".into()))?;

        if signatures.is_empty() {
            return Err(AppError::InvalidSignature("Missing signature".into()));
        }

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| AppError::InvalidSignature("Invalid timestamp".into()))?;

        let signed_payload = format!("{}.{}", timestamp, payload);
        let mut mac = Hmac::<Sha256>::new_from_slice(webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal("HMAC error".into()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        if !signatures
            .iter()
            .any(|sig| constant_time_compare(sig, &expected))
        {
            return Err(AppError::InvalidSignature("Invalid signature".into()));
        }

        if (now - ts).abs() > tolerance_secs {
            return Err(AppError::InvalidSignature(
                "Timestamp outside tolerance".into(),
            ));
        }

        Ok(())
    }

    /// A delivery body holds either one event or an array of events.
    pub fn parse_webhook_events(payload: &str) -> AppResult<Vec<StripeWebhookEvent>> {
        let body: WebhookBody = serde_json::from_str(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook body");
            AppError::InvalidInput("Malformed webhook payload".into())
        })?;

        Ok(match body {
            WebhookBody::Batch(events) => events,
            WebhookBody::Single(event) => vec![event],
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> AppResult<T> {
        let mut request = self
            .client
            .post(format!("{}/{}", self.api_base, path))
            .header("Authorization", self.auth_header())
            .form(params);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(
                path,
                timeout = e.is_timeout(),
                error = %e,
                "Stripe request failed"
            );
            AppError::Upstream(format!("Stripe request to {} failed", path))
        })?;

        self.handle_response(path, response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::error!(path, error = %e, "Failed to read Stripe response");
            AppError::Upstream(format!("Failed to read Stripe response: {}", e))
        })?;

        if !status.is_success() {
            tracing::error!(path, status = %status, body = %body, "Stripe API error");

            if let Ok(error) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(AppError::Upstream(format!(
                    "Stripe error: {}",
                    error.error.message.unwrap_or(error.error.error_type)
                )));
            }

            return Err(AppError::Upstream(format!("Stripe API error: {}", status)));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(path, error = %e, "Failed to parse Stripe response");
            AppError::Upstream(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

fn push_metadata(params: &mut Vec<(String, String)>, metadata: &BTreeMap<String, String>) {
    for (key, value) in metadata {
        params.push((format!("metadata[{}]", key), value.clone()));
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

// ============================================================================
// Stripe Types
// ============================================================================

/// A field Stripe returns either as a bare id or, when expanded, as the object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

impl<T> Expandable<T> {
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Expandable::Id(_) => None,
            Expandable::Object(object) => Some(object),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: Option<String>,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub payment_intent: Option<Expandable<StripePaymentIntent>>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_end: Option<i64>,
    pub latest_invoice: Option<Expandable<StripeInvoice>>,
}

impl StripeSubscription {
    /// Client secret of the first invoice's payment intent, when expanded
    pub fn client_secret(&self) -> Option<&str> {
        self.latest_invoice
            .as_ref()?
            .as_object()?
            .payment_intent
            .as_ref()?
            .as_object()?
            .client_secret
            .as_deref()
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeRefund {
    pub id: String,
    pub amount: i64,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeError,
}

#[derive(Debug, Deserialize)]
pub struct StripeError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: Option<String>,
    pub code: Option<String>,
}

// ============================================================================
// Webhook Event Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created: Option<i64>,
    pub data: StripeWebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeWebhookEventData {
    pub object: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WebhookBody {
    Batch(Vec<StripeWebhookEvent>),
    Single(StripeWebhookEvent),
}
