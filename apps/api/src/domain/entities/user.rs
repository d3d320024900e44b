use chrono::{DateTime, Utc};
use rentflow_types::UserRole;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FREE_PLAN: &str = "free";

/// Plan assumed when the gateway reports a new subscription without one
pub const DEFAULT_PAID_PLAN: &str = "professional";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    #[default]
    Inactive,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    /// Folds the gateway's subscription statuses into the three local ones
    pub fn from_gateway(s: &str) -> Self {
        match s {
            "active" | "trialing" => SubscriptionStatus::Active,
            "canceled" | "incomplete_expired" => SubscriptionStatus::Cancelled,
            _ => SubscriptionStatus::Inactive,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription fields embedded in the user record
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionState {
    pub plan: String,
    pub status: SubscriptionStatus,
    pub gateway_subscription_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl Default for SubscriptionState {
    fn default() -> Self {
        Self {
            plan: FREE_PLAN.to_string(),
            status: SubscriptionStatus::default(),
            gateway_subscription_id: None,
            current_period_end: None,
        }
    }
}

impl SubscriptionState {
    /// A subscription id must be known before the status can leave inactive
    pub fn is_consistent(&self) -> bool {
        self.status == SubscriptionStatus::Inactive || self.gateway_subscription_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    /// At most one per user, written once
    pub gateway_customer_id: Option<String>,
    pub subscription: SubscriptionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> Option<String> {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(name), None) | (None, Some(name)) => Some(name.to_string()),
            (None, None) => None,
        }
    }
}
