use serde::{Deserialize, Serialize};

/// What a payment is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Rent,
    SecurityDeposit,
    LateFee,
    Maintenance,
    Subscription,
    Other,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Rent => "rent",
            PaymentKind::SecurityDeposit => "security_deposit",
            PaymentKind::LateFee => "late_fee",
            PaymentKind::Maintenance => "maintenance",
            PaymentKind::Subscription => "subscription",
            PaymentKind::Other => "other",
        }
    }

    /// Only rent accrues a late fee
    pub fn accrues_late_fee(&self) -> bool {
        matches!(self, PaymentKind::Rent)
    }
}

impl std::fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rent" => Ok(PaymentKind::Rent),
            "security_deposit" => Ok(PaymentKind::SecurityDeposit),
            "late_fee" => Ok(PaymentKind::LateFee),
            "maintenance" => Ok(PaymentKind::Maintenance),
            "subscription" => Ok(PaymentKind::Subscription),
            "other" => Ok(PaymentKind::Other),
            _ => Err(format!("Invalid payment kind: {}", s)),
        }
    }
}

/// How the money moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Stripe,
    BankTransfer,
    Check,
    Cash,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Check => "check",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Other => "other",
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Stripe
    }
}
