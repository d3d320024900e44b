use rust_decimal::Decimal;
use validator::ValidationError;

/// Three ASCII letters, e.g. `usd`. Case is normalised by the caller.
pub fn is_valid_currency(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// Gateway price ids look like `price_1NfXyz...`
pub fn is_valid_price_id(price_id: &str) -> bool {
    let Some(rest) = price_id.strip_prefix("price_") else {
        return false;
    };
    !rest.is_empty() && rest.len() <= 250 && rest.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Validates a plan code for URL-friendly characters.
/// Rules:
/// - 1-50 characters
/// - Only lowercase ASCII letters, numbers, hyphens, underscores
/// - Must start with a letter or number
pub fn is_valid_plan_code(code: &str) -> bool {
    if code.is_empty() || code.len() > 50 {
        return false;
    }

    let Some(first) = code.chars().next() else {
        return false;
    };
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return false;
    }

    code.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

pub fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        Ok(())
    } else {
        Err(ValidationError::new("amount_not_positive")
            .with_message("amount must be greater than zero".into()))
    }
}

pub fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if is_valid_currency(currency) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_currency")
            .with_message("currency must be a three-letter code".into()))
    }
}

pub fn validate_price_id(price_id: &str) -> Result<(), ValidationError> {
    if is_valid_price_id(price_id) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_price_id").with_message("priceId is not valid".into()))
    }
}

pub fn validate_plan_code(plan: &str) -> Result<(), ValidationError> {
    if is_valid_plan_code(plan) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_plan").with_message("plan is not valid".into()))
    }
}
