use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::{AccessClaims, JwtError};

/// Verifies an HS256 access token and returns its claims.
///
/// # Arguments
/// * `token` - The raw bearer token
/// * `secret` - Shared signing secret
/// * `clock_skew_seconds` - Tolerance for clock skew (typically 60 seconds)
pub fn verify_access_token(
    token: &str,
    secret: &str,
    clock_skew_seconds: u64,
) -> Result<AccessClaims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = clock_skew_seconds;

    let token_data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}

/// Signs claims into an HS256 access token.
pub fn issue_access_token(claims: &AccessClaims, secret: &str) -> Result<String, JwtError> {
    let token = encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}
