//! Shared types for Rentflow services.
//!
//! This crate provides:
//! - Access-token claims (`AccessClaims`) and the `UserRole` enum
//! - API error codes returned in error bodies
//! - Access-token issuing and verification primitives
//! - Metadata keys attached to payment gateway objects

mod claims;
mod errors;
mod metadata;
mod token;

pub use claims::{AccessClaims, UserRole};
pub use errors::{ErrorCode, JwtError};
pub use metadata::keys as metadata_keys;
pub use token::{issue_access_token, verify_access_token};
