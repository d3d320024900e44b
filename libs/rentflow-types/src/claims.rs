use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of an account holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Landlord,
    Tenant,
    Manager,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Landlord => "landlord",
            UserRole::Tenant => "tenant",
            UserRole::Manager => "manager",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "landlord" => Ok(UserRole::Landlord),
            "tenant" => Ok(UserRole::Tenant),
            "manager" => Ok(UserRole::Manager),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Claims carried by a bearer access token.
///
/// Field names follow the token layout used by the web app that issues
/// them (`userId`, `email`, `role`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Account id of the caller
    #[serde(rename = "userId")]
    pub user_id: Uuid,

    pub email: String,

    pub role: UserRole,

    #[serde(rename = "firstName", default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(rename = "lastName", default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    /// Token issued at (Unix timestamp)
    pub iat: i64,

    /// Token expiration (Unix timestamp)
    pub exp: i64,
}
