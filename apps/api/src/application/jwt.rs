use rentflow_types::{UserRole, verify_access_token};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

/// The authenticated caller of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn is_manager(&self) -> bool {
        self.role == UserRole::Manager
    }
}

/// Turns a bearer token into an actor. `None` means unauthenticated.
pub trait AccessVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Option<Actor>;
}

pub struct JwtAccessVerifier {
    secret: SecretString,
    leeway_seconds: u64,
}

impl JwtAccessVerifier {
    pub fn new(secret: SecretString, leeway_seconds: u64) -> Self {
        Self {
            secret,
            leeway_seconds,
        }
    }
}

impl AccessVerifier for JwtAccessVerifier {
    fn verify(&self, token: &str) -> Option<Actor> {
        match verify_access_token(token, self.secret.expose_secret(), self.leeway_seconds) {
            Ok(claims) => Some(Actor {
                user_id: claims.user_id,
                role: claims.role,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected access token");
                None
            }
        }
    }
}
