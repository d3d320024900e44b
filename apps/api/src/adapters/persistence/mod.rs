use sqlx::PgPool;

use crate::app_error::AppError;

pub mod payment;
pub mod processed_event;
pub mod property;
pub mod user;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Decodes a Postgres enum selected as text through its `FromStr` impl
fn parse_text_enum<T>(value: &str, column: &str) -> Result<T, AppError>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse().map_err(|e: String| {
        tracing::error!(column, value, error = %e, "Unexpected enum value in database");
        AppError::Database("Database operation failed".into())
    })
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                // PostgreSQL unique violation
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    AppError::InvalidInput("A record with this value already exists".into())
                }
                // PostgreSQL foreign key violation
                else if msg.contains("foreign key") || msg.contains("violates foreign key") {
                    AppError::InvalidInput("Referenced record not found".into())
                }
                // PostgreSQL check violation, e.g. a non-positive amount
                else if msg.contains("violates check constraint") {
                    AppError::InvalidInput("Value violates a ledger constraint".into())
                } else {
                    tracing::error!(error = ?err, "Database error");
                    AppError::Database("Database operation failed".into())
                }
            }
            _ => {
                tracing::error!(error = ?err, "Database error");
                AppError::Database("Database operation failed".into())
            }
        }
    }
}
