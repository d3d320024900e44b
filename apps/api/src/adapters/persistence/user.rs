use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_text_enum},
    app_error::{AppError, AppResult},
    application::use_cases::ledger::{BillingUserRepo, SubscriptionUpdate},
    domain::entities::user::{SubscriptionState, User},
};

const SELECT_COLS: &str = r#"
    id, email, first_name, last_name, role::text AS role, gateway_customer_id,
    subscription_plan, subscription_status, gateway_subscription_id, current_period_end,
    created_at, updated_at
"#;

fn row_to_user(row: PgRow) -> AppResult<User> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        role: parse_text_enum(&role, "role")?,
        gateway_customer_id: row.get("gateway_customer_id"),
        subscription: SubscriptionState {
            plan: row.get("subscription_plan"),
            status: row.get("subscription_status"),
            gateway_subscription_id: row.get("gateway_subscription_id"),
            current_period_end: row.get("current_period_end"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl BillingUserRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_user).transpose()
    }

    async fn get_by_gateway_customer_id(&self, customer_id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLS} FROM users WHERE gateway_customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_user).transpose()
    }

    async fn set_gateway_customer_id_if_absent(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> AppResult<String> {
        let stored: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET gateway_customer_id = COALESCE(gateway_customer_id, $2),
                updated_at = NOW()
            WHERE id = $1
            RETURNING gateway_customer_id
            "#,
        )
        .bind(user_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?
        .flatten();

        stored.ok_or(AppError::NotFound)
    }

    async fn apply_subscription_update(
        &self,
        user_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET gateway_subscription_id = $2,
                subscription_status = $3,
                subscription_plan = COALESCE($4, subscription_plan),
                current_period_end = COALESCE($5, current_period_end),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(&update.gateway_subscription_id)
        .bind(update.status)
        .bind(&update.plan)
        .bind(update.current_period_end)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
