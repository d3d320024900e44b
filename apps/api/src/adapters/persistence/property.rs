use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::AppResult,
    application::use_cases::ledger::PropertyRepo,
    domain::entities::property::Property,
};

fn row_to_property(row: PgRow) -> Property {
    Property {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        manager_id: row.get("manager_id"),
        name: row.get("name"),
        status: row.get("status"),
        current_tenants: row.get("current_tenants"),
        max_tenants: row.get("max_tenants"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl PropertyRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Property>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, manager_id, name, status, current_tenants, max_tenants,
                   created_at, updated_at
            FROM properties
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_property))
    }

    async fn apply_occupancy_once(&self, payment_id: Uuid, property_id: Uuid) -> AppResult<bool> {
        // The marker claim and the increment run as one statement. A concurrent
        // second claim waits on the payment row lock, then sees the marker set.
        let row = sqlx::query(
            r#"
            WITH claimed AS (
                UPDATE payments
                SET occupancy_applied_at = NOW()
                WHERE id = $1
                  AND occupancy_applied_at IS NULL
                  AND EXISTS (SELECT 1 FROM properties WHERE id = $2)
                RETURNING id
            )
            UPDATE properties
            SET current_tenants = current_tenants + 1,
                status = 'occupied',
                updated_at = NOW()
            WHERE id = $2 AND EXISTS (SELECT 1 FROM claimed)
            RETURNING id
            "#,
        )
        .bind(payment_id)
        .bind(property_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }
}
