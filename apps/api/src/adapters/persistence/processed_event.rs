use async_trait::async_trait;

use crate::{
    adapters::persistence::PostgresPersistence, app_error::AppResult,
    application::use_cases::ledger::ProcessedEventRepo,
};

#[async_trait]
impl ProcessedEventRepo for PostgresPersistence {
    async fn claim(&self, event_id: &str, event_type: &str) -> AppResult<bool> {
        let claimed = sqlx::query(
            r#"
            INSERT INTO processed_gateway_events (event_id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO NOTHING
            RETURNING event_id
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(claimed.is_some())
    }

    async fn release(&self, event_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM processed_gateway_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
