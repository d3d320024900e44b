use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::ledger::{CreatePaymentInput, PaymentKey, PaymentRepo},
    domain::entities::payment::{Payment, PaymentTransition, TransitionOutcome, failure_note},
};

const SELECT_COLS: &str = r#"
    id, tenant_id, landlord_id, property_id, amount, amount_refunded, currency, kind, status, method,
    description, notes, due_date, paid_at, refunded_at, recurring, recurring_group_id,
    gateway_payment_intent_id, gateway_charge_id, gateway_invoice_id,
    gateway_subscription_id, gateway_customer_id, occupancy_applied_at,
    created_at, updated_at
"#;

/// Appends `$n` as a new line of `notes` when `$n` is not null
fn append_note_sql(param: usize) -> String {
    format!(
        "notes = CASE WHEN ${p}::text IS NULL THEN notes \
         WHEN notes IS NULL OR notes = '' THEN ${p} \
         ELSE notes || E'\\n' || ${p} END",
        p = param
    )
}

fn key_clause(key: &PaymentKey<'_>) -> &'static str {
    match key {
        PaymentKey::Id(_) => "id = $1",
        // Invoice rows may share an intent id; only the orchestrator's row is addressed
        PaymentKey::PaymentIntent(_) => {
            "gateway_payment_intent_id = $1 AND gateway_invoice_id IS NULL"
        }
    }
}

fn row_to_payment(row: PgRow) -> Payment {
    Payment {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        landlord_id: row.get("landlord_id"),
        property_id: row.get("property_id"),
        amount: row.get("amount"),
        amount_refunded: row.get("amount_refunded"),
        currency: row.get("currency"),
        kind: row.get("kind"),
        status: row.get("status"),
        method: row.get("method"),
        description: row.get("description"),
        notes: row.get("notes"),
        due_date: row.get("due_date"),
        paid_at: row.get("paid_at"),
        refunded_at: row.get("refunded_at"),
        recurring: row.get("recurring"),
        recurring_group_id: row.get("recurring_group_id"),
        gateway_payment_intent_id: row.get("gateway_payment_intent_id"),
        gateway_charge_id: row.get("gateway_charge_id"),
        gateway_invoice_id: row.get("gateway_invoice_id"),
        gateway_subscription_id: row.get("gateway_subscription_id"),
        gateway_customer_id: row.get("gateway_customer_id"),
        occupancy_applied_at: row.get("occupancy_applied_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl PostgresPersistence {
    async fn insert_payment(
        &self,
        input: &CreatePaymentInput,
        on_conflict: &str,
    ) -> AppResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payments (
                id, tenant_id, landlord_id, property_id, amount, currency, kind, status,
                method, description, notes, due_date, paid_at, gateway_payment_intent_id,
                gateway_invoice_id, gateway_subscription_id, gateway_customer_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            {on_conflict}
            RETURNING {SELECT_COLS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.tenant_id)
        .bind(input.landlord_id)
        .bind(input.property_id)
        .bind(input.amount)
        .bind(&input.currency)
        .bind(input.kind)
        .bind(input.status)
        .bind(input.method)
        .bind(&input.description)
        .bind(&input.notes)
        .bind(input.due_date)
        .bind(input.paid_at)
        .bind(&input.gateway_payment_intent_id)
        .bind(&input.gateway_invoice_id)
        .bind(&input.gateway_subscription_id)
        .bind(&input.gateway_customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_payment))
    }

    async fn find_by_key(&self, key: &PaymentKey<'_>) -> AppResult<Option<Payment>> {
        let sql = format!(
            "SELECT {SELECT_COLS} FROM payments WHERE {}",
            key_clause(key)
        );
        let query = sqlx::query(&sql);
        let query = match key {
            PaymentKey::Id(id) => query.bind(*id),
            PaymentKey::PaymentIntent(intent_id) => query.bind(*intent_id),
        };

        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(row_to_payment))
    }
}

#[async_trait]
impl PaymentRepo for PostgresPersistence {
    async fn create(&self, input: &CreatePaymentInput) -> AppResult<Payment> {
        self.insert_payment(input, "")
            .await?
            .ok_or_else(|| AppError::Internal("Payment insert returned no row".into()))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Payment>> {
        self.find_by_key(&PaymentKey::Id(id)).await
    }

    async fn attach_gateway_ids(
        &self,
        id: Uuid,
        payment_intent_id: &str,
        customer_id: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET gateway_payment_intent_id = $2,
                gateway_customer_id = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(payment_intent_id)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn apply_transition(
        &self,
        key: PaymentKey<'_>,
        transition: &PaymentTransition,
    ) -> AppResult<TransitionOutcome> {
        // $1 key, $2 target status, $3 required current status, then per-transition values
        let (set_clause, guard) = match transition {
            PaymentTransition::Complete { .. } => (
                "status = $2, paid_at = $4, \
                 amount = COALESCE($5, amount), \
                 gateway_customer_id = COALESCE($6, gateway_customer_id), \
                 gateway_charge_id = COALESCE($7, gateway_charge_id)"
                    .to_string(),
                "",
            ),
            PaymentTransition::Fail { .. } => (format!("status = $2, {}", append_note_sql(4)), ""),
            // Totals only grow; the row leaves completed once they cover the amount
            PaymentTransition::Refund { .. } => (
                format!(
                    "amount_refunded = $4, \
                     status = CASE WHEN $4 >= amount THEN $2 ELSE status END, \
                     paid_at = CASE WHEN $4 >= amount THEN NULL ELSE paid_at END, \
                     refunded_at = CASE WHEN $4 >= amount THEN $5 ELSE refunded_at END, \
                     {}",
                    append_note_sql(6)
                ),
                " AND amount_refunded < $4",
            ),
        };

        let sql = format!(
            r#"
            UPDATE payments
            SET {set_clause}, updated_at = NOW()
            WHERE {} AND status = $3{guard}
            RETURNING {SELECT_COLS}
            "#,
            key_clause(&key)
        );

        let query = sqlx::query(&sql);
        let query = match key {
            PaymentKey::Id(id) => query.bind(id),
            PaymentKey::PaymentIntent(intent_id) => query.bind(intent_id),
        }
        .bind(transition.to_status())
        .bind(transition.from_status());

        let query = match transition {
            PaymentTransition::Complete {
                paid_at,
                amount,
                customer_id,
                charge_id,
            } => query
                .bind(*paid_at)
                .bind(*amount)
                .bind(customer_id.clone())
                .bind(charge_id.clone()),
            PaymentTransition::Fail { reason } => {
                query.bind(failure_note(reason))
            }
            PaymentTransition::Refund {
                refunded_at,
                total_refunded,
                note,
            } => query
                .bind(*total_refunded)
                .bind(*refunded_at)
                .bind(note.clone()),
        };

        if let Some(row) = query.fetch_optional(&self.pool).await? {
            return Ok(TransitionOutcome::Applied(row_to_payment(row)));
        }

        Ok(match self.find_by_key(&key).await? {
            Some(current) => TransitionOutcome::Unchanged(current),
            None => TransitionOutcome::NotFound,
        })
    }

    async fn record_invoice_payment(
        &self,
        input: &CreatePaymentInput,
    ) -> AppResult<Option<Payment>> {
        self.insert_payment(
            input,
            "ON CONFLICT (gateway_invoice_id, status) WHERE gateway_invoice_id IS NOT NULL DO NOTHING",
        )
        .await
    }
}
