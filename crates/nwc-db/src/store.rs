//! PostgreSQL implementation of the budget store
//!
//! Cycle locks are `SELECT ... FOR UPDATE` inside a transaction that lives
//! in the lock guard. Committing the guard writes the cycle and the payment
//! in that same transaction; dropping it rolls both back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nwc_budget::{
    BudgetStore, CycleLock, OutgoingPayment, SpendingCycle, SpendingLimit, StoreError, StoreResult,
    WalletConnection,
};
use nwc_types::{ConnectionId, PaymentId, SpendingCycleId, SpendingLimitId};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::models::{DbOutgoingPayment, DbSpendingCycle, DbSpendingLimit, DbWalletConnection};

const CONNECTION_COLUMNS: &str =
    "id, budget_currency, spending_limit_id, vasp_access_token, created_at";

const LIMIT_COLUMNS: &str = "id, connection_id, currency, amount, frequency, start_time, end_time";

const CYCLE_COLUMNS: &str = "id, spending_limit_id, limit_currency, limit_amount, start_time, \
     end_time, total_spent, total_spent_on_hold";

const PAYMENT_COLUMNS: &str = "id, request_id, connection_id, quote_id, receiver, receiver_type, \
     sending_currency, sending_amount, status, spending_cycle_id, budget_currency, \
     estimated_budget_amount, budget_on_hold, settled_budget_amount, created_at, updated_at";

/// Budget store backed by PostgreSQL
#[derive(Clone)]
pub struct PgBudgetStore {
    pool: PgPool,
}

impl PgBudgetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_cycle(&self, sql: &str, binds: CycleQuery) -> DbResult<Option<SpendingCycle>> {
        let query = sqlx::query_as::<_, DbSpendingCycle>(sql);
        let query = match binds {
            CycleQuery::Id(id) => query.bind(id),
            CycleQuery::Limit(limit_id) => query.bind(limit_id),
            CycleQuery::LimitStart(limit_id, start) => query.bind(limit_id).bind(start),
        };
        Ok(query.fetch_optional(&self.pool).await?.map(SpendingCycle::from))
    }
}

enum CycleQuery {
    Id(uuid::Uuid),
    Limit(uuid::Uuid),
    LimitStart(uuid::Uuid, DateTime<Utc>),
}

#[async_trait]
impl BudgetStore for PgBudgetStore {
    async fn connection(&self, id: &ConnectionId) -> StoreResult<Option<WalletConnection>> {
        let row = sqlx::query_as::<_, DbWalletConnection>(&format!(
            "SELECT {} FROM wallet_connections WHERE id = $1",
            CONNECTION_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(row.map(WalletConnection::from))
    }

    async fn save_connection(&self, connection: &WalletConnection) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_connections (id, budget_currency, spending_limit_id, vasp_access_token, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                budget_currency = EXCLUDED.budget_currency,
                spending_limit_id = EXCLUDED.spending_limit_id,
                vasp_access_token = EXCLUDED.vasp_access_token
            "#,
        )
        .bind(connection.id.0)
        .bind(Json(&connection.budget_currency))
        .bind(connection.spending_limit_id.map(|id| id.0))
        .bind(&connection.vasp_access_token)
        .bind(connection.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(())
    }

    async fn insert_limit(&self, limit: &SpendingLimit) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO spending_limits (id, connection_id, currency, amount, frequency, start_time, end_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(limit.id.0)
        .bind(limit.connection_id.0)
        .bind(Json(&limit.currency))
        .bind(limit.amount)
        .bind(limit.frequency.as_str())
        .bind(limit.start_time)
        .bind(limit.end_time)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(())
    }

    async fn update_limit(&self, limit: &SpendingLimit) -> StoreResult<()> {
        let result = sqlx::query("UPDATE spending_limits SET amount = $2, end_time = $3 WHERE id = $1")
            .bind(limit.id.0)
            .bind(limit.amount)
            .bind(limit.end_time)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("spending limit {}", limit.id)));
        }
        Ok(())
    }

    async fn limit(&self, id: &SpendingLimitId) -> StoreResult<Option<SpendingLimit>> {
        let row = sqlx::query_as::<_, DbSpendingLimit>(&format!(
            "SELECT {} FROM spending_limits WHERE id = $1",
            LIMIT_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(row.map(SpendingLimit::try_from).transpose()?)
    }

    async fn limits_for_connection(&self, id: &ConnectionId) -> StoreResult<Vec<SpendingLimit>> {
        let rows = sqlx::query_as::<_, DbSpendingLimit>(&format!(
            "SELECT {} FROM spending_limits WHERE connection_id = $1 ORDER BY start_time DESC",
            LIMIT_COLUMNS
        ))
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(SpendingLimit::try_from)
            .collect::<DbResult<Vec<_>>>()?)
    }

    async fn latest_cycle(&self, limit_id: &SpendingLimitId) -> StoreResult<Option<SpendingCycle>> {
        let sql = format!(
            "SELECT {} FROM spending_cycles WHERE spending_limit_id = $1 ORDER BY start_time DESC LIMIT 1",
            CYCLE_COLUMNS
        );
        Ok(self.fetch_cycle(&sql, CycleQuery::Limit(limit_id.0)).await?)
    }

    async fn cycle_starting_at(
        &self,
        limit_id: &SpendingLimitId,
        start_time: DateTime<Utc>,
    ) -> StoreResult<Option<SpendingCycle>> {
        let sql = format!(
            "SELECT {} FROM spending_cycles WHERE spending_limit_id = $1 AND start_time = $2",
            CYCLE_COLUMNS
        );
        Ok(self
            .fetch_cycle(&sql, CycleQuery::LimitStart(limit_id.0, start_time))
            .await?)
    }

    async fn cycle(&self, id: &SpendingCycleId) -> StoreResult<Option<SpendingCycle>> {
        let sql = format!("SELECT {} FROM spending_cycles WHERE id = $1", CYCLE_COLUMNS);
        Ok(self.fetch_cycle(&sql, CycleQuery::Id(id.0)).await?)
    }

    async fn insert_cycle(&self, cycle: &SpendingCycle) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO spending_cycles
                (id, spending_limit_id, limit_currency, limit_amount, start_time, end_time, total_spent, total_spent_on_hold)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(cycle.id.0)
        .bind(cycle.spending_limit_id.0)
        .bind(Json(&cycle.limit_currency))
        .bind(cycle.limit_amount())
        .bind(cycle.start_time)
        .bind(cycle.end_time())
        .bind(cycle.total_spent())
        .bind(cycle.total_spent_on_hold())
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(())
    }

    async fn lock_cycle(&self, id: &SpendingCycleId) -> StoreResult<Box<dyn CycleLock>> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let row = sqlx::query_as::<_, DbSpendingCycle>(&format!(
            "SELECT {} FROM spending_cycles WHERE id = $1 FOR UPDATE",
            CYCLE_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DbError::from)?
        .ok_or_else(|| StoreError::NotFound(format!("spending cycle {}", id)))?;

        debug!(cycle_id = %id, "Spending cycle locked");
        Ok(Box::new(PgCycleLock {
            tx,
            cycle: row.into(),
        }))
    }

    async fn insert_payment(&self, payment: &OutgoingPayment) -> StoreResult<()> {
        write_payment(&self.pool, payment, PaymentWrite::Insert).await?;
        Ok(())
    }

    async fn payment(&self, id: &PaymentId) -> StoreResult<Option<OutgoingPayment>> {
        let row = sqlx::query_as::<_, DbOutgoingPayment>(&format!(
            "SELECT {} FROM outgoing_payments WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(row.map(OutgoingPayment::try_from).transpose()?)
    }

    async fn complete_unbudgeted_payment(&self, payment: &OutgoingPayment) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE outgoing_payments
            SET status = $2, settled_budget_amount = $3, updated_at = $4
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(payment.id.0)
        .bind(payment.status.as_str())
        .bind(payment.settled_budget_amount)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn payments_for_connection(
        &self,
        id: &ConnectionId,
        limit: usize,
    ) -> StoreResult<Vec<OutgoingPayment>> {
        let rows = sqlx::query_as::<_, DbOutgoingPayment>(&format!(
            "SELECT {} FROM outgoing_payments WHERE connection_id = $1 ORDER BY created_at DESC LIMIT $2",
            PAYMENT_COLUMNS
        ))
        .bind(id.0)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(OutgoingPayment::try_from)
            .collect::<DbResult<Vec<_>>>()?)
    }
}

/// Row lock on one spending cycle
struct PgCycleLock {
    tx: Transaction<'static, Postgres>,
    cycle: SpendingCycle,
}

#[async_trait]
impl CycleLock for PgCycleLock {
    fn cycle(&self) -> &SpendingCycle {
        &self.cycle
    }

    fn cycle_mut(&mut self) -> &mut SpendingCycle {
        &mut self.cycle
    }

    async fn payment(&mut self, id: &PaymentId) -> StoreResult<Option<OutgoingPayment>> {
        let row = sqlx::query_as::<_, DbOutgoingPayment>(&format!(
            "SELECT {} FROM outgoing_payments WHERE id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        Ok(row.map(OutgoingPayment::try_from).transpose()?)
    }

    async fn commit(self: Box<Self>, payment: Option<&OutgoingPayment>) -> StoreResult<()> {
        let PgCycleLock { mut tx, cycle } = *self;

        sqlx::query(
            r#"
            UPDATE spending_cycles
            SET limit_amount = $2, end_time = $3, total_spent = $4, total_spent_on_hold = $5
            WHERE id = $1
            "#,
        )
        .bind(cycle.id.0)
        .bind(cycle.limit_amount())
        .bind(cycle.end_time())
        .bind(cycle.total_spent())
        .bind(cycle.total_spent_on_hold())
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if let Some(payment) = payment {
            write_payment(&mut *tx, payment, PaymentWrite::Upsert).await?;
        }

        tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }
}

enum PaymentWrite {
    /// Fail on an existing id
    Insert,
    /// Overwrite the status and settlement of an existing id
    Upsert,
}

async fn write_payment<'e, E>(executor: E, payment: &OutgoingPayment, mode: PaymentWrite) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let on_conflict = match mode {
        PaymentWrite::Insert => "",
        PaymentWrite::Upsert => {
            "ON CONFLICT (id) DO UPDATE SET \
             status = EXCLUDED.status, \
             settled_budget_amount = EXCLUDED.settled_budget_amount, \
             updated_at = EXCLUDED.updated_at"
        }
    };
    let sql = format!(
        r#"
        INSERT INTO outgoing_payments
            (id, request_id, connection_id, quote_id, receiver, receiver_type, sending_currency,
             sending_amount, status, spending_cycle_id, budget_currency, estimated_budget_amount,
             budget_on_hold, settled_budget_amount, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        {}
        "#,
        on_conflict
    );

    sqlx::query(&sql)
        .bind(payment.id.0)
        .bind(payment.request_id.0)
        .bind(payment.connection_id.0)
        .bind(payment.quote_id.map(|id| id.0))
        .bind(&payment.receiver)
        .bind(payment.receiver_type.as_str())
        .bind(Json(&payment.sending_currency))
        .bind(payment.sending_amount)
        .bind(payment.status.as_str())
        .bind(payment.spending_cycle_id.map(|id| id.0))
        .bind(payment.budget_currency.as_ref().map(Json))
        .bind(payment.estimated_budget_amount)
        .bind(payment.budget_on_hold)
        .bind(payment.settled_budget_amount)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(executor)
        .await?;

    Ok(())
}
