//! Database models - mapped from PostgreSQL tables

use chrono::{DateTime, Utc};
use nwc_budget::{OutgoingPayment, SpendingCycle, SpendingLimit, WalletConnection};
use nwc_types::{
    ConnectionId, Currency, PaymentId, QuoteId, RequestId, SpendingCycleId, SpendingLimitId,
};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, Clone, FromRow)]
pub struct DbWalletConnection {
    pub id: Uuid,
    pub budget_currency: Json<Currency>,
    pub spending_limit_id: Option<Uuid>,
    pub vasp_access_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DbWalletConnection> for WalletConnection {
    fn from(row: DbWalletConnection) -> Self {
        Self {
            id: ConnectionId(row.id),
            budget_currency: row.budget_currency.0,
            spending_limit_id: row.spending_limit_id.map(SpendingLimitId),
            vasp_access_token: row.vasp_access_token,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbSpendingLimit {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub currency: Json<Currency>,
    pub amount: i64,
    pub frequency: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl TryFrom<DbSpendingLimit> for SpendingLimit {
    type Error = DbError;

    fn try_from(row: DbSpendingLimit) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SpendingLimitId(row.id),
            connection_id: ConnectionId(row.connection_id),
            currency: row.currency.0,
            amount: row.amount,
            frequency: row
                .frequency
                .parse()
                .map_err(|e| DbError::Corrupt(format!("spending limit {}: {}", row.id, e)))?,
            start_time: row.start_time,
            end_time: row.end_time,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbSpendingCycle {
    pub id: Uuid,
    pub spending_limit_id: Uuid,
    pub limit_currency: Json<Currency>,
    pub limit_amount: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_spent: i64,
    pub total_spent_on_hold: i64,
}

impl From<DbSpendingCycle> for SpendingCycle {
    fn from(row: DbSpendingCycle) -> Self {
        SpendingCycle::restore(
            SpendingCycleId(row.id),
            SpendingLimitId(row.spending_limit_id),
            row.limit_currency.0,
            row.limit_amount,
            row.start_time,
            row.end_time,
            row.total_spent,
            row.total_spent_on_hold,
        )
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbOutgoingPayment {
    pub id: Uuid,
    pub request_id: Uuid,
    pub connection_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub receiver: String,
    pub receiver_type: String,
    pub sending_currency: Json<Currency>,
    pub sending_amount: i64,
    pub status: String,
    pub spending_cycle_id: Option<Uuid>,
    pub budget_currency: Option<Json<Currency>>,
    pub estimated_budget_amount: Option<i64>,
    pub budget_on_hold: Option<i64>,
    pub settled_budget_amount: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbOutgoingPayment> for OutgoingPayment {
    type Error = DbError;

    fn try_from(row: DbOutgoingPayment) -> Result<Self, Self::Error> {
        let corrupt = |e: nwc_types::ValidationError| DbError::Corrupt(format!("payment {}: {}", row.id, e));
        Ok(Self {
            id: PaymentId(row.id),
            request_id: RequestId(row.request_id),
            connection_id: ConnectionId(row.connection_id),
            quote_id: row.quote_id.map(QuoteId),
            receiver_type: row.receiver_type.parse().map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            receiver: row.receiver,
            sending_currency: row.sending_currency.0,
            sending_amount: row.sending_amount,
            spending_cycle_id: row.spending_cycle_id.map(SpendingCycleId),
            budget_currency: row.budget_currency.map(|c| c.0),
            estimated_budget_amount: row.estimated_budget_amount,
            budget_on_hold: row.budget_on_hold,
            settled_budget_amount: row.settled_budget_amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
