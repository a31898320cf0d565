//! Admin API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use nwc_budget::{
    BudgetRepr, BudgetView, LimitChange, LimitUpdate, OutgoingPayment, SpendingLimit,
    WalletConnection,
};
use nwc_types::{ConnectionId, Currency, SpendingLimitFrequency, ValidationError};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const MAX_PAYMENTS_PAGE: usize = 500;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// `postgres` or `memory`
    pub storage: String,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (healthy, storage) = match &state.database {
        Some(db) => (db.health_check().await, "postgres"),
        None => (true, "memory"),
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage: storage.to_string(),
        }),
    )
}

/// Desired spending limit.
///
/// Either `budget` in short form (`"100.USD/weekly"`) or the individual
/// fields.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitRequest {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    /// Currency code
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub frequency: Option<SpendingLimitFrequency>,
}

fn default_enabled() -> bool {
    true
}

impl LimitRequest {
    fn into_update(self) -> Result<LimitUpdate, ValidationError> {
        if !self.enabled {
            return Ok(LimitUpdate::disable());
        }
        if let Some(budget) = self.budget {
            let repr = BudgetRepr::parse(&budget)?;
            return Ok(LimitUpdate::enable(repr.amount, repr.currency, repr.frequency));
        }
        Ok(LimitUpdate {
            enabled: true,
            amount: self.amount,
            currency: self.currency.as_deref().map(Currency::from_code).transpose()?,
            frequency: self.frequency,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateConnectionRequest {
    /// Currency code, SAT when omitted
    #[serde(default)]
    pub budget_currency: Option<String>,
    #[serde(default)]
    pub vasp_access_token: Option<String>,
    #[serde(default)]
    pub limit: Option<LimitRequest>,
}

pub async fn create_connection(
    State(state): State<AppState>,
    Json(request): Json<CreateConnectionRequest>,
) -> ApiResult<(StatusCode, Json<WalletConnection>)> {
    let budget_currency = match request.budget_currency.as_deref() {
        Some(code) => Currency::from_code(code)?,
        None => Currency::sat(),
    };
    let initial_limit = request.limit.map(LimitRequest::into_update).transpose()?;

    let connection = state
        .budget
        .create_connection(budget_currency, request.vasp_access_token, initial_limit, Utc::now())
        .await?;
    tracing::info!(connection_id = %connection.id, "Connection created");

    Ok((StatusCode::CREATED, Json(connection)))
}

pub async fn get_budget(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BudgetView>> {
    let connection = state.budget.connection(&parse_connection_id(&id)?).await?;
    let converter = state.converters.converter(&connection);
    let view = state
        .budget
        .get_budget_view(converter.as_ref(), &connection)
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Serialize)]
pub struct LimitChangeResponse {
    /// created, replaced, amount_changed, disabled or unchanged
    pub change: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<SpendingLimit>,
    /// Limit ended by this change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<SpendingLimit>,
}

impl From<LimitChange> for LimitChangeResponse {
    fn from(change: LimitChange) -> Self {
        let (name, limit, previous) = match change {
            LimitChange::Unchanged => ("unchanged", None, None),
            LimitChange::Created(limit) => ("created", Some(limit), None),
            LimitChange::Replaced { previous, current } => ("replaced", Some(current), Some(previous)),
            LimitChange::AmountChanged(limit) => ("amount_changed", Some(limit), None),
            LimitChange::Disabled(previous) => ("disabled", None, previous),
        };
        Self {
            change: name,
            limit,
            previous,
        }
    }
}

pub async fn update_limit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<LimitRequest>,
) -> ApiResult<Json<LimitChangeResponse>> {
    let connection_id = parse_connection_id(&id)?;
    let update = request.into_update()?;
    let change = state
        .budget
        .update_limit(&connection_id, update, Utc::now())
        .await?;
    Ok(Json(change.into()))
}

pub async fn disable_limit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<LimitChangeResponse>> {
    let connection_id = parse_connection_id(&id)?;
    let change = state
        .budget
        .update_limit(&connection_id, LimitUpdate::disable(), Utc::now())
        .await?;
    Ok(Json(change.into()))
}

pub async fn list_limits(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<SpendingLimit>>> {
    let limits = state.budget.limit_history(&parse_connection_id(&id)?).await?;
    Ok(Json(limits))
}

#[derive(Debug, Deserialize)]
pub struct PaymentsQuery {
    #[serde(default = "default_page_size")]
    pub limit: usize,
}

fn default_page_size() -> usize {
    50
}

pub async fn list_payments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PaymentsQuery>,
) -> ApiResult<Json<Vec<OutgoingPayment>>> {
    let payments = state
        .budget
        .payments_for_connection(&parse_connection_id(&id)?, query.limit.min(MAX_PAYMENTS_PAGE))
        .await?;
    Ok(Json(payments))
}

fn parse_connection_id(id: &str) -> ApiResult<ConnectionId> {
    ConnectionId::parse(id).map_err(|e| ApiError::BadRequest(format!("invalid connection id '{}': {}", id, e)))
}
