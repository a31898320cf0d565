//! Connection setup and spending limit changes

use chrono::{DateTime, Utc};
use nwc_types::{ConnectionId, Currency, SpendingLimitFrequency, ValidationError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::connection::WalletConnection;
use crate::error::{BudgetError, Result};
use crate::limit::{validate_amount, SpendingLimit};
use crate::service::BudgetService;

/// Requested state of a connection's spending limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitUpdate {
    pub enabled: bool,
    /// Required when `enabled`
    #[serde(default)]
    pub amount: Option<i64>,
    /// Defaults to the active limit's currency, then the connection's
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub frequency: Option<SpendingLimitFrequency>,
}

impl LimitUpdate {
    pub fn enable(amount: i64, currency: Currency, frequency: SpendingLimitFrequency) -> Self {
        Self {
            enabled: true,
            amount: Some(amount),
            currency: Some(currency),
            frequency: Some(frequency),
        }
    }

    pub fn disable() -> Self {
        Self {
            enabled: false,
            amount: None,
            currency: None,
            frequency: None,
        }
    }
}

/// What [`BudgetService::update_limit`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitChange {
    Unchanged,
    Created(SpendingLimit),
    Replaced {
        previous: SpendingLimit,
        current: SpendingLimit,
    },
    AmountChanged(SpendingLimit),
    /// The limit that was ended, if one was active
    Disabled(Option<SpendingLimit>),
}

impl LimitChange {
    /// The limit active after the change
    pub fn active_limit(&self) -> Option<&SpendingLimit> {
        match self {
            Self::Created(limit) | Self::AmountChanged(limit) => Some(limit),
            Self::Replaced { current, .. } => Some(current),
            Self::Unchanged | Self::Disabled(_) => None,
        }
    }
}

impl BudgetService {
    /// Create a connection, optionally with an initial spending limit
    pub async fn create_connection(
        &self,
        budget_currency: Currency,
        vasp_access_token: Option<String>,
        initial_limit: Option<LimitUpdate>,
        now: DateTime<Utc>,
    ) -> Result<WalletConnection> {
        let connection = WalletConnection::new(budget_currency, vasp_access_token, now);
        self.store.save_connection(&connection).await?;
        info!(connection_id = %connection.id, "Connection created");

        match initial_limit {
            Some(update) if update.enabled => {
                self.update_limit(&connection.id, update, now).await?;
                self.connection(&connection.id).await
            }
            _ => Ok(connection),
        }
    }

    /// Apply a limit change to a connection.
    ///
    /// A frequency or currency change replaces the limit and starts a fresh
    /// cycle. An amount-only change rewrites the limit and its current cycle
    /// in place.
    pub async fn update_limit(
        &self,
        connection_id: &ConnectionId,
        update: LimitUpdate,
        now: DateTime<Utc>,
    ) -> Result<LimitChange> {
        let mut connection = self.connection(connection_id).await?;
        let active = self.active_limit(&connection).await?;

        if !update.enabled {
            let Some(limit) = active else {
                return Ok(LimitChange::Disabled(None));
            };
            let ended = self.end_limit(limit, now).await?;
            connection.spending_limit_id = None;
            self.store.save_connection(&connection).await?;
            info!(connection_id = %connection.id, limit_id = %ended.id, "Spending limit disabled");
            return Ok(LimitChange::Disabled(Some(ended)));
        }

        let amount = update
            .amount
            .ok_or_else(|| ValidationError::new("amount", "required when the limit is enabled"))?;
        validate_amount(amount)?;
        let frequency = update.frequency.unwrap_or_default();

        let Some(mut limit) = active else {
            let currency = update
                .currency
                .unwrap_or_else(|| connection.budget_currency.clone());
            let created = self
                .start_limit(&mut connection, currency, amount, frequency, now)
                .await?;
            return Ok(LimitChange::Created(created));
        };

        let currency = update.currency.unwrap_or_else(|| limit.currency.clone());
        if limit.frequency != frequency || limit.currency != currency {
            let previous = self.end_limit(limit, now).await?;
            let current = self
                .start_limit(&mut connection, currency, amount, frequency, now)
                .await?;
            info!(
                connection_id = %connection.id,
                previous_limit_id = %previous.id,
                limit_id = %current.id,
                "Spending limit replaced"
            );
            return Ok(LimitChange::Replaced { previous, current });
        }

        if limit.amount == amount {
            return Ok(LimitChange::Unchanged);
        }

        if let Some(cycle) = self.store.latest_cycle(&limit.id).await? {
            if !cycle.has_ended(now) {
                let mut lock = self.store.lock_cycle(&cycle.id).await?;
                lock.cycle_mut().set_limit_amount(amount);
                lock.commit(None).await?;
            }
        }
        let previous_amount = limit.amount;
        limit.amount = amount;
        self.store.update_limit(&limit).await?;
        info!(
            connection_id = %connection.id,
            limit_id = %limit.id,
            previous_amount,
            amount,
            "Spending limit amount changed"
        );
        Ok(LimitChange::AmountChanged(limit))
    }

    /// Every limit the connection has had, newest first
    pub async fn limit_history(&self, connection_id: &ConnectionId) -> Result<Vec<SpendingLimit>> {
        let connection = self.connection(connection_id).await?;
        Ok(self.store.limits_for_connection(&connection.id).await?)
    }

    async fn start_limit(
        &self,
        connection: &mut WalletConnection,
        currency: Currency,
        amount: i64,
        frequency: SpendingLimitFrequency,
        now: DateTime<Utc>,
    ) -> Result<SpendingLimit> {
        let limit = SpendingLimit::new(connection.id, currency, amount, frequency, now)?;
        self.store.insert_limit(&limit).await?;
        self.get_or_create_current_cycle(&limit, now).await?;

        connection.spending_limit_id = Some(limit.id);
        self.store.save_connection(connection).await?;
        info!(
            connection_id = %connection.id,
            limit_id = %limit.id,
            budget = %limit.budget_repr(),
            "Spending limit created"
        );
        Ok(limit)
    }

    /// Deactivate a limit and close its current cycle
    async fn end_limit(&self, mut limit: SpendingLimit, now: DateTime<Utc>) -> Result<SpendingLimit> {
        limit.deactivate(now);
        self.store.update_limit(&limit).await?;

        if let Some(cycle) = self.store.latest_cycle(&limit.id).await? {
            if !cycle.has_ended(now) {
                let mut lock = self.store.lock_cycle(&cycle.id).await?;
                lock.cycle_mut().end_at(now);
                lock.commit(None).await?;
            }
        }
        Ok(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BudgetConfig;
    use crate::store::{BudgetStore, MemoryStore};
    use chrono::Duration;
    use std::sync::Arc;

    fn service() -> (BudgetService, MemoryStore) {
        let store = MemoryStore::new();
        (
            BudgetService::new(Arc::new(store.clone()), BudgetConfig::default()),
            store,
        )
    }

    #[tokio::test]
    async fn test_create_connection_with_limit_creates_first_cycle() {
        let (service, store) = service();
        let now = Utc::now();
        let connection = service
            .create_connection(
                Currency::sat(),
                None,
                Some(LimitUpdate::enable(1000, Currency::sat(), SpendingLimitFrequency::Weekly)),
                now,
            )
            .await
            .unwrap();

        let limit_id = connection.spending_limit_id.unwrap();
        assert_eq!(store.cycle_count(&limit_id).await, 1);
        let cycle = store.latest_cycle(&limit_id).await.unwrap().unwrap();
        assert_eq!(cycle.start_time, now);
        assert_eq!(cycle.end_time(), Some(now + Duration::days(7)));
    }

    #[tokio::test]
    async fn test_enable_requires_amount() {
        let (service, _) = service();
        let connection = service
            .create_connection(Currency::sat(), None, None, Utc::now())
            .await
            .unwrap();

        let update = LimitUpdate {
            enabled: true,
            amount: None,
            currency: None,
            frequency: None,
        };
        let err = service
            .update_limit(&connection.id, update, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BudgetError::Validation(_)));
    }

    #[tokio::test]
    async fn test_defaults_to_connection_currency() {
        let (service, _) = service();
        let connection = service
            .create_connection(Currency::usd(), None, None, Utc::now())
            .await
            .unwrap();

        let update = LimitUpdate {
            enabled: true,
            amount: Some(500),
            currency: None,
            frequency: Some(SpendingLimitFrequency::Monthly),
        };
        let change = service
            .update_limit(&connection.id, update, Utc::now())
            .await
            .unwrap();
        let limit = change.active_limit().unwrap();
        assert_eq!(limit.currency, Currency::usd());
        assert_eq!(limit.frequency, SpendingLimitFrequency::Monthly);
    }

    #[tokio::test]
    async fn test_amount_change_rewrites_current_cycle() {
        let (service, store) = service();
        let start = Utc::now();
        let connection = service
            .create_connection(
                Currency::sat(),
                None,
                Some(LimitUpdate::enable(1000, Currency::sat(), SpendingLimitFrequency::Daily)),
                start,
            )
            .await
            .unwrap();
        let limit_id = connection.spending_limit_id.unwrap();

        let later = start + Duration::hours(2);
        let change = service
            .update_limit(
                &connection.id,
                LimitUpdate::enable(2500, Currency::sat(), SpendingLimitFrequency::Daily),
                later,
            )
            .await
            .unwrap();
        assert!(matches!(change, LimitChange::AmountChanged(ref l) if l.id == limit_id));

        let cycle = store.latest_cycle(&limit_id).await.unwrap().unwrap();
        assert_eq!(cycle.limit_amount(), 2500);
        assert_eq!(store.cycle_count(&limit_id).await, 1);
        assert_eq!(store.limit(&limit_id).await.unwrap().unwrap().amount, 2500);
    }

    #[tokio::test]
    async fn test_frequency_change_replaces_limit() {
        let (service, store) = service();
        let start = Utc::now();
        let connection = service
            .create_connection(
                Currency::sat(),
                None,
                Some(LimitUpdate::enable(1000, Currency::sat(), SpendingLimitFrequency::Daily)),
                start,
            )
            .await
            .unwrap();
        let old_id = connection.spending_limit_id.unwrap();

        let later = start + Duration::hours(5);
        let change = service
            .update_limit(
                &connection.id,
                LimitUpdate::enable(1000, Currency::sat(), SpendingLimitFrequency::Weekly),
                later,
            )
            .await
            .unwrap();

        let LimitChange::Replaced { previous, current } = change else {
            panic!("expected a replacement, got {:?}", change);
        };
        assert_eq!(previous.id, old_id);
        assert_eq!(previous.end_time, Some(later));
        assert_eq!(current.start_time, later);

        let old_cycle = store.latest_cycle(&old_id).await.unwrap().unwrap();
        assert_eq!(old_cycle.end_time(), Some(later));
        assert_eq!(store.cycle_count(&current.id).await, 1);

        let connection = service.connection(&connection.id).await.unwrap();
        assert_eq!(connection.spending_limit_id, Some(current.id));

        let history = service.limit_history(&connection.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, current.id);
    }

    #[tokio::test]
    async fn test_unchanged_update_is_noop() {
        let (service, _) = service();
        let now = Utc::now();
        let connection = service
            .create_connection(
                Currency::sat(),
                None,
                Some(LimitUpdate::enable(1000, Currency::sat(), SpendingLimitFrequency::Daily)),
                now,
            )
            .await
            .unwrap();

        let change = service
            .update_limit(
                &connection.id,
                LimitUpdate::enable(1000, Currency::sat(), SpendingLimitFrequency::Daily),
                now + Duration::minutes(1),
            )
            .await
            .unwrap();
        assert_eq!(change, LimitChange::Unchanged);
    }

    #[tokio::test]
    async fn test_disable_without_limit() {
        let (service, _) = service();
        let connection = service
            .create_connection(Currency::sat(), None, None, Utc::now())
            .await
            .unwrap();
        let change = service
            .update_limit(&connection.id, LimitUpdate::disable(), Utc::now())
            .await
            .unwrap();
        assert_eq!(change, LimitChange::Disabled(None));
    }

    #[tokio::test]
    async fn test_unknown_connection() {
        let (service, _) = service();
        let err = service
            .update_limit(&ConnectionId::new(), LimitUpdate::disable(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BudgetError::ConnectionNotFound(_)));
    }
}
