//! In-memory budget store
//!
//! Used by tests and by the server when no database is configured. Cycle
//! locks are per-cycle async mutexes, so reservations on different cycles
//! never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use nwc_types::{ConnectionId, PaymentId, SpendingCycleId, SpendingLimitId};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::{BudgetStore, CycleLock, StoreError, StoreResult};
use crate::connection::WalletConnection;
use crate::cycle::SpendingCycle;
use crate::limit::SpendingLimit;
use crate::payment::{OutgoingPayment, PaymentStatus};

#[derive(Default)]
struct Tables {
    connections: HashMap<ConnectionId, WalletConnection>,
    limits: HashMap<SpendingLimitId, SpendingLimit>,
    cycles: HashMap<SpendingCycleId, SpendingCycle>,
    /// Unique index on `(spending_limit_id, start_time)`
    cycle_starts: HashMap<(SpendingLimitId, DateTime<Utc>), SpendingCycleId>,
    payments: HashMap<PaymentId, OutgoingPayment>,
}

/// Budget store backed by process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    cycle_locks: Arc<DashMap<SpendingCycleId, Arc<Mutex<()>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cycles stored for a limit
    pub async fn cycle_count(&self, limit_id: &SpendingLimitId) -> usize {
        let tables = self.tables.read().await;
        tables
            .cycles
            .values()
            .filter(|c| c.spending_limit_id == *limit_id)
            .count()
    }

    pub async fn payment_count(&self) -> usize {
        self.tables.read().await.payments.len()
    }

    #[cfg(test)]
    fn has_cycle_lock(&self, id: &SpendingCycleId) -> bool {
        self.cycle_locks.contains_key(id)
    }
}

#[async_trait]
impl BudgetStore for MemoryStore {
    async fn connection(&self, id: &ConnectionId) -> StoreResult<Option<WalletConnection>> {
        Ok(self.tables.read().await.connections.get(id).cloned())
    }

    async fn save_connection(&self, connection: &WalletConnection) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .connections
            .insert(connection.id, connection.clone());
        Ok(())
    }

    async fn insert_limit(&self, limit: &SpendingLimit) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.limits.contains_key(&limit.id) {
            return Err(StoreError::UniqueViolation(format!("spending limit {}", limit.id)));
        }
        tables.limits.insert(limit.id, limit.clone());
        Ok(())
    }

    async fn update_limit(&self, limit: &SpendingLimit) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match tables.limits.get_mut(&limit.id) {
            Some(stored) => {
                *stored = limit.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("spending limit {}", limit.id))),
        }
    }

    async fn limit(&self, id: &SpendingLimitId) -> StoreResult<Option<SpendingLimit>> {
        Ok(self.tables.read().await.limits.get(id).cloned())
    }

    async fn limits_for_connection(&self, id: &ConnectionId) -> StoreResult<Vec<SpendingLimit>> {
        let tables = self.tables.read().await;
        let mut limits: Vec<_> = tables
            .limits
            .values()
            .filter(|l| l.connection_id == *id)
            .cloned()
            .collect();
        limits.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(limits)
    }

    async fn latest_cycle(&self, limit_id: &SpendingLimitId) -> StoreResult<Option<SpendingCycle>> {
        let tables = self.tables.read().await;
        Ok(tables
            .cycles
            .values()
            .filter(|c| c.spending_limit_id == *limit_id)
            .max_by_key(|c| c.start_time)
            .cloned())
    }

    async fn cycle_starting_at(
        &self,
        limit_id: &SpendingLimitId,
        start_time: DateTime<Utc>,
    ) -> StoreResult<Option<SpendingCycle>> {
        let tables = self.tables.read().await;
        Ok(tables
            .cycle_starts
            .get(&(*limit_id, start_time))
            .and_then(|id| tables.cycles.get(id))
            .cloned())
    }

    async fn cycle(&self, id: &SpendingCycleId) -> StoreResult<Option<SpendingCycle>> {
        Ok(self.tables.read().await.cycles.get(id).cloned())
    }

    async fn insert_cycle(&self, cycle: &SpendingCycle) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let key = (cycle.spending_limit_id, cycle.start_time);
        if tables.cycle_starts.contains_key(&key) {
            return Err(StoreError::UniqueViolation(format!(
                "spending cycle ({}, {})",
                cycle.spending_limit_id, cycle.start_time
            )));
        }
        tables.cycle_starts.insert(key, cycle.id);
        tables.cycles.insert(cycle.id, cycle.clone());

        // Locks of a limit's older cycles are dropped once nobody holds or
        // waits on them; a later lock_cycle recreates the entry.
        for older in tables
            .cycles
            .values()
            .filter(|c| c.spending_limit_id == cycle.spending_limit_id && c.id != cycle.id)
        {
            self.cycle_locks
                .remove_if(&older.id, |_, mutex| Arc::strong_count(mutex) == 1);
        }
        Ok(())
    }

    async fn lock_cycle(&self, id: &SpendingCycleId) -> StoreResult<Box<dyn CycleLock>> {
        let mutex = self
            .cycle_locks
            .entry(*id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;

        let cycle = self
            .tables
            .read()
            .await
            .cycles
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("spending cycle {}", id)))?;

        Ok(Box::new(MemoryCycleLock {
            _guard: guard,
            tables: Arc::clone(&self.tables),
            cycle,
        }))
    }

    async fn insert_payment(&self, payment: &OutgoingPayment) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.payments.contains_key(&payment.id) {
            return Err(StoreError::UniqueViolation(format!("payment {}", payment.id)));
        }
        tables.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn payment(&self, id: &PaymentId) -> StoreResult<Option<OutgoingPayment>> {
        Ok(self.tables.read().await.payments.get(id).cloned())
    }

    async fn complete_unbudgeted_payment(&self, payment: &OutgoingPayment) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.payments.get_mut(&payment.id) {
            Some(stored) if stored.status == PaymentStatus::Pending => {
                *stored = payment.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(format!("payment {}", payment.id))),
        }
    }

    async fn payments_for_connection(
        &self,
        id: &ConnectionId,
        limit: usize,
    ) -> StoreResult<Vec<OutgoingPayment>> {
        let tables = self.tables.read().await;
        let mut payments: Vec<_> = tables
            .payments
            .values()
            .filter(|p| p.connection_id == *id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        payments.truncate(limit);
        Ok(payments)
    }
}

struct MemoryCycleLock {
    _guard: OwnedMutexGuard<()>,
    tables: Arc<RwLock<Tables>>,
    cycle: SpendingCycle,
}

#[async_trait]
impl CycleLock for MemoryCycleLock {
    fn cycle(&self) -> &SpendingCycle {
        &self.cycle
    }

    fn cycle_mut(&mut self) -> &mut SpendingCycle {
        &mut self.cycle
    }

    async fn payment(&mut self, id: &PaymentId) -> StoreResult<Option<OutgoingPayment>> {
        Ok(self.tables.read().await.payments.get(id).cloned())
    }

    async fn commit(self: Box<Self>, payment: Option<&OutgoingPayment>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.cycles.insert(self.cycle.id, self.cycle.clone());
        if let Some(payment) = payment {
            tables.payments.insert(payment.id, payment.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use nwc_types::{Currency, SpendingLimitFrequency};

    fn limit() -> SpendingLimit {
        SpendingLimit::new(
            ConnectionId::new(),
            Currency::sat(),
            100,
            SpendingLimitFrequency::Daily,
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_cycle_start_rejected() {
        let store = MemoryStore::new();
        let limit = limit();

        store.insert_cycle(&limit.create_cycle(limit.start_time)).await.unwrap();
        let err = store
            .insert_cycle(&limit.create_cycle(limit.start_time))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        store
            .insert_cycle(&limit.create_cycle(limit.start_time + Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(store.cycle_count(&limit.id).await, 2);

        let latest = store.latest_cycle(&limit.id).await.unwrap().unwrap();
        assert_eq!(latest.start_time, limit.start_time + Duration::days(1));
    }

    #[tokio::test]
    async fn test_dropped_lock_discards_changes() {
        let store = MemoryStore::new();
        let limit = limit();
        let cycle = limit.create_cycle(limit.start_time);
        store.insert_cycle(&cycle).await.unwrap();

        {
            let mut lock = store.lock_cycle(&cycle.id).await.unwrap();
            lock.cycle_mut().place_hold(40);
        }
        let stored = store.cycle(&cycle.id).await.unwrap().unwrap();
        assert_eq!(stored.total_spent_on_hold(), 0);

        let mut lock = store.lock_cycle(&cycle.id).await.unwrap();
        lock.cycle_mut().place_hold(40);
        lock.commit(None).await.unwrap();
        let stored = store.cycle(&cycle.id).await.unwrap().unwrap();
        assert_eq!(stored.total_spent_on_hold(), 40);
    }

    #[tokio::test]
    async fn test_renewal_drops_idle_cycle_locks() {
        let store = MemoryStore::new();
        let limit = limit();
        let first = limit.create_cycle(limit.start_time);
        let second = limit.create_cycle(limit.start_time + Duration::days(1));
        store.insert_cycle(&first).await.unwrap();
        store.insert_cycle(&second).await.unwrap();

        store.lock_cycle(&first.id).await.unwrap().commit(None).await.unwrap();
        let held = store.lock_cycle(&second.id).await.unwrap();
        assert!(store.has_cycle_lock(&first.id));

        let third = limit.create_cycle(limit.start_time + Duration::days(2));
        store.insert_cycle(&third).await.unwrap();
        assert!(!store.has_cycle_lock(&first.id));
        assert!(store.has_cycle_lock(&second.id));

        drop(held);
        let mut lock = store.lock_cycle(&first.id).await.unwrap();
        lock.cycle_mut().place_hold(10);
        lock.commit(None).await.unwrap();
        let stored = store.cycle(&first.id).await.unwrap().unwrap();
        assert_eq!(stored.total_spent_on_hold(), 10);
    }

    #[tokio::test]
    async fn test_lock_missing_cycle() {
        let store = MemoryStore::new();
        let result = store.lock_cycle(&SpendingCycleId::new()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
