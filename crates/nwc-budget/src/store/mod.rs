//! Persistence for budget entities
//!
//! [`BudgetStore`] is the transactional store the reservation protocol runs
//! against. Entities live in flat tables keyed by id; relationships are ids,
//! never embedded objects.
//!
//! The only writes to a cycle's running totals go through a [`CycleLock`],
//! which serializes all read-check-write sequences on one cycle and commits
//! the cycle together with the payment it concerns.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nwc_types::{ConnectionId, PaymentId, SpendingCycleId, SpendingLimitId};
use thiserror::Error;

use crate::connection::WalletConnection;
use crate::cycle::SpendingCycle;
use crate::limit::SpendingLimit;
use crate::payment::OutgoingPayment;

/// Storage failures
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Transactional store for connections, limits, cycles and payments
#[async_trait]
pub trait BudgetStore: Send + Sync {
    async fn connection(&self, id: &ConnectionId) -> StoreResult<Option<WalletConnection>>;

    /// Insert or replace a connection
    async fn save_connection(&self, connection: &WalletConnection) -> StoreResult<()>;

    async fn insert_limit(&self, limit: &SpendingLimit) -> StoreResult<()>;

    async fn update_limit(&self, limit: &SpendingLimit) -> StoreResult<()>;

    async fn limit(&self, id: &SpendingLimitId) -> StoreResult<Option<SpendingLimit>>;

    /// Every limit of a connection, newest first
    async fn limits_for_connection(&self, id: &ConnectionId) -> StoreResult<Vec<SpendingLimit>>;

    /// The cycle with the latest start time for a limit
    async fn latest_cycle(&self, limit_id: &SpendingLimitId) -> StoreResult<Option<SpendingCycle>>;

    async fn cycle_starting_at(
        &self,
        limit_id: &SpendingLimitId,
        start_time: DateTime<Utc>,
    ) -> StoreResult<Option<SpendingCycle>>;

    async fn cycle(&self, id: &SpendingCycleId) -> StoreResult<Option<SpendingCycle>>;

    /// Insert a new cycle. Fails with [`StoreError::UniqueViolation`] if the
    /// limit already has a cycle with the same start time.
    async fn insert_cycle(&self, cycle: &SpendingCycle) -> StoreResult<()>;

    /// Take the exclusive lock on a cycle and read it fresh
    async fn lock_cycle(&self, id: &SpendingCycleId) -> StoreResult<Box<dyn CycleLock>>;

    async fn insert_payment(&self, payment: &OutgoingPayment) -> StoreResult<()>;

    async fn payment(&self, id: &PaymentId) -> StoreResult<Option<OutgoingPayment>>;

    /// Write the final state of a payment that has no cycle, but only if the
    /// stored record is still pending. Returns whether the write happened.
    async fn complete_unbudgeted_payment(&self, payment: &OutgoingPayment) -> StoreResult<bool>;

    /// Payments of a connection, newest first
    async fn payments_for_connection(
        &self,
        id: &ConnectionId,
        limit: usize,
    ) -> StoreResult<Vec<OutgoingPayment>>;
}

/// Exclusive hold on one spending cycle.
///
/// Dropping the lock without calling [`CycleLock::commit`] discards every
/// change made through it.
#[async_trait]
pub trait CycleLock: Send {
    fn cycle(&self) -> &SpendingCycle;

    fn cycle_mut(&mut self) -> &mut SpendingCycle;

    /// Read a payment inside the locked section
    async fn payment(&mut self, id: &PaymentId) -> StoreResult<Option<OutgoingPayment>>;

    /// Persist the cycle, and the payment if given, as one atomic write and
    /// release the lock
    async fn commit(self: Box<Self>, payment: Option<&OutgoingPayment>) -> StoreResult<()>;
}
