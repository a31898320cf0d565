//! The budget reservation protocol
//!
//! Every money-moving request runs through three phases:
//!
//! 1. Estimate: find the current cycle and price the payment in the cycle's
//!    currency. No locks are held and nothing is written, so a slow or failed
//!    conversion call leaves no trace.
//! 2. Reserve: lock the cycle, re-check the available budget on the fresh
//!    row, then place the hold and record the pending payment in one commit.
//! 3. Finalize: lock the cycle again and either settle the hold into
//!    `total_spent` or release it.
//!
//! The lock is only held for the read-check-write in phases 2 and 3, never
//! across a network call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use nwc_types::{ConnectionId, RequestId};
use tracing::{debug, error, info, warn};

use crate::collaborators::{CollaboratorError, CurrencyConverter};
use crate::config::BudgetConfig;
use crate::connection::WalletConnection;
use crate::cycle::SpendingCycle;
use crate::error::{BudgetError, Result};
use crate::limit::SpendingLimit;
use crate::payment::{OutgoingPayment, PaymentIntent};
use crate::store::{BudgetStore, StoreError};

const RESERVE_ATTEMPTS: usize = 2;

/// Entry point of the budget core
#[derive(Clone)]
pub struct BudgetService {
    pub(crate) store: Arc<dyn BudgetStore>,
    pub(crate) config: BudgetConfig,
}

impl BudgetService {
    pub fn new(store: Arc<dyn BudgetStore>, config: BudgetConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn BudgetStore> {
        &self.store
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    pub async fn connection(&self, id: &ConnectionId) -> Result<WalletConnection> {
        self.store
            .connection(id)
            .await?
            .ok_or(BudgetError::ConnectionNotFound(*id))
    }

    /// The connection's active limit, if any
    pub async fn active_limit(&self, connection: &WalletConnection) -> Result<Option<SpendingLimit>> {
        let Some(limit_id) = connection.spending_limit_id else {
            return Ok(None);
        };
        let limit = self
            .store
            .limit(&limit_id)
            .await?
            .ok_or(BudgetError::SpendingLimitNotFound(limit_id))?;
        Ok(limit.is_active().then_some(limit))
    }

    /// Return the limit's current cycle, creating it if the latest one has
    /// ended.
    ///
    /// Concurrent callers racing to create the same cycle all get the row
    /// that won the insert.
    pub async fn get_or_create_current_cycle(
        &self,
        limit: &SpendingLimit,
        now: DateTime<Utc>,
    ) -> Result<SpendingCycle> {
        if let Some(latest) = self.store.latest_cycle(&limit.id).await? {
            if !latest.has_ended(now) {
                return Ok(latest);
            }
        }

        let start_time = limit.current_cycle_start_time(now);
        let cycle = limit.create_cycle(start_time);
        match self.store.insert_cycle(&cycle).await {
            Ok(()) => {
                info!(
                    limit_id = %limit.id,
                    cycle_id = %cycle.id,
                    start_time = %cycle.start_time,
                    limit_amount = cycle.limit_amount(),
                    "Spending cycle created"
                );
                Ok(cycle)
            }
            Err(StoreError::UniqueViolation(_)) => {
                debug!(limit_id = %limit.id, start_time = %start_time, "Spending cycle created concurrently");
                self.store
                    .cycle_starting_at(&limit.id, start_time)
                    .await?
                    .ok_or_else(|| {
                        BudgetError::Store(StoreError::NotFound(format!(
                            "spending cycle ({}, {})",
                            limit.id, start_time
                        )))
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reserve budget for a payment and record it as pending.
    ///
    /// Without an active limit the payment is recorded with no cycle linkage
    /// and nothing is reserved. If the cycle ends while the payment is being
    /// estimated, the connection is resolved again once.
    pub async fn reserve(
        &self,
        converter: &dyn CurrencyConverter,
        connection: &WalletConnection,
        request_id: RequestId,
        intent: PaymentIntent,
    ) -> Result<OutgoingPayment> {
        let mut connection = connection.clone();
        for _ in 0..RESERVE_ATTEMPTS {
            if let Some(payment) = self
                .try_reserve(converter, &connection, request_id, intent.clone())
                .await?
            {
                return Ok(payment);
            }
            connection = self.connection(&connection.id).await?;
        }

        warn!(connection_id = %connection.id, "Spending cycle kept ending during reservation");
        Err(BudgetError::InsufficientBudget {
            requested: None,
            available: 0,
        })
    }

    /// One reservation attempt; `None` when the locked cycle has ended
    async fn try_reserve(
        &self,
        converter: &dyn CurrencyConverter,
        connection: &WalletConnection,
        request_id: RequestId,
        intent: PaymentIntent,
    ) -> Result<Option<OutgoingPayment>> {
        let now = Utc::now();

        let Some(limit) = self.active_limit(connection).await? else {
            let payment = OutgoingPayment::pending(request_id, connection.id, intent, now);
            self.store.insert_payment(&payment).await?;
            debug!(
                connection_id = %connection.id,
                payment_id = %payment.id,
                "No active spending limit, payment not budgeted"
            );
            return Ok(Some(payment));
        };

        // Phase 1: estimate
        let cycle = self.get_or_create_current_cycle(&limit, now).await?;
        let available = cycle.available_budget();
        if available <= 0 {
            warn!(
                connection_id = %connection.id,
                cycle_id = %cycle.id,
                available,
                "Spending cycle exhausted"
            );
            return Err(BudgetError::InsufficientBudget {
                requested: None,
                available: available.max(0),
            });
        }

        let estimated = self.estimate(converter, &cycle, &intent).await?;
        let hold = self.config.hold_for(estimated)?;
        debug!(
            connection_id = %connection.id,
            cycle_id = %cycle.id,
            estimated,
            hold,
            "Payment estimated"
        );

        // Phase 2: reserve
        let mut lock = self.store.lock_cycle(&cycle.id).await?;
        if lock.cycle().has_ended(Utc::now()) {
            debug!(
                connection_id = %connection.id,
                cycle_id = %cycle.id,
                "Spending cycle ended before the hold was placed"
            );
            return Ok(None);
        }
        if !lock.cycle().can_reserve(hold) {
            let available = lock.cycle().available_budget();
            warn!(
                connection_id = %connection.id,
                cycle_id = %cycle.id,
                hold,
                available,
                "Insufficient budget for payment"
            );
            return Err(BudgetError::InsufficientBudget {
                requested: Some(hold),
                available: available.max(0),
            });
        }

        let mut payment = OutgoingPayment::pending(request_id, connection.id, intent, now);
        payment.attach_reservation(cycle.id, lock.cycle().limit_currency.clone(), estimated, hold);
        lock.cycle_mut().place_hold(hold);
        lock.commit(Some(&payment)).await?;

        info!(
            connection_id = %connection.id,
            cycle_id = %cycle.id,
            payment_id = %payment.id,
            hold,
            "Budget reserved"
        );
        Ok(Some(payment))
    }

    async fn estimate(
        &self,
        converter: &dyn CurrencyConverter,
        cycle: &SpendingCycle,
        intent: &PaymentIntent,
    ) -> Result<i64> {
        if intent.sending_currency == cycle.limit_currency {
            return Ok(intent.sending_amount);
        }

        let estimated = converter
            .estimate(&intent.sending_currency, intent.sending_amount, &cycle.limit_currency)
            .await
            .map_err(BudgetError::Conversion)?;
        if estimated < 0 {
            return Err(BudgetError::Conversion(CollaboratorError::InvalidResponse {
                service: "currency converter".to_string(),
                message: format!("negative estimate {}", estimated),
            }));
        }
        Ok(estimated)
    }

    /// Settle a reservation with the actual cost of the payment.
    ///
    /// `settled` may exceed the hold; the cycle then ends up over its limit
    /// and no further reservations fit until it renews.
    pub async fn finalize_success(&self, payment: &OutgoingPayment, settled: i64) -> Result<OutgoingPayment> {
        if settled < 0 {
            return Err(nwc_types::ValidationError::new(
                "settled_budget_amount",
                format!("must not be negative, got {}", settled),
            )
            .into());
        }
        let now = Utc::now();

        let Some(cycle_id) = payment.spending_cycle_id else {
            let mut finished = payment.clone();
            finished.mark_succeeded(settled, now);
            self.complete_unbudgeted(finished).await?;
            return self.reload_payment(payment).await;
        };

        let mut lock = self.store.lock_cycle(&cycle_id).await?;
        let mut current = lock
            .payment(&payment.id)
            .await?
            .ok_or(BudgetError::PaymentNotFound(payment.id))?;
        ensure_pending(&current)?;

        let hold = current.budget_on_hold.unwrap_or(0);
        lock.cycle_mut().settle(hold, settled);
        current.mark_succeeded(settled, now);

        let cycle = lock.cycle();
        if cycle.total_spent() > cycle.limit_amount() {
            warn!(
                cycle_id = %cycle_id,
                payment_id = %payment.id,
                total_spent = cycle.total_spent(),
                limit_amount = cycle.limit_amount(),
                "Settlement pushed spending cycle over its limit"
            );
        }
        lock.commit(Some(&current)).await?;

        info!(
            cycle_id = %cycle_id,
            payment_id = %payment.id,
            hold,
            settled,
            "Payment settled"
        );
        Ok(current)
    }

    /// Release a reservation without charging anything
    pub async fn finalize_failure(&self, payment: &OutgoingPayment) -> Result<OutgoingPayment> {
        let now = Utc::now();

        let Some(cycle_id) = payment.spending_cycle_id else {
            let mut finished = payment.clone();
            finished.mark_failed(now);
            self.complete_unbudgeted(finished).await?;
            return self.reload_payment(payment).await;
        };

        let mut lock = self.store.lock_cycle(&cycle_id).await?;
        let mut current = lock
            .payment(&payment.id)
            .await?
            .ok_or(BudgetError::PaymentNotFound(payment.id))?;
        ensure_pending(&current)?;

        let hold = current.budget_on_hold.unwrap_or(0);
        lock.cycle_mut().release_hold(hold);
        current.mark_failed(now);
        lock.commit(Some(&current)).await?;

        info!(cycle_id = %cycle_id, payment_id = %payment.id, hold, "Budget hold released");
        Ok(current)
    }

    async fn complete_unbudgeted(&self, finished: OutgoingPayment) -> Result<()> {
        if self.store.complete_unbudgeted_payment(&finished).await? {
            debug!(payment_id = %finished.id, status = %finished.status, "Unbudgeted payment finalized");
            return Ok(());
        }
        let stored = self
            .store
            .payment(&finished.id)
            .await?
            .ok_or(BudgetError::PaymentNotFound(finished.id))?;
        ensure_pending(&stored)
    }

    async fn reload_payment(&self, payment: &OutgoingPayment) -> Result<OutgoingPayment> {
        self.store
            .payment(&payment.id)
            .await?
            .ok_or(BudgetError::PaymentNotFound(payment.id))
    }

    /// Payment history of a connection, newest first
    pub async fn payments_for_connection(
        &self,
        connection_id: &ConnectionId,
        limit: usize,
    ) -> Result<Vec<OutgoingPayment>> {
        let connection = self.connection(connection_id).await?;
        Ok(self.store.payments_for_connection(&connection.id, limit).await?)
    }
}

fn ensure_pending(payment: &OutgoingPayment) -> Result<()> {
    if payment.status.is_terminal() {
        error!(
            payment_id = %payment.id,
            status = %payment.status,
            "Attempt to finalize a payment twice"
        );
        return Err(BudgetError::PaymentAlreadyFinalized {
            payment_id: payment.id,
            status: payment.status,
        });
    }
    Ok(())
}
