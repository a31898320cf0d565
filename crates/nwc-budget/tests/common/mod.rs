#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use nwc_budget::{
    BudgetConfig, BudgetService, CollaboratorError, CurrencyConverter, LimitUpdate, MemoryStore,
    PaymentExecutor, PaymentIntent, PaymentOutcome, PaymentRequest, ReceiverType, WalletConnection,
};
use nwc_types::{Currency, SpendingLimitFrequency};

/// Converter returning a fixed estimate and counting calls
pub struct FixedConverter {
    estimate: Result<i64, CollaboratorError>,
    calls: AtomicUsize,
}

impl FixedConverter {
    pub fn returning(estimate: i64) -> Self {
        Self {
            estimate: Ok(estimate),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            estimate: Err(CollaboratorError::Unavailable {
                service: "test converter".to_string(),
                message: "timed out".to_string(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CurrencyConverter for FixedConverter {
    async fn estimate(
        &self,
        _sending_currency: &Currency,
        _sending_amount: i64,
        _target_currency: &Currency,
    ) -> Result<i64, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.estimate.clone()
    }
}

/// Executor returning a scripted outcome and recording requests
pub struct ScriptedExecutor {
    outcome: Result<PaymentOutcome, CollaboratorError>,
    pub requests: Mutex<Vec<PaymentRequest>>,
}

impl ScriptedExecutor {
    pub fn settling(settled: Option<i64>) -> Self {
        Self {
            outcome: Ok(PaymentOutcome {
                preimage: Some("preimage".to_string()),
                settled_budget_amount: settled,
            }),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            outcome: Err(CollaboratorError::Status {
                service: "test executor".to_string(),
                status: 500,
                message: "route not found".to_string(),
            }),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PaymentExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        request: &PaymentRequest,
        _budget_currency: Option<&Currency>,
    ) -> Result<PaymentOutcome, CollaboratorError> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcome.clone()
    }
}

pub fn service_with(config: BudgetConfig) -> (BudgetService, MemoryStore) {
    let store = MemoryStore::new();
    (BudgetService::new(Arc::new(store.clone()), config), store)
}

pub fn service() -> (BudgetService, MemoryStore) {
    service_with(BudgetConfig::default())
}

pub async fn connection_with_limit(
    service: &BudgetService,
    amount: i64,
    currency: Currency,
    frequency: SpendingLimitFrequency,
) -> WalletConnection {
    service
        .create_connection(
            currency.clone(),
            Some("token".to_string()),
            Some(LimitUpdate::enable(amount, currency, frequency)),
            Utc::now(),
        )
        .await
        .unwrap()
}

pub fn sats(amount: i64) -> PaymentIntent {
    PaymentIntent::new("lnbc1test", ReceiverType::Bolt11Invoice, Currency::sat(), amount).unwrap()
}
