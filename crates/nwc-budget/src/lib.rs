//! NWC Budget - Spending limits and budget reservations
//!
//! Tracks how much of a connection's periodic spending allowance has been
//! consumed, holds budget for in-flight payments before their final cost is
//! known, and reconciles each hold once the payment completes or fails.
//!
//! # Invariants
//!
//! 1. At most one active spending limit per connection
//! 2. Exactly one cycle per limit per period start
//! 3. `total_spent + total_spent_on_hold <= limit_amount` when a hold is placed
//! 4. Every reservation is finalized exactly once
//!
//! # Example
//!
//! ```ignore
//! let service = BudgetService::new(Arc::new(MemoryStore::new()), BudgetConfig::default());
//! let payment = service.reserve(&converter, &connection, request_id, intent).await?;
//! service.finalize_success(&payment, 55).await?;
//! ```

pub mod collaborators;
pub mod config;
pub mod connection;
pub mod cycle;
pub mod error;
pub mod flow;
pub mod limit;
pub mod payment;
pub mod repr;
pub mod service;
pub mod store;
pub mod update;
pub mod view;

pub use collaborators::{
    CollaboratorError, CurrencyConverter, PaymentExecutor, PaymentOutcome, PaymentRequest,
    QuoteDetails, ReceivingAddress,
};
pub use config::BudgetConfig;
pub use connection::WalletConnection;
pub use cycle::SpendingCycle;
pub use error::{BudgetError, Result};
pub use flow::{PaymentFlow, PaymentReceipt};
pub use limit::SpendingLimit;
pub use payment::{OutgoingPayment, PaymentIntent, PaymentStatus, ReceiverType};
pub use repr::BudgetRepr;
pub use service::BudgetService;
pub use store::{BudgetStore, CycleLock, MemoryStore, StoreError, StoreResult};
pub use update::{LimitChange, LimitUpdate};
pub use view::{BudgetCurrencyView, BudgetView};
