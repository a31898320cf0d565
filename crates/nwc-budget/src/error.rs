//! Budget error types

use nwc_types::{ConnectionId, PaymentId, SpendingCycleId, SpendingLimitId, ValidationError};
use thiserror::Error;

use crate::collaborators::CollaboratorError;
use crate::payment::PaymentStatus;
use crate::store::StoreError;

/// Result type for budget operations
pub type Result<T> = std::result::Result<T, BudgetError>;

/// Errors raised by the budget core
#[derive(Debug, Error)]
pub enum BudgetError {
    /// Malformed limit parameters
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No room left in the current spending cycle
    #[error("Insufficient budget: {available} available in the current cycle")]
    InsufficientBudget {
        /// Hold that was attempted, when known
        requested: Option<i64>,
        available: i64,
    },

    /// The currency conversion collaborator failed
    #[error(transparent)]
    Conversion(CollaboratorError),

    /// The payment execution collaborator failed
    #[error(transparent)]
    Execution(CollaboratorError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// A reservation was finalized twice
    #[error("Payment {payment_id} is already {status}")]
    PaymentAlreadyFinalized {
        payment_id: PaymentId,
        status: PaymentStatus,
    },

    #[error("Connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    #[error("Spending limit {0} not found")]
    SpendingLimitNotFound(SpendingLimitId),

    #[error("Spending cycle {0} not found")]
    SpendingCycleNotFound(SpendingCycleId),

    #[error("Payment {0} not found")]
    PaymentNotFound(PaymentId),
}

impl BudgetError {
    /// Whether the error indicates a caller bug rather than bad input or an
    /// external failure
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::PaymentAlreadyFinalized { .. })
    }

    /// NIP-47 style error code for protocol responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "OTHER",
            Self::InsufficientBudget { .. } => "QUOTA_EXCEEDED",
            Self::Conversion(_) => "OTHER",
            Self::Execution(_) => "PAYMENT_FAILED",
            Self::Store(_) => "INTERNAL",
            Self::PaymentAlreadyFinalized { .. } => "INTERNAL",
            Self::ConnectionNotFound(_) => "UNAUTHORIZED",
            Self::SpendingLimitNotFound(_) => "NOT_FOUND",
            Self::SpendingCycleNotFound(_) => "NOT_FOUND",
            Self::PaymentNotFound(_) => "NOT_FOUND",
        }
    }
}
