//! Drives one payment request through reserve, execute and finalize

use nwc_types::RequestId;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::collaborators::{CurrencyConverter, PaymentExecutor, PaymentRequest};
use crate::connection::WalletConnection;
use crate::error::{BudgetError, Result};
use crate::payment::OutgoingPayment;
use crate::service::BudgetService;

/// Outcome of a successful payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment: OutgoingPayment,
    pub preimage: Option<String>,
}

/// Runs payment requests for one connection's collaborators.
///
/// Each reservation gets exactly one finalization: settle on success,
/// release on any executor failure.
pub struct PaymentFlow<'a> {
    service: &'a BudgetService,
    converter: &'a dyn CurrencyConverter,
    executor: &'a dyn PaymentExecutor,
}

impl<'a> PaymentFlow<'a> {
    pub fn new(
        service: &'a BudgetService,
        converter: &'a dyn CurrencyConverter,
        executor: &'a dyn PaymentExecutor,
    ) -> Self {
        Self {
            service,
            converter,
            executor,
        }
    }

    pub async fn run(
        &self,
        connection: &WalletConnection,
        request_id: RequestId,
        request: PaymentRequest,
    ) -> Result<PaymentReceipt> {
        let intent = request.intent()?;
        let payment = self
            .service
            .reserve(self.converter, connection, request_id, intent)
            .await?;

        match self
            .executor
            .execute(&request, payment.budget_currency.as_ref())
            .await
        {
            Ok(outcome) => {
                let settled = match outcome.settled_budget_amount {
                    Some(amount) => amount,
                    None => {
                        let (amount, from_estimate) = payment.fallback_settled_amount();
                        if from_estimate {
                            error!(
                                payment_id = %payment.id,
                                method = request.method(),
                                estimate = amount,
                                "Executor reported no settled amount, charging the estimate"
                            );
                        }
                        amount
                    }
                };
                let payment = self.service.finalize_success(&payment, settled).await?;
                info!(
                    connection_id = %connection.id,
                    payment_id = %payment.id,
                    method = request.method(),
                    "Payment succeeded"
                );
                Ok(PaymentReceipt {
                    payment,
                    preimage: outcome.preimage,
                })
            }
            Err(e) => {
                warn!(
                    connection_id = %connection.id,
                    payment_id = %payment.id,
                    method = request.method(),
                    error = %e,
                    "Payment failed"
                );
                self.service.finalize_failure(&payment).await?;
                Err(BudgetError::Execution(e))
            }
        }
    }
}
