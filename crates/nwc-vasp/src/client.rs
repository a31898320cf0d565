//! HTTP client for the VASP's UMA auth API

use async_trait::async_trait;
use nwc_budget::{
    CollaboratorError, CurrencyConverter, PaymentExecutor, PaymentOutcome, PaymentRequest,
    ReceiverType,
};
use nwc_types::Currency;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::VaspConfig;
use crate::dto::{
    BudgetEstimateResponse, PayInvoiceRequest, PayKeysendRequest, PayToAddressRequest,
    PaymentResponse,
};
use crate::error::{VaspError, VaspResult};

/// Shared HTTP client for the VASP.
///
/// Cheap to clone. Requests are made through a [`VaspSession`] bound to one
/// connection's access token.
#[derive(Debug, Clone)]
pub struct VaspClient {
    http: Client,
    config: VaspConfig,
}

impl VaspClient {
    pub fn new(config: VaspConfig) -> VaspResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &VaspConfig {
        &self.config
    }

    /// Session acting with `access_token`
    pub fn session(&self, access_token: Option<String>) -> VaspSession {
        VaspSession {
            client: self.clone(),
            access_token,
        }
    }
}

/// VASP access on behalf of one connection
#[derive(Debug, Clone)]
pub struct VaspSession {
    client: VaspClient,
    access_token: Option<String>,
}

impl VaspSession {
    fn authorized(&self, builder: RequestBuilder) -> VaspResult<RequestBuilder> {
        let token = self.access_token.as_deref().ok_or(VaspError::MissingToken)?;
        Ok(builder.bearer_auth(token))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> VaspResult<T> {
        let url = self.client.config.url(path);
        debug!(url = %url, "VASP GET");
        let request = self.authorized(self.client.http.get(&url).query(query))?;
        decode(request.send().await?).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> VaspResult<T> {
        let url = self.client.config.url(path);
        debug!(url = %url, "VASP POST");
        let mut builder = self.client.http.post(&url).query(query);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let request = self.authorized(builder)?;
        decode(request.send().await?).await
    }

    pub async fn get_budget_estimate(
        &self,
        sending_currency_code: &str,
        sending_currency_amount: i64,
        budget_currency_code: &str,
    ) -> VaspResult<BudgetEstimateResponse> {
        self.get(
            "/budget_estimate",
            &[
                ("sending_currency_code", sending_currency_code.to_string()),
                ("sending_currency_amount", sending_currency_amount.to_string()),
                ("budget_currency_code", budget_currency_code.to_string()),
            ],
        )
        .await
    }

    pub async fn pay_invoice(&self, request: &PayInvoiceRequest) -> VaspResult<PaymentResponse> {
        self.post("/payments/bolt11", &[], Some(request)).await
    }

    pub async fn pay_keysend(&self, request: &PayKeysendRequest) -> VaspResult<PaymentResponse> {
        self.post("/payments/keysend", &[], Some(request)).await
    }

    pub async fn pay_to_address(
        &self,
        request: &PayToAddressRequest,
        address_type: ReceiverType,
    ) -> VaspResult<PaymentResponse> {
        self.post(
            "/payments/lnurl",
            &[("address_type", address_type_param(address_type).to_string())],
            Some(request),
        )
        .await
    }

    pub async fn execute_quote(
        &self,
        payment_hash: &str,
        budget_currency_code: Option<&str>,
    ) -> VaspResult<PaymentResponse> {
        let query: Vec<(&str, String)> = budget_currency_code
            .map(|code| ("budget_currency_code", code.to_string()))
            .into_iter()
            .collect();
        self.post::<(), _>(&format!("/quote/{}", payment_hash), &query, None)
            .await
    }
}

fn address_type_param(receiver_type: ReceiverType) -> &'static str {
    match receiver_type {
        ReceiverType::Bip353 => "bip353",
        ReceiverType::Lud16 | ReceiverType::Bolt11Invoice | ReceiverType::NodePubkey => "lud16",
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> VaspResult<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(VaspError::Status {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl CurrencyConverter for VaspSession {
    async fn estimate(
        &self,
        sending_currency: &Currency,
        sending_amount: i64,
        target_currency: &Currency,
    ) -> Result<i64, CollaboratorError> {
        let response = self
            .get_budget_estimate(&sending_currency.code, sending_amount, &target_currency.code)
            .await?;
        Ok(response.estimated_budget_currency_amount)
    }
}

#[async_trait]
impl PaymentExecutor for VaspSession {
    async fn execute(
        &self,
        request: &PaymentRequest,
        budget_currency: Option<&Currency>,
    ) -> Result<PaymentOutcome, CollaboratorError> {
        let budget_currency_code = budget_currency.map(|c| c.code.clone());
        let response = match request {
            PaymentRequest::PayInvoice { invoice, amount_msats } => {
                self.pay_invoice(&PayInvoiceRequest {
                    invoice: invoice.clone(),
                    amount: Some(*amount_msats),
                    budget_currency_code,
                })
                .await?
            }
            PaymentRequest::PayKeysend {
                pubkey,
                amount_msats,
                preimage,
            } => {
                self.pay_keysend(&PayKeysendRequest {
                    amount: *amount_msats,
                    pubkey: pubkey.clone(),
                    preimage: preimage.clone(),
                    budget_currency_code,
                })
                .await?
            }
            PaymentRequest::PayToAddress {
                receiver,
                sending_currency,
                sending_amount,
            } => {
                self.pay_to_address(
                    &PayToAddressRequest {
                        receiver_address: receiver.address.clone(),
                        sending_currency_code: sending_currency.code.clone(),
                        sending_currency_amount: *sending_amount,
                        budget_currency_code,
                    },
                    receiver.receiver_type,
                )
                .await?
            }
            PaymentRequest::ExecuteQuote { quote } => {
                self.execute_quote(&quote.payment_hash, budget_currency_code.as_deref())
                    .await?
            }
        };

        Ok(PaymentOutcome {
            preimage: Some(response.preimage),
            settled_budget_amount: response.total_budget_currency_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_is_rejected_before_sending() {
        let client = VaspClient::new(VaspConfig::new("http://127.0.0.1:9")).unwrap();
        let session = client.session(None);

        let err = session
            .estimate(&Currency::usd(), 100, &Currency::sat())
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Status { status: 401, .. }));
    }

    #[test]
    fn test_address_type_param() {
        assert_eq!(address_type_param(ReceiverType::Lud16), "lud16");
        assert_eq!(address_type_param(ReceiverType::Bip353), "bip353");
    }
}
