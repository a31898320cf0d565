//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nwc_budget::BudgetError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Budget(#[from] BudgetError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// NIP-47 style error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Budget(err) => err.error_code(),
            Self::BadRequest(_) => "OTHER",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Budget(err) => match err {
                BudgetError::Validation(_) => StatusCode::BAD_REQUEST,
                BudgetError::InsufficientBudget { .. } => StatusCode::PAYMENT_REQUIRED,
                BudgetError::ConnectionNotFound(_)
                | BudgetError::SpendingLimitNotFound(_)
                | BudgetError::SpendingCycleNotFound(_)
                | BudgetError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
                BudgetError::PaymentAlreadyFinalized { .. } => StatusCode::CONFLICT,
                BudgetError::Conversion(_) | BudgetError::Execution(_) => StatusCode::BAD_GATEWAY,
                BudgetError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub msg: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            code: err.error_code().to_string(),
            msg: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

impl From<nwc_types::ValidationError> for ApiError {
    fn from(err: nwc_types::ValidationError) -> Self {
        Self::Budget(BudgetError::Validation(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nwc_budget::CollaboratorError;
    use nwc_types::ConnectionId;

    #[test]
    fn test_status_mapping() {
        let quota = ApiError::from(BudgetError::InsufficientBudget {
            requested: Some(10),
            available: 0,
        });
        assert_eq!(quota.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(quota.error_code(), "QUOTA_EXCEEDED");

        let missing = ApiError::from(BudgetError::ConnectionNotFound(ConnectionId::new()));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let upstream = ApiError::from(BudgetError::Conversion(CollaboratorError::Unavailable {
            service: "VASP".to_string(),
            message: "timeout".to_string(),
        }));
        assert_eq!(upstream.status_code(), StatusCode::BAD_GATEWAY);
    }
}
