//! VASP client errors

use nwc_budget::CollaboratorError;
use thiserror::Error;

const SERVICE: &str = "VASP";

#[derive(Debug, Error)]
pub enum VaspError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("VASP error: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The connection has no VASP access token
    #[error("Missing VASP access token")]
    MissingToken,
}

pub type VaspResult<T> = Result<T, VaspError>;

impl From<VaspError> for CollaboratorError {
    fn from(e: VaspError) -> Self {
        match e {
            VaspError::Status { status, message } => CollaboratorError::Status {
                service: SERVICE.to_string(),
                status,
                message,
            },
            VaspError::Http(e) if e.is_decode() => CollaboratorError::InvalidResponse {
                service: SERVICE.to_string(),
                message: e.to_string(),
            },
            VaspError::Http(e) => CollaboratorError::Unavailable {
                service: SERVICE.to_string(),
                message: e.to_string(),
            },
            VaspError::Decode(e) => CollaboratorError::InvalidResponse {
                service: SERVICE.to_string(),
                message: e.to_string(),
            },
            VaspError::MissingToken => CollaboratorError::Status {
                service: SERVICE.to_string(),
                status: 401,
                message: "connection has no access token".to_string(),
            },
        }
    }
}
