use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::error::{error_response, StoreError, GENERIC_FAILURE};

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid or expired reset link")]
    InvalidToken,
    #[error("storage failure: {0}")]
    Storage(#[source] StoreError),
    #[error("internal failure: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AccountError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AccountError::DuplicateEmail,
            other => AccountError::Storage(other),
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = match &self {
            AccountError::Validation(_) | AccountError::InvalidToken => StatusCode::BAD_REQUEST,
            AccountError::DuplicateEmail => StatusCode::CONFLICT,
            AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AccountError::Storage(_) | AccountError::Internal(_) => {
                error!(error = %self, "account operation failed");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE);
            }
        };
        error_response(status, self.to_string())
    }
}
