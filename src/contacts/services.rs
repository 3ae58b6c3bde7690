use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::auth::validation::is_valid_email;
use crate::clock::Clock;
use crate::contacts::{
    repo,
    repo_types::{ContactMessage, NewContact},
};
use crate::error::{error_response, StoreError, GENERIC_FAILURE};

#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl IntoResponse for ContactError {
    fn into_response(self) -> Response {
        match self {
            ContactError::Validation(msg) => error_response(StatusCode::BAD_REQUEST, msg),
            ContactError::Storage(e) => {
                error!(error = %e, "contact storage failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE)
            }
        }
    }
}

#[derive(Clone)]
pub struct ContactService {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl ContactService {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn submit(
        &self,
        full_name: &str,
        email: &str,
        phone: Option<&str>,
        message: &str,
    ) -> Result<ContactMessage, ContactError> {
        let (full_name, email, message) = (full_name.trim(), email.trim(), message.trim());
        if full_name.is_empty() || email.is_empty() || message.is_empty() {
            return Err(ContactError::Validation(
                "Please fill in name, email and message",
            ));
        }
        if !is_valid_email(email) {
            return Err(ContactError::Validation(
                "Please provide a valid email address",
            ));
        }

        let stored = repo::insert(
            &self.db,
            &NewContact {
                full_name: full_name.to_string(),
                email: email.to_string(),
                phone: phone.map(str::trim).unwrap_or_default().to_string(),
                message: message.to_string(),
                created_at: self.clock.now(),
            },
        )
        .await?;

        info!(contact_id = stored.id, "contact message stored");
        Ok(stored)
    }

    pub async fn list(&self) -> Result<Vec<ContactMessage>, ContactError> {
        Ok(repo::list_all(&self.db).await?)
    }
}
