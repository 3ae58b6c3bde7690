use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    contacts::{
        dto::ContactRequest,
        repo_types::ContactMessage,
        services::ContactError,
    },
    state::AppState,
};

pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/contact", post(submit_contact))
        .route("/contacts", get(list_contacts))
}

#[instrument(skip(state, payload))]
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(payload): Json<ContactRequest>,
) -> Result<(StatusCode, Json<ContactMessage>), ContactError> {
    let stored = state
        .contacts
        .submit(
            &payload.full_name,
            &payload.email,
            payload.phone.as_deref(),
            &payload.message,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Admin view of contact submissions.
#[instrument(skip(state))]
pub async fn list_contacts(
    State(state): State<AppState>,
) -> Result<Json<Vec<ContactMessage>>, ContactError> {
    Ok(Json(state.contacts.list().await?))
}
