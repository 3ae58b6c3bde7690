use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::auth::repo_types::from_unix;

#[derive(Debug, FromRow)]
pub struct ContactRow {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub created_at: i64,
}

/// Stored contact-form submission.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContactMessage {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<ContactRow> for ContactMessage {
    fn from(r: ContactRow) -> Self {
        Self {
            id: r.id,
            full_name: r.full_name,
            email: r.email,
            phone: r.phone.unwrap_or_default(),
            message: r.message,
            created_at: from_unix(r.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    pub created_at: OffsetDateTime,
}
