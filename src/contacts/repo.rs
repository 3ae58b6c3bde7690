use sqlx::SqlitePool;

use crate::contacts::repo_types::{ContactMessage, ContactRow, NewContact};
use crate::error::StoreError;

pub async fn insert(db: &SqlitePool, contact: &NewContact) -> Result<ContactMessage, StoreError> {
    let row = sqlx::query_as::<_, ContactRow>(
        r#"
        INSERT INTO contacts (full_name, email, phone, message, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, full_name, email, phone, message, created_at
        "#,
    )
    .bind(&contact.full_name)
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(&contact.message)
    .bind(contact.created_at.unix_timestamp())
    .fetch_one(db)
    .await?;
    Ok(row.into())
}

/// Newest first.
pub async fn list_all(db: &SqlitePool) -> Result<Vec<ContactMessage>, StoreError> {
    let rows = sqlx::query_as::<_, ContactRow>(
        r#"
        SELECT id, full_name, email, phone, message, created_at
        FROM contacts
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(ContactMessage::from).collect())
}
