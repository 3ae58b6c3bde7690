use async_trait::async_trait;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::auth::repo_types::{NewUser, User, UserRow};
use crate::error::StoreError;

const USER_COLUMNS: &str = "id, full_name, email, mobile, password_hash, reset_token, reset_token_expiry, created_at";

/// Persistence for users and their pending reset tokens.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fails with [`StoreError::DuplicateEmail`] when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn set_reset_token(
        &self,
        email: &str,
        token: &str,
        expiry: OffsetDateTime,
    ) -> Result<(), StoreError>;
    /// User holding `token`, provided it expires strictly after `now`.
    async fn find_by_valid_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;
    /// Stores the new hash and clears the reset token, but only while `token`
    /// is still pending and unexpired for `email`. Returns whether a row changed.
    async fn update_password(
        &self,
        email: &str,
        password_hash: &str,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError>;
    /// Newest first.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
}

#[derive(Clone)]
pub struct SqliteCredentialStore {
    db: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (full_name, email, mobile, password_hash, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.mobile)
        .bind(&user.password_hash)
        .bind(user.created_at.unix_timestamp())
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::from))
    }

    async fn set_reset_token(
        &self,
        email: &str,
        token: &str,
        expiry: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token = ?, reset_token_expiry = ?
            WHERE email = ?
            "#,
        )
        .bind(token)
        .bind(expiry.unix_timestamp())
        .bind(email)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_by_valid_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE reset_token = ? AND reset_token_expiry > ?
            "#
        ))
        .bind(token)
        .bind(now.unix_timestamp())
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::from))
    }

    async fn update_password(
        &self,
        email: &str,
        password_hash: &str,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, reset_token = NULL, reset_token_expiry = NULL
            WHERE email = ? AND reset_token = ? AND reset_token_expiry > ?
            "#,
        )
        .bind(password_hash)
        .bind(email)
        .bind(token)
        .bind(now.unix_timestamp())
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
