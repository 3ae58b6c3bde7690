use std::sync::Arc;

use anyhow::anyhow;
use time::{Duration, OffsetDateTime};
use tracing::{debug, error, info, warn};

use crate::auth::{
    errors::AccountError,
    password::{hash_password, verify_password},
    repo::CredentialStore,
    repo_types::{NewUser, PublicUser},
    reset_token,
    validation::{
        check_password_strength, is_valid_email, is_valid_full_name, is_valid_login_email,
        mobile_digits, MOBILE_DIGITS,
    },
};
use crate::clock::Clock;
use crate::config::ResetConfig;

#[derive(Debug, Clone, Copy)]
pub struct ResetPolicy {
    pub token_ttl: Duration,
    pub enforce_password_rules: bool,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self {
            token_ttl: Duration::hours(24),
            enforce_password_rules: true,
        }
    }
}

impl From<&ResetConfig> for ResetPolicy {
    fn from(cfg: &ResetConfig) -> Self {
        Self {
            token_ttl: Duration::seconds(cfg.ttl_hours.saturating_mul(3600)),
            enforce_password_rules: cfg.enforce_password_rules,
        }
    }
}

/// A freshly issued reset token; the caller embeds it in a link.
#[derive(Debug, Clone)]
pub struct IssuedReset {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Registration, login and password-reset flows over an injected store.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    policy: ResetPolicy,
}

/// Emails are compared trimmed and lowercased everywhere.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AccountService {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>, policy: ResetPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub async fn register(
        &self,
        full_name: &str,
        email: &str,
        mobile: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<PublicUser, AccountError> {
        let full_name = full_name.trim();
        let email = normalize_email(email);
        let mobile = mobile.trim();

        if [full_name, email.as_str(), mobile, password, confirm_password]
            .iter()
            .any(|v| v.is_empty())
        {
            return Err(AccountError::validation("All fields are required"));
        }
        if !is_valid_full_name(full_name) {
            return Err(AccountError::validation(
                "Please enter a valid name (letters and spaces only, min 2 chars)",
            ));
        }
        if !is_valid_email(&email) {
            return Err(AccountError::validation("Invalid email format"));
        }
        if mobile_digits(mobile).len() != MOBILE_DIGITS {
            return Err(AccountError::validation("Mobile number must contain 10 digits"));
        }
        if password != confirm_password {
            return Err(AccountError::validation("Passwords do not match"));
        }
        check_password_strength(password).map_err(AccountError::Validation)?;

        let password_hash = hash_password(password)?;
        let user = self
            .store
            .create_user(NewUser {
                full_name: full_name.to_string(),
                email,
                mobile: mobile.to_string(),
                password_hash,
                created_at: self.clock.now(),
            })
            .await?;

        info!(user_id = user.id, "user registered");
        Ok(user.into())
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<PublicUser, AccountError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AccountError::validation("Email and password are required"));
        }
        if !is_valid_login_email(&email) {
            return Err(AccountError::validation("Invalid email format"));
        }

        let Some(user) = self.store.find_by_email(&email).await? else {
            warn!("login for unknown email");
            return Err(AccountError::InvalidCredentials);
        };
        match verify_password(password, &user.password_hash) {
            Ok(true) => {}
            Ok(false) => {
                warn!(user_id = user.id, "login with wrong password");
                return Err(AccountError::InvalidCredentials);
            }
            Err(e) => {
                error!(user_id = user.id, error = %e, "stored password hash is unreadable");
                return Err(AccountError::InvalidCredentials);
            }
        }

        info!(user_id = user.id, "user authenticated");
        Ok(user.into())
    }

    /// `Ok(None)` when nobody owns the email; callers must answer the same
    /// way in both cases.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<IssuedReset>, AccountError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AccountError::validation("Please enter your email"));
        }

        let Some(user) = self.store.find_by_email(&email).await? else {
            debug!("password reset requested for unknown email");
            return Ok(None);
        };

        let token = reset_token::generate();
        // Whole seconds, matching the stored expiry exactly.
        let expires_at = self
            .clock
            .now()
            .checked_add(self.policy.token_ttl)
            .and_then(|at| at.replace_nanosecond(0).ok())
            .ok_or_else(|| anyhow!("reset token expiry out of range"))?;
        self.store
            .set_reset_token(&user.email, &token, expires_at)
            .await?;

        info!(user_id = user.id, %expires_at, "password reset issued");
        Ok(Some(IssuedReset { token, expires_at }))
    }

    pub async fn redeem_password_reset(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<PublicUser, AccountError> {
        if token.is_empty() {
            return Err(AccountError::InvalidToken);
        }
        let now = self.clock.now();
        let Some(user) = self.store.find_by_valid_token(token, now).await? else {
            warn!("invalid or expired reset token");
            return Err(AccountError::InvalidToken);
        };

        if new_password.is_empty() || confirm_password.is_empty() {
            return Err(AccountError::validation("Please enter both passwords"));
        }
        if new_password != confirm_password {
            return Err(AccountError::validation("Passwords do not match"));
        }
        if self.policy.enforce_password_rules {
            check_password_strength(new_password).map_err(AccountError::Validation)?;
        }

        let password_hash = hash_password(new_password)?;
        // Guarded on the token, so a concurrent redemption matches no row.
        if !self
            .store
            .update_password(&user.email, &password_hash, token, now)
            .await?
        {
            warn!(user_id = user.id, "reset token consumed concurrently");
            return Err(AccountError::InvalidToken);
        }

        info!(user_id = user.id, "password reset completed");
        Ok(user.into())
    }

    pub async fn profile(&self, user_id: i64) -> Result<PublicUser, AccountError> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(PublicUser::from)
            .ok_or(AccountError::InvalidCredentials)
    }

    pub async fn list_users(&self) -> Result<Vec<PublicUser>, AccountError> {
        let users = self.store.list_users().await?;
        Ok(users.into_iter().map(PublicUser::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::SqliteCredentialStore;
    use crate::auth::repo_types::User;
    use crate::clock::ManualClock;
    use crate::error::StoreError;
    use async_trait::async_trait;
    use time::macros::datetime;

    const START: OffsetDateTime = datetime!(2026-03-01 09:00 UTC);

    struct Harness {
        service: AccountService,
        store: Arc<SqliteCredentialStore>,
        clock: Arc<ManualClock>,
    }

    async fn harness_with(policy: ResetPolicy) -> Harness {
        let store = Arc::new(SqliteCredentialStore::new(crate::db::memory_pool().await));
        let clock = Arc::new(ManualClock::new(START));
        let service = AccountService::new(store.clone(), clock.clone(), policy);
        Harness {
            service,
            store,
            clock,
        }
    }

    async fn harness() -> Harness {
        harness_with(ResetPolicy::default()).await
    }

    async fn register_jane(svc: &AccountService) -> PublicUser {
        svc.register("Jane Doe", "jane@x.com", "5551234567", "Abcd123!", "Abcd123!")
            .await
            .expect("registration should succeed")
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let h = harness().await;
        let jane = register_jane(&h.service).await;
        assert_eq!(jane.full_name, "Jane Doe");
        assert_eq!(jane.created_at, START);

        let authed = h.service.authenticate("jane@x.com", "Abcd123!").await.unwrap();
        assert_eq!(authed.id, jane.id);

        let err = h.service.authenticate("jane@x.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
    }

    #[tokio::test]
    async fn stored_hash_is_not_the_password() {
        let h = harness().await;
        register_jane(&h.service).await;
        let stored = h.store.find_by_email("jane@x.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "Abcd123!");
        assert!(verify_password("Abcd123!", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn unreadable_stored_hash_is_invalid_credentials() {
        let h = harness().await;
        h.store
            .create_user(NewUser {
                full_name: "Jane Doe".into(),
                email: "jane@x.com".into(),
                mobile: "5551234567".into(),
                password_hash: "not-a-phc-string".into(),
                created_at: START,
            })
            .await
            .unwrap();
        let err = h.service.authenticate("jane@x.com", "Abcd123!").await.unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
    }

    #[tokio::test]
    async fn issued_expiry_matches_stored_expiry_with_subsecond_clock() {
        let store = Arc::new(SqliteCredentialStore::new(crate::db::memory_pool().await));
        let start = datetime!(2026-03-01 09:00:00.9 UTC);
        let clock = Arc::new(ManualClock::new(start));
        let service = AccountService::new(store.clone(), clock.clone(), ResetPolicy::default());
        register_jane(&service).await;

        let issued = service
            .request_password_reset("jane@x.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(issued.expires_at, datetime!(2026-03-02 09:00:00 UTC));
        let stored = store.find_by_email("jane@x.com").await.unwrap().unwrap();
        assert_eq!(stored.reset_token_expiry, Some(issued.expires_at));

        // Still valid a moment before the advertised expiry.
        clock.advance(issued.expires_at - Duration::milliseconds(100) - start);
        assert!(clock.now() < issued.expires_at);
        assert!(service
            .redeem_password_reset(&issued.token, "Newpass1!", "Newpass1!")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn out_of_range_expiry_is_an_error_not_a_panic() {
        let h = harness_with(ResetPolicy {
            token_ttl: Duration::MAX,
            ..ResetPolicy::default()
        })
        .await;
        register_jane(&h.service).await;
        let err = h.service.request_password_reset("jane@x.com").await.unwrap_err();
        assert!(matches!(err, AccountError::Internal(_)));
        let stored = h.store.find_by_email("jane@x.com").await.unwrap().unwrap();
        assert!(stored.reset_token.is_none());
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let h = harness().await;
        register_jane(&h.service).await;
        let unknown = h.service.authenticate("nobody@x.com", "Abcd123!").await.unwrap_err();
        let wrong = h.service.authenticate("jane@x.com", "Abcd1234!").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn emails_are_case_insensitive() {
        let h = harness().await;
        register_jane(&h.service).await;
        assert!(h.service.authenticate("  JANE@X.com ", "Abcd123!").await.is_ok());
        let err = h
            .service
            .register("Jane Two", "Jane@X.COM", "5551234567", "Abcd123!", "Abcd123!")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::DuplicateEmail));
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_first_record() {
        let h = harness().await;
        let first = register_jane(&h.service).await;
        let err = h
            .service
            .register("Other Person", "jane@x.com", "5559876543", "Zyxw987?", "Zyxw987?")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::DuplicateEmail));

        let stored = h.store.find_by_email("jane@x.com").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.full_name, "Jane Doe");
        assert!(h.service.authenticate("jane@x.com", "Abcd123!").await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_registrations_yield_one_winner() {
        let h = harness().await;
        let (a, b) = tokio::join!(
            h.service
                .register("Jane Doe", "jane@x.com", "5551234567", "Abcd123!", "Abcd123!"),
            h.service
                .register("Jane Doe", "jane@x.com", "5551234567", "Abcd123!", "Abcd123!"),
        );
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AccountError::DuplicateEmail))));
    }

    #[tokio::test]
    async fn registration_validation() {
        let h = harness().await;
        let svc = &h.service;
        let cases = [
            ("", "jane@x.com", "5551234567", "Abcd123!", "Abcd123!", "All fields are required"),
            ("J", "jane@x.com", "5551234567", "Abcd123!", "Abcd123!", "valid name"),
            ("Jane Doe", "jane@x", "5551234567", "Abcd123!", "Abcd123!", "Invalid email"),
            ("Jane Doe", "jane@x.com", "555-1234", "Abcd123!", "Abcd123!", "10 digits"),
            ("Jane Doe", "jane@x.com", "5551234567", "Abcd123!", "Abcd123?", "do not match"),
            ("Jane Doe", "jane@x.com", "5551234567", "abcd1234", "abcd1234", "uppercase"),
        ];
        for (name, email, mobile, pw, confirm, expected) in cases {
            match svc.register(name, email, mobile, pw, confirm).await {
                Err(AccountError::Validation(msg)) => {
                    assert!(msg.contains(expected), "{msg:?} should mention {expected:?}")
                }
                other => panic!("expected validation error for {name:?}/{email:?}, got {other:?}"),
            }
        }
        assert!(svc.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn formatted_mobile_is_accepted() {
        let h = harness().await;
        let user = h
            .service
            .register("Jane Doe", "jane@x.com", "(555) 123-4567", "Abcd123!", "Abcd123!")
            .await
            .unwrap();
        assert_eq!(user.mobile, "(555) 123-4567");
    }

    #[tokio::test]
    async fn authenticate_validation() {
        let h = harness().await;
        for (email, pw) in [("", "x"), ("jane@x.com", ""), ("not-an-email", "Abcd123!")] {
            let err = h.service.authenticate(email, pw).await.unwrap_err();
            assert!(matches!(err, AccountError::Validation(_)), "{email:?}");
        }
    }

    #[tokio::test]
    async fn reset_for_unknown_email_writes_nothing() {
        let h = harness().await;
        register_jane(&h.service).await;
        let issued = h.service.request_password_reset("nobody@x.com").await.unwrap();
        assert!(issued.is_none());
        let users = h.store.list_users().await.unwrap();
        assert!(users.iter().all(|u| u.reset_token.is_none()));
    }

    #[tokio::test]
    async fn reset_flow_changes_password_once() {
        let h = harness().await;
        let jane = register_jane(&h.service).await;

        let issued = h
            .service
            .request_password_reset("jane@x.com")
            .await
            .unwrap()
            .expect("token for registered user");
        assert_eq!(issued.expires_at, START + Duration::hours(24));

        let stored: User = h.store.find_by_email("jane@x.com").await.unwrap().unwrap();
        assert_eq!(stored.reset_token.as_deref(), Some(issued.token.as_str()));
        assert_eq!(stored.reset_token_expiry, Some(issued.expires_at));

        let user = h
            .service
            .redeem_password_reset(&issued.token, "Newpass1!", "Newpass1!")
            .await
            .unwrap();
        assert_eq!(user.id, jane.id);

        assert!(h.service.authenticate("jane@x.com", "Newpass1!").await.is_ok());
        assert!(matches!(
            h.service.authenticate("jane@x.com", "Abcd123!").await,
            Err(AccountError::InvalidCredentials)
        ));

        let again = h
            .service
            .redeem_password_reset(&issued.token, "Other123!", "Other123!")
            .await
            .unwrap_err();
        assert!(matches!(again, AccountError::InvalidToken));

        let cleared = h.store.find_by_email("jane@x.com").await.unwrap().unwrap();
        assert!(cleared.reset_token.is_none());
        assert!(cleared.reset_token_expiry.is_none());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let h = harness().await;
        register_jane(&h.service).await;
        let issued = h
            .service
            .request_password_reset("jane@x.com")
            .await
            .unwrap()
            .unwrap();

        h.clock.advance(Duration::hours(24));
        let err = h
            .service
            .redeem_password_reset(&issued.token, "Newpass1!", "Newpass1!")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidToken));
        assert!(h.service.authenticate("jane@x.com", "Abcd123!").await.is_ok());
    }

    #[tokio::test]
    async fn token_still_valid_just_before_expiry() {
        let h = harness().await;
        register_jane(&h.service).await;
        let issued = h
            .service
            .request_password_reset("jane@x.com")
            .await
            .unwrap()
            .unwrap();
        h.clock.advance(Duration::hours(24) - Duration::seconds(1));
        assert!(h
            .service
            .redeem_password_reset(&issued.token, "Newpass1!", "Newpass1!")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn new_request_replaces_pending_token() {
        let h = harness().await;
        register_jane(&h.service).await;
        let first = h.service.request_password_reset("jane@x.com").await.unwrap().unwrap();
        let second = h.service.request_password_reset("jane@x.com").await.unwrap().unwrap();
        assert_ne!(first.token, second.token);
        assert!(matches!(
            h.service
                .redeem_password_reset(&first.token, "Newpass1!", "Newpass1!")
                .await,
            Err(AccountError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn concurrent_redemptions_yield_one_winner() {
        let h = harness().await;
        register_jane(&h.service).await;
        let issued = h.service.request_password_reset("jane@x.com").await.unwrap().unwrap();
        let (a, b) = tokio::join!(
            h.service
                .redeem_password_reset(&issued.token, "Newpass1!", "Newpass1!"),
            h.service
                .redeem_password_reset(&issued.token, "Other123!", "Other123!"),
        );
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AccountError::InvalidToken))));
    }

    #[tokio::test]
    async fn redeem_validation_keeps_token_pending() {
        let h = harness().await;
        register_jane(&h.service).await;
        let issued = h.service.request_password_reset("jane@x.com").await.unwrap().unwrap();

        for (pw, confirm) in [("", ""), ("Newpass1!", "Newpass2!"), ("weak", "weak")] {
            let err = h
                .service
                .redeem_password_reset(&issued.token, pw, confirm)
                .await
                .unwrap_err();
            assert!(matches!(err, AccountError::Validation(_)), "{pw:?}");
        }
        assert!(h
            .service
            .redeem_password_reset(&issued.token, "Newpass1!", "Newpass1!")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn relaxed_policy_allows_weak_reset_password() {
        let h = harness_with(ResetPolicy {
            enforce_password_rules: false,
            ..ResetPolicy::default()
        })
        .await;
        register_jane(&h.service).await;
        let issued = h.service.request_password_reset("jane@x.com").await.unwrap().unwrap();
        h.service
            .redeem_password_reset(&issued.token, "weak", "weak")
            .await
            .unwrap();
        assert!(h.service.authenticate("jane@x.com", "weak").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let h = harness().await;
        register_jane(&h.service).await;
        for token in ["", "not-a-token"] {
            let err = h
                .service
                .redeem_password_reset(token, "Newpass1!", "Newpass1!")
                .await
                .unwrap_err();
            assert!(matches!(err, AccountError::InvalidToken));
        }
    }

    #[tokio::test]
    async fn profile_and_listing() {
        let h = harness().await;
        let jane = register_jane(&h.service).await;
        h.clock.advance(Duration::minutes(1));
        let john = h
            .service
            .register("John Roe", "john@x.com", "5550001111", "Abcd123!", "Abcd123!")
            .await
            .unwrap();

        assert_eq!(h.service.profile(jane.id).await.unwrap(), jane);
        assert!(matches!(
            h.service.profile(9999).await,
            Err(AccountError::InvalidCredentials)
        ));
        let ids: Vec<_> = h.service.list_users().await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![john.id, jane.id]);
    }

    struct BrokenStore;

    #[async_trait]
    impl CredentialStore for BrokenStore {
        async fn create_user(&self, _u: NewUser) -> Result<User, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn find_by_email(&self, _e: &str) -> Result<Option<User>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn find_by_id(&self, _id: i64) -> Result<Option<User>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn set_reset_token(
            &self,
            _e: &str,
            _t: &str,
            _x: OffsetDateTime,
        ) -> Result<(), StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn find_by_valid_token(
            &self,
            _t: &str,
            _n: OffsetDateTime,
        ) -> Result<Option<User>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn update_password(
            &self,
            _e: &str,
            _h: &str,
            _t: &str,
            _n: OffsetDateTime,
        ) -> Result<bool, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn list_users(&self) -> Result<Vec<User>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
    }

    #[tokio::test]
    async fn storage_failures_surface_as_storage_errors() {
        let svc = AccountService::new(
            Arc::new(BrokenStore),
            Arc::new(ManualClock::new(START)),
            ResetPolicy::default(),
        );
        assert!(matches!(
            svc.authenticate("jane@x.com", "Abcd123!").await,
            Err(AccountError::Storage(_))
        ));
        assert!(matches!(
            svc.request_password_reset("jane@x.com").await,
            Err(AccountError::Storage(_))
        ));
        assert!(matches!(
            svc.register("Jane Doe", "jane@x.com", "5551234567", "Abcd123!", "Abcd123!")
                .await,
            Err(AccountError::Storage(_))
        ));
    }
}
