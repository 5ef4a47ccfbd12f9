//! Account storage in SurrealDB.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::db::Db;
use crate::db::schema::{AccountCreate, AccountRecord};
use crate::host::{AccountStore, StoreError};
use crate::types::Email;

/// Account store for database operations.
///
/// Record keys are derived from the email, which makes creation atomic per
/// email: a racing second `CREATE` for the same key fails.
pub struct UserStore {
    db: Db,
}

impl UserStore {
    /// Create a new account store.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Record key for an email (SHA-256, hex).
    pub fn account_key(email: &Email) -> String {
        let mut hasher = Sha256::new();
        hasher.update(email.as_str().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// List all accounts, oldest first.
    pub async fn list_accounts(&self) -> Result<Vec<AccountRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM account ORDER BY created_at ASC")
            .await?;

        let accounts: Vec<AccountRecord> = res.take(0)?;
        Ok(accounts)
    }

    /// Deactivate an account. Returns false when no account has this email.
    pub async fn deactivate(&self, email: &Email) -> Result<bool> {
        self.set_active(email, false).await
    }

    /// Reactivate an account. Returns false when no account has this email.
    pub async fn reactivate(&self, email: &Email) -> Result<bool> {
        self.set_active(email, true).await
    }

    /// Change an account's display name (a user-side edit).
    pub async fn set_display_name(&self, email: &Email, display_name: &str) -> Result<bool> {
        let query = r#"
            UPDATE account SET display_name = $display_name
            WHERE email = $email
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("email", email.to_string()))
            .bind(("display_name", display_name.to_string()))
            .await?;

        let updated: Vec<AccountRecord> = res.take(0)?;
        Ok(!updated.is_empty())
    }

    async fn set_active(&self, email: &Email, active: bool) -> Result<bool> {
        let query = r#"
            UPDATE account SET is_active = $active
            WHERE email = $email
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("email", email.to_string()))
            .bind(("active", active))
            .await?;

        let updated: Vec<AccountRecord> = res.take(0)?;
        Ok(!updated.is_empty())
    }

    async fn insert_account(&self, create: &AccountCreate) -> surrealdb::Result<Vec<AccountRecord>> {
        let key = Self::account_key(&Email::new(create.email.clone()));

        let query = r#"
            CREATE type::thing("account", $key) CONTENT {
                email: $email,
                given_name: $given_name,
                family_name: $family_name,
                display_name: $display_name,
                notifications: $notifications,
                token: $account_token,
                is_active: true,
                remember_password: false,
                email_verified_at: time::now(),
                created_at: time::now(),
                last_seen_at: time::now()
            }
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("key", key))
            .bind(("email", create.email.clone()))
            .bind(("given_name", create.given_name.clone()))
            .bind(("family_name", create.family_name.clone()))
            .bind(("display_name", create.display_name.clone()))
            .bind(("notifications", create.notifications))
            .bind(("account_token", create.token.clone()))
            .await?;

        res.take(0)
    }
}

fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn is_conflict_message(msg: &str) -> bool {
    msg.contains("already exists") || msg.contains("already contains") || msg.contains("conflict")
}

#[async_trait]
impl AccountStore for UserStore {
    async fn find_by_email(&self, email: &Email) -> Result<Option<AccountRecord>, StoreError> {
        let query = r#"
            SELECT * FROM account
            WHERE email = $email
            LIMIT 1
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("email", email.to_string()))
            .await
            .map_err(backend)?;

        let accounts: Vec<AccountRecord> = res.take(0).map_err(backend)?;
        Ok(accounts.into_iter().next())
    }

    async fn create(&self, create: &AccountCreate) -> Result<AccountRecord, StoreError> {
        match self.insert_account(create).await {
            Ok(created) => created
                .into_iter()
                .next()
                .ok_or_else(|| StoreError::Backend("account create returned no record".into())),
            Err(err) => {
                let msg = err.to_string();
                if is_conflict_message(&msg) {
                    return Err(StoreError::Conflict);
                }
                // Any failure while a record for this email exists is a lost race.
                match self.find_by_email(&Email::new(create.email.clone())).await {
                    Ok(Some(_)) => Err(StoreError::Conflict),
                    _ => Err(StoreError::Backend(msg)),
                }
            }
        }
    }

    async fn touch(&self, account: &AccountRecord) -> Result<(), StoreError> {
        let query = r#"
            UPDATE account SET last_seen_at = time::now()
            WHERE id = $id
        "#;

        self.db
            .query(query)
            .bind(("id", account.id.clone()))
            .await
            .map_err(backend)?
            .check()
            .map_err(backend)?;

        Ok(())
    }

    async fn set_remember_password(&self, account: &AccountRecord) -> Result<(), StoreError> {
        let query = r#"
            UPDATE account SET remember_password = true
            WHERE id = $id
        "#;

        self.db
            .query(query)
            .bind(("id", account.id.clone()))
            .await
            .map_err(backend)?
            .check()
            .map_err(backend)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::db::{DatabaseConfig, NotificationPrefs, create_connection, ensure_schema};

    async fn setup_test_db() -> Db {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        db
    }

    fn create_for(email: &str) -> AccountCreate {
        AccountCreate::from_identity(
            &Identity::new(Email::new(email), "Test", "User"),
            NotificationPrefs::default(),
        )
    }

    #[tokio::test]
    async fn test_create_account() {
        let store = UserStore::new(setup_test_db().await);

        let account = store.create(&create_for("test@example.com")).await.unwrap();

        assert_eq!(account.email, "test@example.com");
        assert_eq!(account.display_name, "Test User");
        assert!(account.is_active);
        assert!(!account.remember_password);
        assert!(account.email_verified_at.is_some());
        assert_eq!(account.notifications, NotificationPrefs::default());
        assert_eq!(account.token.len(), 32);
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let store = UserStore::new(setup_test_db().await);
        let created = store.create(&create_for("test@example.com")).await.unwrap();

        let found = store
            .find_by_email(&Email::new("test@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);

        let missing = store
            .find_by_email(&Email::new("other@example.com"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let store = UserStore::new(setup_test_db().await);
        store.create(&create_for("test@example.com")).await.unwrap();

        let err = store.create(&create_for("test@example.com")).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict);
        assert_eq!(store.list_accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_account_deactivation() {
        let store = UserStore::new(setup_test_db().await);
        let email = Email::new("test@example.com");
        store.create(&create_for(email.as_str())).await.unwrap();

        assert!(store.deactivate(&email).await.unwrap());
        let updated = store.find_by_email(&email).await.unwrap().unwrap();
        assert!(!updated.is_active);

        assert!(store.reactivate(&email).await.unwrap());
        let reactivated = store.find_by_email(&email).await.unwrap().unwrap();
        assert!(reactivated.is_active);

        assert!(!store.deactivate(&Email::new("nobody@example.com")).await.unwrap());
    }

    #[tokio::test]
    async fn test_remember_password() {
        let store = UserStore::new(setup_test_db().await);
        let account = store.create(&create_for("test@example.com")).await.unwrap();

        store.set_remember_password(&account).await.unwrap();
        store.touch(&account).await.unwrap();

        let updated = store
            .find_by_email(&Email::new("test@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert!(updated.remember_password);
        assert_eq!(updated.display_name, "Test User");
    }

    #[test]
    fn test_account_key() {
        let k1 = UserStore::account_key(&Email::new("a@x.com"));
        let k2 = UserStore::account_key(&Email::new("a@x.com"));
        let k3 = UserStore::account_key(&Email::new("b@x.com"));

        assert!(k1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(k1.len(), 64);
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }
}
