//! Host login form backed by the account store.
//!
//! Passwords are never checked: the proxy already authenticated the user.
//! The form still insists on an anti-forgery token, so the first submission
//! for an identity is always answered with `NeedsToken`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::auth::Identity;
use crate::host::{AccountStore, LoginCode, LoginHandshake, LoginOutcome};
use crate::types::{Email, LoginToken};

pub struct TokenLoginHandshake {
    accounts: Arc<dyn AccountStore>,
    /// Issued tokens and the email each was issued for. Single use.
    pending: Mutex<HashMap<LoginToken, Email>>,
}

impl TokenLoginHandshake {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self {
            accounts,
            pending: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl LoginHandshake for TokenLoginHandshake {
    async fn submit(&self, identity: &Identity, token: Option<&LoginToken>) -> LoginOutcome {
        let email = identity.email();
        if email.as_str().is_empty() {
            return LoginOutcome::Failure(LoginCode::NoName);
        }

        let account = match self.accounts.find_by_email(email).await {
            Ok(Some(account)) => account,
            Ok(None) => return LoginOutcome::Failure(LoginCode::NotExists),
            Err(err) => {
                tracing::warn!(error = %err, "account lookup failed during login");
                return LoginOutcome::Failure(LoginCode::Aborted);
            }
        };

        if !account.is_active {
            return LoginOutcome::Failure(LoginCode::UserBlocked);
        }

        let mut pending = self.pending.lock().await;
        match token {
            None => {
                let fresh = LoginToken::new(uuid::Uuid::new_v4().simple().to_string());
                pending.insert(fresh.clone(), email.clone());
                LoginOutcome::NeedsToken(fresh)
            }
            Some(token) => match pending.remove(token) {
                Some(issued_for) if &issued_for == email => LoginOutcome::Success,
                _ => LoginOutcome::Failure(LoginCode::WrongToken),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserStore;
    use crate::db::{AccountCreate, DatabaseConfig, NotificationPrefs, create_connection, ensure_schema};

    async fn setup() -> (Arc<UserStore>, TokenLoginHandshake) {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        let store = Arc::new(UserStore::new(db));
        let handshake = TokenLoginHandshake::new(store.clone());
        (store, handshake)
    }

    fn identity() -> Identity {
        Identity::new(Email::new("a@x.com"), "A", "B")
    }

    #[tokio::test]
    async fn test_first_submit_needs_token_then_succeeds() {
        let (store, handshake) = setup().await;
        store
            .create(&AccountCreate::from_identity(&identity(), NotificationPrefs::default()))
            .await
            .unwrap();

        let token = match handshake.submit(&identity(), None).await {
            LoginOutcome::NeedsToken(token) => token,
            other => panic!("expected NeedsToken, got {:?}", other),
        };

        assert_eq!(
            handshake.submit(&identity(), Some(&token)).await,
            LoginOutcome::Success
        );
    }

    #[tokio::test]
    async fn test_token_is_single_use() {
        let (store, handshake) = setup().await;
        store
            .create(&AccountCreate::from_identity(&identity(), NotificationPrefs::default()))
            .await
            .unwrap();

        let LoginOutcome::NeedsToken(token) = handshake.submit(&identity(), None).await else {
            panic!("expected NeedsToken");
        };
        assert_eq!(
            handshake.submit(&identity(), Some(&token)).await,
            LoginOutcome::Success
        );
        assert_eq!(
            handshake.submit(&identity(), Some(&token)).await,
            LoginOutcome::Failure(LoginCode::WrongToken)
        );
    }

    #[tokio::test]
    async fn test_wrong_token() {
        let (store, handshake) = setup().await;
        store
            .create(&AccountCreate::from_identity(&identity(), NotificationPrefs::default()))
            .await
            .unwrap();

        handshake.submit(&identity(), None).await;
        assert_eq!(
            handshake
                .submit(&identity(), Some(&LoginToken::new("forged")))
                .await,
            LoginOutcome::Failure(LoginCode::WrongToken)
        );
    }

    #[tokio::test]
    async fn test_interleaved_logins_for_same_email() {
        let (store, handshake) = setup().await;
        store
            .create(&AccountCreate::from_identity(&identity(), NotificationPrefs::default()))
            .await
            .unwrap();

        let LoginOutcome::NeedsToken(first) = handshake.submit(&identity(), None).await else {
            panic!("expected NeedsToken");
        };
        let LoginOutcome::NeedsToken(second) = handshake.submit(&identity(), None).await else {
            panic!("expected NeedsToken");
        };

        assert_eq!(
            handshake.submit(&identity(), Some(&first)).await,
            LoginOutcome::Success
        );
        assert_eq!(
            handshake.submit(&identity(), Some(&second)).await,
            LoginOutcome::Success
        );
    }

    #[tokio::test]
    async fn test_token_bound_to_email() {
        let (store, handshake) = setup().await;
        let other = Identity::new(Email::new("c@x.com"), "C", "D");
        for id in [identity(), other.clone()] {
            store
                .create(&AccountCreate::from_identity(&id, NotificationPrefs::default()))
                .await
                .unwrap();
        }

        let LoginOutcome::NeedsToken(token) = handshake.submit(&identity(), None).await else {
            panic!("expected NeedsToken");
        };
        assert_eq!(
            handshake.submit(&other, Some(&token)).await,
            LoginOutcome::Failure(LoginCode::WrongToken)
        );
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let (_store, handshake) = setup().await;
        assert_eq!(
            handshake.submit(&identity(), None).await,
            LoginOutcome::Failure(LoginCode::NotExists)
        );
    }

    #[tokio::test]
    async fn test_deactivated_account_is_blocked() {
        let (store, handshake) = setup().await;
        store
            .create(&AccountCreate::from_identity(&identity(), NotificationPrefs::default()))
            .await
            .unwrap();
        assert!(store.deactivate(identity().email()).await.unwrap());

        assert_eq!(
            handshake.submit(&identity(), None).await,
            LoginOutcome::Failure(LoginCode::UserBlocked)
        );
    }
}
