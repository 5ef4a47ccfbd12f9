use serde::{Deserialize, Serialize};
use surrealdb::{RecordId, sql::Datetime};

use crate::auth::Identity;
use crate::types::Email;

/// E-mail notification flags stored on an account.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationPrefs {
    /// Notify on changes to watched pages
    pub watchlist_pages: bool,
    /// Notify on changes to the user's talk page
    pub user_talk_pages: bool,
    /// Also notify for minor edits
    pub minor_edits: bool,
    /// Reveal the user's address in notification mails
    pub reveal_address: bool,
}

impl NotificationPrefs {
    /// All four notification flags switched on.
    pub fn all_enabled() -> Self {
        Self {
            watchlist_pages: true,
            user_talk_pages: true,
            minor_edits: true,
            reveal_address: true,
        }
    }

    pub fn for_new_account(notify_on_account_creation: bool) -> Self {
        if notify_on_account_creation {
            Self::all_enabled()
        } else {
            Self::default()
        }
    }
}

/// Persisted account bound to a proxy identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Database identifier (table: `account`, key derived from the email)
    pub id: RecordId,
    pub email: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    /// Display name; set once at creation and never overwritten by the resolver
    pub display_name: String,
    /// Emails come from the proxy, so they are verified at creation
    pub email_verified_at: Option<Datetime>,
    #[serde(default)]
    pub notifications: NotificationPrefs,
    /// Random per-account token
    pub token: String,
    pub is_active: bool,
    /// Set after the first successful login
    #[serde(default)]
    pub remember_password: bool,
    pub created_at: Option<Datetime>,
    pub last_seen_at: Option<Datetime>,
}

impl AccountRecord {
    /// The identity this account was created for.
    pub fn identity(&self) -> Identity {
        Identity::new(
            Email::new(self.email.clone()),
            self.given_name.clone(),
            self.family_name.clone(),
        )
    }
}

/// Payload for creating a new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountCreate {
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub display_name: String,
    pub notifications: NotificationPrefs,
    pub token: String,
}

impl AccountCreate {
    pub fn from_identity(identity: &Identity, notifications: NotificationPrefs) -> Self {
        Self {
            email: identity.email().to_string(),
            given_name: identity.given_name().to_string(),
            family_name: identity.family_name().to_string(),
            display_name: identity.display_name(),
            notifications,
            token: uuid::Uuid::new_v4().simple().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_prefs_for_new_account() {
        assert_eq!(
            NotificationPrefs::for_new_account(false),
            NotificationPrefs::default()
        );
        let on = NotificationPrefs::for_new_account(true);
        assert!(on.watchlist_pages && on.user_talk_pages && on.minor_edits && on.reveal_address);
    }

    #[test]
    fn test_account_create_from_identity() {
        let identity = Identity::new(Email::new("a@x.com"), "A", "B");
        let create = AccountCreate::from_identity(&identity, NotificationPrefs::default());

        assert_eq!(create.email, "a@x.com");
        assert_eq!(create.display_name, "A B");
        assert_eq!(create.token.len(), 32);
        assert!(create.token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
