//! User context for request-scoped identity.

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use crate::auth::extractor::Identity;
use crate::db::AccountRecord;
use crate::types::Email;

/// User context bound to a session.
///
/// Built from the account the proxy identity resolved to. It is immutable
/// once created and travels in request extensions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserContext {
    /// Database record ID of the account
    account_id: RecordId,
    /// Identity the account was created for
    identity: Identity,
    /// Account display name (may differ from the header names)
    display_name: String,
}

impl UserContext {
    pub fn new(account_id: RecordId, identity: Identity, display_name: impl Into<String>) -> Self {
        Self {
            account_id,
            identity,
            display_name: display_name.into(),
        }
    }

    pub fn from_account(account: &AccountRecord) -> Self {
        Self::new(
            account.id.clone(),
            account.identity(),
            account.display_name.clone(),
        )
    }

    pub fn account_id(&self) -> &RecordId {
        &self.account_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn email(&self) -> &Email {
        self.identity.email()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Display-friendly name: the display name, or the email when it is empty.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.identity.email().to_string()
        } else {
            self.display_name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_account_id() -> RecordId {
        RecordId::from_table_key("account", "test123")
    }

    #[test]
    fn test_user_context_new() {
        let identity = Identity::new(Email::new("a@x.com"), "A", "B");
        let ctx = UserContext::new(test_account_id(), identity.clone(), "A B");

        assert_eq!(ctx.email().as_str(), "a@x.com");
        assert_eq!(ctx.identity(), &identity);
        assert_eq!(ctx.display_name(), "A B");
        assert_eq!(ctx.account_id(), &test_account_id());
    }

    #[test]
    fn test_user_context_display_falls_back_to_email() {
        let ctx = UserContext::new(
            test_account_id(),
            Identity::new(Email::new("a@x.com"), "", ""),
            "",
        );
        assert_eq!(ctx.display(), "a@x.com");
    }
}
