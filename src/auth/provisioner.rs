//! Idempotent account provisioning.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::error::AuthError;
use crate::auth::extractor::Identity;
use crate::db::{AccountCreate, AccountRecord, NotificationPrefs};
use crate::host::{AccountStore, StoreError};

/// Bound on find/create rounds when creates keep losing races.
const MAX_PROVISION_ATTEMPTS: usize = 3;

/// Finds or creates the account for an identity.
#[derive(Clone)]
pub struct AccountProvisioner {
    accounts: Arc<dyn AccountStore>,
    notify_on_account_creation: bool,
}

impl AccountProvisioner {
    pub fn new(accounts: Arc<dyn AccountStore>, notify_on_account_creation: bool) -> Self {
        Self {
            accounts,
            notify_on_account_creation,
        }
    }

    /// Return the account for `identity`, creating it on first sight.
    ///
    /// An existing account is returned unchanged apart from its last-seen
    /// time. A create that loses a race is followed by a re-fetch.
    pub async fn provision_or_find(&self, identity: &Identity) -> Result<AccountRecord, AuthError> {
        let email = identity.email();

        for attempt in 1..=MAX_PROVISION_ATTEMPTS {
            if let Some(account) = self.accounts.find_by_email(email).await? {
                if let Err(err) = self.accounts.touch(&account).await {
                    warn!(email = %email, error = %err, "failed to update last_seen_at");
                }
                return Ok(account);
            }

            let create = AccountCreate::from_identity(
                identity,
                NotificationPrefs::for_new_account(self.notify_on_account_creation),
            );

            match self.accounts.create(&create).await {
                Ok(account) => {
                    info!(
                        email = %email,
                        display_name = %account.display_name,
                        "account created"
                    );
                    return Ok(account);
                }
                Err(StoreError::Conflict) => {
                    debug!(email = %email, attempt, "account created concurrently, re-fetching");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AuthError::AccountCreateConflict)
    }
}
