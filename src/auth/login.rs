//! Login handshake with a single token retry.
//!
//! ```text
//! Start -> Attempting -> Success
//!                     -> Failure(code)
//!                     -> NeedsToken -> Attempting -> Success
//!                                                 -> Failure(code)
//!                                                 -> NeedsToken => Failure(NeedToken)
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::auth::context::UserContext;
use crate::auth::error::AuthError;
use crate::auth::extractor::Identity;
use crate::db::AccountRecord;
use crate::host::{AccountStore, LoginCode, LoginHandshake, LoginOutcome, SessionStore};
use crate::types::{LoginToken, SessionKey};

/// Retries allowed per request after a token challenge.
pub const MAX_TOKEN_RETRIES: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    NeedsToken,
    Failure(LoginCode),
}

/// State of the handshake for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    /// Token echoed on the next submission
    pub token: Option<LoginToken>,
    pub retry_count: u32,
    pub outcome: AttemptOutcome,
}

impl LoginAttempt {
    fn start() -> Self {
        Self {
            token: None,
            retry_count: 0,
            outcome: AttemptOutcome::NeedsToken,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

/// Drives the host login handshake and binds the session on success.
#[derive(Clone)]
pub struct LoginCoordinator {
    login: Arc<dyn LoginHandshake>,
    sessions: Arc<dyn SessionStore>,
    accounts: Arc<dyn AccountStore>,
}

impl LoginCoordinator {
    pub fn new(
        login: Arc<dyn LoginHandshake>,
        sessions: Arc<dyn SessionStore>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            login,
            sessions,
            accounts,
        }
    }

    /// Run the handshake to a terminal outcome.
    ///
    /// At most `1 + MAX_TOKEN_RETRIES` submissions are made. A token
    /// challenge on the last allowed submission is a failure.
    pub async fn attempt(&self, identity: &Identity) -> LoginAttempt {
        let mut attempt = LoginAttempt::start();

        loop {
            match self.login.submit(identity, attempt.token.as_ref()).await {
                LoginOutcome::Success => {
                    attempt.outcome = AttemptOutcome::Success;
                    return attempt;
                }
                LoginOutcome::Failure(code) => {
                    attempt.outcome = AttemptOutcome::Failure(code);
                    return attempt;
                }
                LoginOutcome::NeedsToken(_) if attempt.retry_count >= MAX_TOKEN_RETRIES => {
                    attempt.outcome = AttemptOutcome::Failure(LoginCode::NeedToken);
                    return attempt;
                }
                LoginOutcome::NeedsToken(token) => {
                    attempt.token = Some(token);
                    attempt.retry_count += 1;
                    attempt.outcome = AttemptOutcome::NeedsToken;
                }
            }
        }
    }

    /// Log `identity` in as `account` and persist a remembered session.
    pub async fn run(
        &self,
        identity: &Identity,
        account: &AccountRecord,
    ) -> Result<(UserContext, SessionKey), AuthError> {
        let attempt = self.attempt(identity).await;

        if let AttemptOutcome::Failure(code) = attempt.outcome {
            error!(
                email = %identity.email(),
                code = code.as_i32(),
                retries = attempt.retry_count,
                "unexpected proxy authentication failure"
            );
            return Err(AuthError::LoginFailure(code));
        }

        if let Err(err) = self.accounts.set_remember_password(account).await {
            warn!(email = %identity.email(), error = %err, "failed to set remember_password");
        }

        let context = UserContext::from_account(account);
        let key = self.sessions.persist(&context, true).await?;

        info!(
            email = %identity.email(),
            retries = attempt.retry_count,
            "proxy user logged in"
        );

        Ok((context, key))
    }
}
