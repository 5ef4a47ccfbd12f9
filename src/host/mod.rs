//! Host collaborator interfaces.
//!
//! The resolver never talks to a concrete host. It is handed four
//! capabilities at construction time:
//!
//! - [`SessionStore`]: reads and persists the request's session
//! - [`AccountStore`]: finds and creates accounts
//! - [`LoginHandshake`]: the host login form
//! - [`UiControl`]: suppresses native login/logout entry points
//!
//! In-process implementations of the session, handshake and UI capabilities
//! live in the submodules; the SurrealDB account store is
//! [`crate::auth::UserStore`].

mod handshake;
mod session_store;
mod ui;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::{Identity, Session, UserContext};
use crate::db::{AccountCreate, AccountRecord};
use crate::types::{Email, LoginToken, SessionKey};

pub use handshake::TokenLoginHandshake;
pub use session_store::{MemorySessionStore, REMEMBERED_SESSION_SECS, SESSION_SECS};
pub use ui::{DEFAULT_PERSONAL_URLS, SpecialPageControls};

/// Errors reported by host stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The record already exists (lost a create race).
    Conflict,
    /// Backend failure.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict => write!(f, "Record already exists"),
            Self::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Result codes of the host login form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginCode {
    Success,
    NoName,
    Illegal,
    WrongPluginPass,
    NotExists,
    WrongPass,
    EmptyPass,
    ResetPass,
    Aborted,
    CreateBlocked,
    Throttled,
    UserBlocked,
    NeedToken,
    WrongToken,
}

impl LoginCode {
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::NoName => 1,
            Self::Illegal => 2,
            Self::WrongPluginPass => 3,
            Self::NotExists => 4,
            Self::WrongPass => 5,
            Self::EmptyPass => 6,
            Self::ResetPass => 7,
            Self::Aborted => 8,
            Self::CreateBlocked => 9,
            Self::Throttled => 10,
            Self::UserBlocked => 11,
            Self::NeedToken => 12,
            Self::WrongToken => 13,
        }
    }
}

impl fmt::Display for LoginCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}", self.as_i32())
    }
}

/// Outcome of one submission to the host login form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    /// Resubmit with this token.
    NeedsToken(LoginToken),
    Failure(LoginCode),
}

/// Host session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The session for the given key; anonymous when the key is absent or unknown.
    async fn current(&self, key: Option<&SessionKey>) -> Session;

    /// Whether `path` names the native login or logout surface.
    fn is_login_or_logout_path(&self, path: &str) -> bool;

    /// Bind a session to `context` and persist it. `remember` asks for a
    /// long-lived session.
    async fn persist(&self, context: &UserContext, remember: bool)
    -> Result<SessionKey, StoreError>;

    /// Drop a session. Returns false when the key was unknown.
    async fn end(&self, key: &SessionKey) -> bool;
}

/// Host account storage.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &Email) -> Result<Option<AccountRecord>, StoreError>;

    /// Create an account. Fails with [`StoreError::Conflict`] when an account
    /// for the same email already exists.
    async fn create(&self, create: &AccountCreate) -> Result<AccountRecord, StoreError>;

    /// Record that the account was seen again.
    async fn touch(&self, account: &AccountRecord) -> Result<(), StoreError>;

    /// Set the account's "remember password" option.
    async fn set_remember_password(&self, account: &AccountRecord) -> Result<(), StoreError>;
}

/// Host login form.
#[async_trait]
pub trait LoginHandshake: Send + Sync {
    async fn submit(&self, identity: &Identity, token: Option<&LoginToken>) -> LoginOutcome;
}

/// Host UI hooks.
pub trait UiControl: Send + Sync {
    /// Remove the native login/logout entry points.
    fn hide_login_logout_controls(&self);
}
