//! Error types for identity resolution.
//!
//! Every variant degrades to "the request stays anonymous". None of them is
//! shown to the end user verbatim; HTTP responses only carry [`AuthError::code`].

use std::fmt;

use crate::host::{LoginCode, StoreError};

/// Errors that can occur while resolving a proxy identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The email header is absent or empty.
    MissingIdentity,

    /// The email header is present but not address-shaped.
    MalformedIdentity(String),

    /// The login handshake asked for a token. Retried once, never surfaced
    /// past the coordinator.
    NeedsToken,

    /// The login handshake failed terminally for this request.
    LoginFailure(LoginCode),

    /// A concurrent request created the same account first.
    AccountCreateConflict,

    /// Account or session backend failure.
    Store(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIdentity => write!(f, "Trusted identity header missing"),
            Self::MalformedIdentity(msg) => write!(f, "Malformed identity: {}", msg),
            Self::NeedsToken => write!(f, "Login token required"),
            Self::LoginFailure(code) => write!(f, "Login failed ({})", code),
            Self::AccountCreateConflict => write!(f, "Account was created concurrently"),
            Self::Store(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => Self::AccountCreateConflict,
            StoreError::Backend(msg) => Self::Store(msg),
        }
    }
}

impl AuthError {
    /// Stable, user-safe code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingIdentity => "missing_identity",
            Self::MalformedIdentity(_) => "malformed_identity",
            Self::NeedsToken => "needs_token",
            Self::LoginFailure(_) => "login_failure",
            Self::AccountCreateConflict => "account_conflict",
            Self::Store(_) => "unavailable",
        }
    }

    /// Whether the request simply carried no usable identity.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::MissingIdentity | Self::MalformedIdentity(_))
    }
}
