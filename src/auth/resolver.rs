//! Per-request identity resolution.
//!
//! Runs the gate, header extraction, account provisioning and the login
//! handshake in that order. Every failure leaves the request anonymous.

use std::sync::Arc;

use http::HeaderMap;
use tracing::{debug, error, warn};

use crate::auth::context::UserContext;
use crate::auth::error::AuthError;
use crate::auth::extractor::{self, Identity};
use crate::auth::login::LoginCoordinator;
use crate::auth::provisioner::AccountProvisioner;
use crate::auth::session::{BypassReason, Gate, Session, SessionBinder};
use crate::config::ResolverConfig;
use crate::host::{AccountStore, LoginHandshake, SessionStore, UiControl};
use crate::types::SessionKey;

/// The parts of an inbound request the resolver looks at.
#[derive(Debug, Clone, Copy)]
pub struct InboundRequest<'a> {
    pub path: &'a str,
    /// Raw query string, without the leading `?`
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
    pub session_key: Option<&'a SessionKey>,
}

/// Result of resolving one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Nothing was done; the session is returned as found.
    Bypassed {
        reason: BypassReason,
        session: Session,
    },
    /// A session was bound to the proxy user.
    Authenticated {
        context: UserContext,
        session_key: SessionKey,
    },
    /// The request stays anonymous.
    Anonymous { error: AuthError },
}

impl Resolution {
    /// The user the request runs as, if any.
    pub fn user(&self) -> Option<&UserContext> {
        match self {
            Self::Bypassed { session, .. } => session.subject(),
            Self::Authenticated { context, .. } => Some(context),
            Self::Anonymous { .. } => None,
        }
    }

    /// Session key to hand back to the client, when a new session was bound.
    pub fn new_session_key(&self) -> Option<&SessionKey> {
        match self {
            Self::Authenticated { session_key, .. } => Some(session_key),
            _ => None,
        }
    }
}

/// Trusted header identity resolver.
#[derive(Clone)]
pub struct IdentityResolver {
    config: Arc<ResolverConfig>,
    binder: SessionBinder,
    provisioner: AccountProvisioner,
    login: LoginCoordinator,
}

impl IdentityResolver {
    /// Wire the resolver to its host and hide the native login/logout UI.
    pub fn install(
        config: ResolverConfig,
        sessions: Arc<dyn SessionStore>,
        accounts: Arc<dyn AccountStore>,
        login: Arc<dyn LoginHandshake>,
        ui: Arc<dyn UiControl>,
    ) -> Self {
        let config = config.normalized();

        ui.hide_login_logout_controls();

        Self {
            binder: SessionBinder::new(sessions.clone(), accounts.clone()),
            provisioner: AccountProvisioner::new(
                accounts.clone(),
                config.notify_on_account_creation,
            ),
            login: LoginCoordinator::new(login, sessions, accounts),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub async fn resolve(&self, request: InboundRequest<'_>) -> Resolution {
        let session = self.binder.current(request.session_key).await;

        match self.binder.gate(request.path, request.query, &session) {
            Gate::Bypass(reason) => {
                if reason == BypassReason::AuthenticatedSession {
                    self.check_mismatch(request.headers, &session);
                }
                debug!(path = request.path, reason = reason.as_str(), "identity resolution bypassed");
                Resolution::Bypassed { reason, session }
            }
            Gate::Resolve => match self.authenticate(request.headers).await {
                Ok((context, session_key)) => Resolution::Authenticated {
                    context,
                    session_key,
                },
                Err(error) => {
                    self.log_failure(request.path, &error);
                    Resolution::Anonymous { error }
                }
            },
        }
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<(UserContext, SessionKey), AuthError> {
        let identity = extractor::extract(headers, &self.config.headers)?;
        let account = self.provisioner.provision_or_find(&identity).await?;
        self.login.run(&identity, &account).await
    }

    /// Warn when a bound session belongs to someone other than the header user.
    fn check_mismatch(&self, headers: &HeaderMap, session: &Session) {
        let Ok(header_identity) = extractor::extract(headers, &self.config.headers) else {
            return;
        };
        let Some(bound) = session.subject_identity() else {
            return;
        };

        if !same_user(bound, &header_identity) {
            warn!(
                session_email = %bound.email(),
                header_email = %header_identity.email(),
                "session subject differs from trusted header, keeping session"
            );
        }
    }

    fn log_failure(&self, path: &str, err: &AuthError) {
        if err.is_unauthenticated() {
            debug!(path, reason = err.code(), "no usable identity header");
        } else if !matches!(err, AuthError::LoginFailure(_)) {
            // Login failures are already logged with their code.
            error!(path, reason = err.code(), error = %err, "identity resolution failed");
        }
    }
}

fn same_user(a: &Identity, b: &Identity) -> bool {
    a.email() == b.email()
}
