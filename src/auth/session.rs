//! Session gate: decides whether a request needs identity resolution at all.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::context::UserContext;
use crate::auth::extractor::Identity;
use crate::host::{AccountStore, SessionStore};
use crate::types::SessionKey;

/// Host session as seen by the resolver.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Session {
    subject: Option<UserContext>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { subject: None }
    }

    pub fn bound(context: UserContext) -> Self {
        Self {
            subject: Some(context),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.subject.is_none()
    }

    pub fn subject(&self) -> Option<&UserContext> {
        self.subject.as_ref()
    }

    pub fn subject_identity(&self) -> Option<&Identity> {
        self.subject.as_ref().map(UserContext::identity)
    }
}

/// Why resolution was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// The request targets the native login or logout surface.
    LoginSurface,
    /// The session is already bound to a user.
    AuthenticatedSession,
}

impl BypassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoginSurface => "login_surface",
            Self::AuthenticatedSession => "authenticated_session",
        }
    }
}

/// Two-state gate run before any header is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Bypass(BypassReason),
    Resolve,
}

/// Loads the request's session and decides between [`Gate::Bypass`] and
/// [`Gate::Resolve`].
#[derive(Clone)]
pub struct SessionBinder {
    sessions: Arc<dyn SessionStore>,
    accounts: Arc<dyn AccountStore>,
}

impl SessionBinder {
    pub fn new(sessions: Arc<dyn SessionStore>, accounts: Arc<dyn AccountStore>) -> Self {
        Self { sessions, accounts }
    }

    /// The session for `key`, anonymous when it is unknown or stale.
    ///
    /// A session is stale once its account is gone or deactivated; stale
    /// sessions are ended. When the account cannot be looked up the request
    /// is treated as anonymous but the session is kept.
    pub async fn current(&self, key: Option<&SessionKey>) -> Session {
        let session = self.sessions.current(key).await;
        let (Some(key), Some(subject)) = (key, session.subject()) else {
            return session;
        };

        match self.accounts.find_by_email(subject.email()).await {
            Ok(Some(account)) if account.is_active && &account.id == subject.account_id() => {
                session
            }
            Ok(_) => {
                self.sessions.end(key).await;
                info!(email = %subject.email(), "stale session ended");
                Session::anonymous()
            }
            Err(err) => {
                warn!(email = %subject.email(), error = %err, "could not validate session");
                Session::anonymous()
            }
        }
    }

    /// True when resolution must be skipped for this request.
    pub fn should_bypass(&self, request_path: &str, current: &Session) -> bool {
        matches!(self.gate(request_path, None, current), Gate::Bypass(_))
    }

    /// Classify a request. `query` is the raw query string; a `title`
    /// parameter naming a login/logout page counts as the login surface too.
    pub fn gate(&self, request_path: &str, query: Option<&str>, current: &Session) -> Gate {
        if self.targets_login_surface(request_path, query) {
            return Gate::Bypass(BypassReason::LoginSurface);
        }

        // An existing session is never overridden.
        if !current.is_anonymous() {
            return Gate::Bypass(BypassReason::AuthenticatedSession);
        }

        Gate::Resolve
    }

    fn targets_login_surface(&self, request_path: &str, query: Option<&str>) -> bool {
        if self.sessions.is_login_or_logout_path(request_path) {
            return true;
        }

        query
            .and_then(title_param)
            .is_some_and(|title| self.sessions.is_login_or_logout_path(&title))
    }
}

pub(crate) fn title_param(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "title")
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserStore;
    use crate::db::{
        AccountCreate, DatabaseConfig, NotificationPrefs, create_connection, ensure_schema,
    };
    use crate::host::MemorySessionStore;
    use crate::types::Email;
    use surrealdb::RecordId;

    struct Fixture {
        binder: SessionBinder,
        sessions: Arc<MemorySessionStore>,
        store: Arc<UserStore>,
    }

    async fn fixture() -> Fixture {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();

        let pages = vec![
            "Special:UserLogin".to_string(),
            "Special:UserLogout".to_string(),
        ];
        let sessions = Arc::new(MemorySessionStore::new(pages));
        let store = Arc::new(UserStore::new(db));
        Fixture {
            binder: SessionBinder::new(sessions.clone(), store.clone()),
            sessions,
            store,
        }
    }

    async fn binder() -> SessionBinder {
        fixture().await.binder
    }

    fn bound_session() -> Session {
        Session::bound(UserContext::new(
            RecordId::from_table_key("account", "k"),
            Identity::new(Email::new("a@x.com"), "A", "B"),
            "A B",
        ))
    }

    #[tokio::test]
    async fn test_anonymous_session_resolves() {
        let binder = binder().await;
        assert_eq!(
            binder.gate("/wiki/Main_Page", None, &Session::anonymous()),
            Gate::Resolve
        );
        assert!(!binder.should_bypass("/wiki/Main_Page", &Session::anonymous()));
    }

    #[tokio::test]
    async fn test_login_and_logout_paths_bypass() {
        let binder = binder().await;
        for path in [
            "/Special:UserLogin",
            "/wiki/Special:UserLogout",
            "/special:userlogin",
        ] {
            assert_eq!(
                binder.gate(path, None, &Session::anonymous()),
                Gate::Bypass(BypassReason::LoginSurface),
                "{path}"
            );
        }
    }

    #[tokio::test]
    async fn test_title_query_parameter_bypasses() {
        let binder = binder().await;
        assert_eq!(
            binder.gate(
                "/index.php",
                Some("title=Special%3AUserLogin&returnto=Main"),
                &Session::anonymous()
            ),
            Gate::Bypass(BypassReason::LoginSurface)
        );
        assert_eq!(
            binder.gate("/index.php", Some("title=Main_Page"), &Session::anonymous()),
            Gate::Resolve
        );
    }

    #[tokio::test]
    async fn test_authenticated_session_bypasses() {
        let binder = binder().await;
        assert_eq!(
            binder.gate("/wiki/Main_Page", None, &bound_session()),
            Gate::Bypass(BypassReason::AuthenticatedSession)
        );
    }

    #[tokio::test]
    async fn test_login_surface_takes_precedence() {
        let binder = binder().await;
        assert_eq!(
            binder.gate("/Special:UserLogout", None, &bound_session()),
            Gate::Bypass(BypassReason::LoginSurface)
        );
    }

    #[tokio::test]
    async fn test_login_subpages_and_trailing_slash_bypass() {
        let binder = binder().await;
        for path in ["/wiki/Special:UserLogin/", "/wiki/Special:UserLogin/signup"] {
            assert_eq!(
                binder.gate(path, None, &Session::anonymous()),
                Gate::Bypass(BypassReason::LoginSurface),
                "{path}"
            );
        }
        assert_eq!(
            binder.gate(
                "/index.php",
                Some("title=Special:UserLogin/signup"),
                &Session::anonymous()
            ),
            Gate::Bypass(BypassReason::LoginSurface)
        );
    }

    async fn logged_in(f: &Fixture) -> SessionKey {
        let identity = Identity::new(Email::new("a@x.com"), "A", "B");
        let account = f
            .store
            .create(&AccountCreate::from_identity(&identity, NotificationPrefs::default()))
            .await
            .unwrap();
        f.sessions
            .persist(&UserContext::from_account(&account), true)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_current_keeps_valid_session() {
        let f = fixture().await;
        let key = logged_in(&f).await;

        let session = f.binder.current(Some(&key)).await;
        assert_eq!(session.subject().unwrap().email().as_str(), "a@x.com");
        assert_eq!(f.sessions.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_deactivated_account_makes_session_stale() {
        let f = fixture().await;
        let key = logged_in(&f).await;
        f.store.deactivate(&Email::new("a@x.com")).await.unwrap();

        assert!(f.binder.current(Some(&key)).await.is_anonymous());
        assert_eq!(f.sessions.session_count().await, 0);

        // Reactivation does not revive the ended session.
        f.store.reactivate(&Email::new("a@x.com")).await.unwrap();
        assert!(f.binder.current(Some(&key)).await.is_anonymous());
    }

    #[tokio::test]
    async fn test_session_without_account_is_stale() {
        let f = fixture().await;
        let orphan = UserContext::new(
            RecordId::from_table_key("account", "gone"),
            Identity::new(Email::new("gone@x.com"), "", ""),
            "",
        );
        let key = f.sessions.persist(&orphan, true).await.unwrap();

        assert!(f.binder.current(Some(&key)).await.is_anonymous());
        assert_eq!(f.sessions.session_count().await, 0);
    }
}
