//! In-process session storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::auth::{Session, UserContext};
use crate::host::{SessionStore, StoreError};
use crate::types::SessionKey;

/// Lifetime of a "remember me" session, in seconds (30 days).
pub const REMEMBERED_SESSION_SECS: i64 = 30 * 24 * 60 * 60;

/// Lifetime of any other session, in seconds (1 day).
pub const SESSION_SECS: i64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
struct SessionEntry {
    context: UserContext,
    remember: bool,
    expires_at: DateTime<Utc>,
}

impl SessionEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Session store keeping sessions in memory, keyed by a random session key.
///
/// Entries expire after [`REMEMBERED_SESSION_SECS`] (or [`SESSION_SECS`]
/// without "remember me") and are pruned on every `persist`.
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionKey, SessionEntry>>>,
    /// Page names of the login/logout surface, e.g. "Special:UserLogin"
    login_pages: Vec<String>,
    remembered_ttl: Duration,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(login_pages: Vec<String>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            login_pages,
            remembered_ttl: Duration::seconds(REMEMBERED_SESSION_SECS),
            ttl: Duration::seconds(SESSION_SECS),
        }
    }

    /// Override both session lifetimes.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.remembered_ttl = ttl;
        self.ttl = ttl;
        self
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the session was persisted with "remember me".
    pub async fn is_remembered(&self, key: &SessionKey) -> bool {
        self.sessions
            .read()
            .await
            .get(key)
            .is_some_and(|entry| entry.remember)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn current(&self, key: Option<&SessionKey>) -> Session {
        let Some(key) = key else {
            return Session::anonymous();
        };

        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    return Session::bound(entry.context.clone());
                }
                Some(_) => {}
                None => return Session::anonymous(),
            }
        }

        self.sessions.write().await.remove(key);
        tracing::debug!("expired session dropped");
        Session::anonymous()
    }

    fn is_login_or_logout_path(&self, path: &str) -> bool {
        let Some(page) = page_name(path) else {
            return false;
        };
        self.login_pages
            .iter()
            .any(|p| normalize_page(p).eq_ignore_ascii_case(&page))
    }

    async fn persist(
        &self,
        context: &UserContext,
        remember: bool,
    ) -> Result<SessionKey, StoreError> {
        let key = SessionKey::new(uuid::Uuid::new_v4().simple().to_string());
        let now = Utc::now();
        let ttl = if remember { self.remembered_ttl } else { self.ttl };
        let entry = SessionEntry {
            context: context.clone(),
            remember,
            expires_at: now + ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, entry| !entry.is_expired(now));
        sessions.insert(key.clone(), entry);
        tracing::debug!(
            email = %context.email(),
            remember,
            "session persisted"
        );

        Ok(key)
    }

    async fn end(&self, key: &SessionKey) -> bool {
        self.sessions.write().await.remove(key).is_some()
    }
}

/// Page a path addresses: the first `Special:` segment without its subpage,
/// otherwise the last non-empty segment.
fn page_name(path: &str) -> Option<String> {
    let mut segments = path.split('/').map(normalize_page).filter(|s| !s.is_empty());

    let special = path
        .split('/')
        .map(normalize_page)
        .find(|s| s.get(..8).is_some_and(|p| p.eq_ignore_ascii_case("special:")));

    special.or_else(|| segments.next_back())
}

fn normalize_page(name: &str) -> String {
    name.trim().replace(' ', "_")
}
