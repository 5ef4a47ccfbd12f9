// Core modules
mod config;
pub mod db;
pub mod types;

// Resolver and its host
pub mod auth;
pub mod host;
pub mod api;
pub mod server;

// Re-export key types and functions
pub use config::{
    GroupPermissions, HeaderNames, ResolverConfig, load_resolver_config, resolve_config_path,
};
pub use db::{AccountRecord, DatabaseConfig, Db, create_connection, ensure_schema};
pub use types::{Email, LoginToken, SessionKey};

pub use auth::{
    AuthError, Identity, IdentityResolver, InboundRequest, Resolution, UserContext, UserStore,
};
pub use host::{MemorySessionStore, SpecialPageControls, TokenLoginHandshake};

use std::sync::Arc;
use anyhow::Result;

/// A resolver wired to the in-process host implementations.
#[derive(Clone)]
pub struct Host {
    pub accounts: Arc<UserStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub ui: Arc<SpecialPageControls>,
    pub resolver: IdentityResolver,
}

/// Convenience function to create a fully configured resolver.
///
/// Connects to the database, ensures the schema, builds the host stores and
/// installs the resolver (which hides the native login/logout UI).
pub async fn create_host(db_config: DatabaseConfig, config: ResolverConfig) -> Result<Host> {
    let db = create_connection(db_config).await?;
    ensure_schema(&db).await?;

    let accounts = Arc::new(UserStore::new(db.clone()));
    let sessions = Arc::new(MemorySessionStore::new(config.login_pages.clone()));
    let ui = Arc::new(SpecialPageControls::new(
        config.hidden_special_pages.clone(),
        config.hidden_personal_urls.clone(),
    ));
    let login = Arc::new(TokenLoginHandshake::new(accounts.clone()));

    let resolver = IdentityResolver::install(
        config,
        sessions.clone(),
        accounts.clone(),
        login,
        ui.clone(),
    );

    Ok(Host {
        accounts,
        sessions,
        ui,
        resolver,
    })
}
