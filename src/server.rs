//! HTTP server for the resolver.
//!
//! Serves the router from [`crate::api`] with identity resolution applied to
//! every request.

use anyhow::Result;

use crate::api::{AppState, create_router};
use crate::config::ResolverConfig;
use crate::db::DatabaseConfig;
use crate::create_host;

/// Start the HTTP server on `bind` and run until it stops.
pub async fn start_http(bind: &str, db_config: DatabaseConfig, config: ResolverConfig) -> Result<()> {
    let anonymous_read = config.anonymous.read;
    let host = create_host(db_config, config).await?;

    let router = create_router(AppState::new(host.resolver.clone(), host.ui.clone()));
    let listener = tokio::net::TcpListener::bind(bind).await?;

    if anonymous_read {
        tracing::info!("sproxy identity server listening on http://{} (anonymous read allowed)", bind);
    } else {
        tracing::info!("sproxy identity server listening on http://{} (authentication required)", bind);
    }

    axum::serve(listener, router).await?;

    Ok(())
}
