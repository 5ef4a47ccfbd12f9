// HTTP surface for the trusted header resolver

use axum::{
    Router,
    extract::{Path, RawQuery, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{IdentityResolver, InboundRequest, UserContext, title_param};
use crate::host::{REMEMBERED_SESSION_SECS, SpecialPageControls};
use crate::types::SessionKey;


#[derive(Clone)]
pub struct AppState {
    pub resolver: IdentityResolver,
    pub ui: Arc<SpecialPageControls>,
}

impl AppState {
    pub fn new(resolver: IdentityResolver, ui: Arc<SpecialPageControls>) -> Self {
        Self { resolver, ui }
    }
}

pub fn create_router(state: AppState) -> Router {
    // Only these routes run the resolver; /health never binds a session.
    let resolved = Router::new()
        .route("/whoami", get(whoami))
        .route("/{title}", get(page))
        .route("/wiki/{title}", get(page))
        .route_layer(middleware::from_fn_with_state(state.clone(), resolve_identity));

    Router::new()
        .route("/health", get(health_check))
        .merge(resolved)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Runs the resolver for a routed request and binds the result to it.
async fn resolve_identity(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let cookie_name = state.resolver.config().session_cookie.clone();
    let session_key = session_key_from_cookies(req.headers(), &cookie_name);
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    let resolution = state
        .resolver
        .resolve(InboundRequest {
            path: &path,
            query: query.as_deref(),
            headers: req.headers(),
            session_key: session_key.as_ref(),
        })
        .await;

    if let Some(user) = resolution.user() {
        req.extensions_mut().insert(user.clone());
    }
    let new_key = resolution.new_session_key().cloned();

    let mut response = next.run(req).await;

    if let Some(key) = new_key {
        match HeaderValue::from_str(&session_cookie(&cookie_name, &key)) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => tracing::error!(error = %err, "invalid session cookie value"),
        }
    }

    response
}

fn session_key_from_cookies(headers: &HeaderMap, name: &str) -> Option<SessionKey> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| SessionKey::new(v))
}

fn session_cookie(name: &str, key: &SessionKey) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, key, REMEMBERED_SESSION_SECS
    )
}

fn error_response(status: StatusCode, code: &str) -> Response {
    (status, Json(serde_json::json!({ "error": code }))).into_response()
}

/// Gate for routes anonymous users may only see when `anonymous.read` is on.
fn require_reader<'a>(state: &AppState, req: &'a Request) -> Result<Option<&'a UserContext>, Response> {
    let user = req.extensions().get::<UserContext>();
    if user.is_none() && !state.resolver.config().anonymous.read {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "authentication_required",
        ));
    }
    Ok(user)
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// The user bound to this request and the personal URLs offered to them.
async fn whoami(State(state): State<AppState>, req: Request) -> Response {
    let user = match require_reader(&state, &req) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let body = match user {
        Some(user) => serde_json::json!({
            "anonymous": false,
            "email": user.email(),
            "display_name": user.display(),
            "personal_urls": state.ui.visible_personal_urls(),
        }),
        None => serde_json::json!({
            "anonymous": true,
            "personal_urls": state.ui.visible_personal_urls(),
        }),
    };

    Json(body).into_response()
}

/// Wiki page stub. Special pages removed from the host answer 404.
async fn page(
    State(state): State<AppState>,
    Path(title): Path<String>,
    RawQuery(query): RawQuery,
    req: Request,
) -> Response {
    let title = query.as_deref().and_then(title_param).unwrap_or(title);

    let hidden = title
        .strip_prefix("Special:")
        .is_some_and(|special| state.ui.is_special_page_hidden(special));
    if hidden {
        return error_response(StatusCode::NOT_FOUND, "not_found");
    }

    let user = match require_reader(&state, &req) {
        Ok(user) => user,
        Err(response) => return response,
    };

    Json(serde_json::json!({
        "page": title,
        "user": user.map(UserContext::display),
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_from_cookies() {
        let mut headers = HeaderMap::new();
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sproxy_session=abc123"),
        );

        assert_eq!(
            session_key_from_cookies(&headers, "sproxy_session"),
            Some(SessionKey::new("abc123"))
        );
        assert_eq!(session_key_from_cookies(&headers, "other"), None);
    }

    #[test]
    fn test_empty_cookie_value_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("sproxy_session="));
        assert_eq!(session_key_from_cookies(&headers, "sproxy_session"), None);
    }

    #[test]
    fn test_session_cookie_format() {
        let cookie = session_cookie("sproxy_session", &SessionKey::new("k1"));
        assert_eq!(
            cookie,
            "sproxy_session=k1; Path=/; HttpOnly; SameSite=Lax; Max-Age=2592000"
        );
    }
}
