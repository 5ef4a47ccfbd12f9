//! Identity extraction from trusted proxy headers.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::error::AuthError;
use crate::config::HeaderNames;
use crate::types::Email;

/// Identity asserted by the upstream proxy.
///
/// Derived solely from trusted headers. It is never stored on its own, only
/// as part of the account it binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    email: Email,
    given_name: String,
    family_name: String,
}

impl Identity {
    pub fn new(
        email: Email,
        given_name: impl Into<String>,
        family_name: impl Into<String>,
    ) -> Self {
        Self {
            email,
            given_name: given_name.into(),
            family_name: family_name.into(),
        }
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn given_name(&self) -> &str {
        &self.given_name
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    /// "Given Family", without stray spaces when a part is missing.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
            .trim()
            .to_string()
    }

    /// Serialize this identity into the trusted headers `extract` reads.
    ///
    /// Empty name parts are omitted.
    pub fn to_headers(&self, names: &HeaderNames) -> Result<HeaderMap, AuthError> {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, &names.email, self.email.as_str())?;
        if !self.given_name.is_empty() {
            insert_header(&mut headers, &names.given_name, &self.given_name)?;
        }
        if !self.family_name.is_empty() {
            insert_header(&mut headers, &names.family_name, &self.family_name)?;
        }
        Ok(headers)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), AuthError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| AuthError::MalformedIdentity(format!("invalid header name {name}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|_| AuthError::MalformedIdentity("header value not representable".into()))?;
    headers.insert(name, value);
    Ok(())
}

/// Extract the proxy identity from request headers.
///
/// The email header is required; name headers default to empty strings.
pub fn extract(headers: &HeaderMap, names: &HeaderNames) -> Result<Identity, AuthError> {
    let email = header_str(headers, &names.email).ok_or(AuthError::MissingIdentity)?;
    if email.is_empty() {
        return Err(AuthError::MissingIdentity);
    }
    if !is_address_shaped(email) {
        return Err(AuthError::MalformedIdentity(format!(
            "{} header is not an email address",
            names.email
        )));
    }

    let given_name = header_str(headers, &names.given_name).unwrap_or_default();
    let family_name = header_str(headers, &names.family_name).unwrap_or_default();

    Ok(Identity::new(Email::new(email), given_name, family_name))
}

/// Header value as trimmed UTF-8 (non-ASCII names arrive as raw bytes).
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let value = headers.get(name)?;
    match std::str::from_utf8(value.as_bytes()) {
        Ok(text) => Some(text.trim()),
        Err(_) => {
            debug!(header = name, "identity header is not valid UTF-8, ignoring it");
            None
        }
    }
}

/// Basic address-shape check: `local@domain.tld`, no whitespace or controls.
pub fn is_address_shaped(value: &str) -> bool {
    if value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return false;
    }

    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}
