use http::HeaderName;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};

/// Names of the trusted headers injected by the upstream proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeaderNames {
    /// Header carrying the email address (the identity key)
    pub email: String,
    /// Header carrying the given name
    pub given_name: String,
    /// Header carrying the family name
    pub family_name: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            email: "From".to_string(),
            given_name: "X-Given-Name".to_string(),
            family_name: "X-Family-Name".to_string(),
        }
    }
}

impl HeaderNames {
    fn fields_mut(&mut self) -> [(&'static str, &mut String); 3] {
        [
            ("email", &mut self.email),
            ("given_name", &mut self.given_name),
            ("family_name", &mut self.family_name),
        ]
    }

    /// Fail on the first name that is not a valid HTTP header name.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (field, name) in [
            ("email", &self.email),
            ("given_name", &self.given_name),
            ("family_name", &self.family_name),
        ] {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                anyhow::bail!("headers.{field}: {name:?} is not a valid HTTP header name");
            }
        }
        Ok(())
    }

    /// Replace invalid names with their defaults.
    fn repair(&mut self) {
        let mut defaults = HeaderNames::default();
        for ((field, name), (_, default)) in self.fields_mut().into_iter().zip(defaults.fields_mut()) {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                tracing::error!(
                    header = field,
                    configured = %name,
                    default = %default,
                    "invalid header name, using the default"
                );
                *name = default.clone();
            }
        }
    }
}

/// Permissions granted to requests that stay anonymous.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GroupPermissions {
    pub read: bool,
    pub edit: bool,
    pub create_account: bool,
}

/// Resolver configuration, passed explicitly at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Turn on all e-mail notification flags for newly created accounts.
    pub notify_on_account_creation: bool,
    /// Always 0: accounts never have passwords.
    pub minimum_password_length: u32,
    pub headers: HeaderNames,
    /// Special pages that form the native login/logout surface.
    pub login_pages: Vec<String>,
    /// Special pages removed from the host's page list.
    pub hidden_special_pages: Vec<String>,
    /// Personal URLs (user menu entries) removed for every user.
    pub hidden_personal_urls: Vec<String>,
    pub anonymous: GroupPermissions,
    /// Name of the cookie carrying the session key.
    pub session_cookie: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            notify_on_account_creation: false,
            minimum_password_length: 0,
            headers: HeaderNames::default(),
            login_pages: vec![
                "Special:UserLogin".to_string(),
                "Special:UserLogout".to_string(),
            ],
            hidden_special_pages: vec![
                "ChangeEmail".to_string(),
                "Userlogin".to_string(),
                "Userlogout".to_string(),
            ],
            hidden_personal_urls: vec![
                "login".to_string(),
                "logout".to_string(),
                "anonlogin".to_string(),
            ],
            anonymous: GroupPermissions::default(),
            session_cookie: "sproxy_session".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &PathBuf) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: ResolverConfig = serde_json::from_str(&raw)?;
        cfg.headers.validate()?;
        Ok(cfg.normalized())
    }

    /// Force invariants that configuration is not allowed to change.
    pub fn normalized(mut self) -> Self {
        if self.minimum_password_length != 0 {
            tracing::warn!(
                configured = self.minimum_password_length,
                "minimum_password_length is forced to 0; passwords are never used"
            );
            self.minimum_password_length = 0;
        }
        self.headers.repair();
        if self.session_cookie.trim().is_empty() {
            self.session_cookie = ResolverConfig::default().session_cookie;
        }
        self
    }
}

/// Resolve the config path from an explicit argument or `SPROXY_CONFIG`.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }

    if let Ok(p) = env::var("SPROXY_CONFIG") {
        return Some(PathBuf::from(p));
    }

    let candidate = PathBuf::from("sproxy.json");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

/// Load the resolver config, falling back to defaults when no file is found.
pub fn load_resolver_config(explicit: Option<PathBuf>) -> anyhow::Result<ResolverConfig> {
    match resolve_config_path(explicit) {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading resolver config");
            ResolverConfig::from_json_file(&path)
        }
        None => Ok(ResolverConfig::default()),
    }
}
