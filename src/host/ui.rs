//! Native login/logout UI suppression.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::host::UiControl;

/// Personal URLs (user menu entries) offered before any are hidden.
pub const DEFAULT_PERSONAL_URLS: &[&str] = &[
    "userpage",
    "mytalk",
    "preferences",
    "watchlist",
    "mycontris",
    "login",
    "anonlogin",
    "logout",
];

/// Special-page list and personal-URL list of the host, with the login and
/// logout entries removable at startup.
pub struct SpecialPageControls {
    hidden_special_pages: Vec<String>,
    hidden_personal_urls: Vec<String>,
    hidden: AtomicBool,
    hide_calls: AtomicUsize,
}

impl SpecialPageControls {
    pub fn new(hidden_special_pages: Vec<String>, hidden_personal_urls: Vec<String>) -> Self {
        Self {
            hidden_special_pages,
            hidden_personal_urls,
            hidden: AtomicBool::new(false),
            hide_calls: AtomicUsize::new(0),
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::Acquire)
    }

    /// Number of times the controls were asked to hide.
    pub fn hide_calls(&self) -> usize {
        self.hide_calls.load(Ordering::Acquire)
    }

    /// Whether a special page (name without the `Special:` prefix) is removed.
    pub fn is_special_page_hidden(&self, page: &str) -> bool {
        self.is_hidden()
            && self
                .hidden_special_pages
                .iter()
                .any(|p| p.eq_ignore_ascii_case(page))
    }

    /// Personal URLs still offered to users.
    pub fn visible_personal_urls(&self) -> Vec<String> {
        DEFAULT_PERSONAL_URLS
            .iter()
            .filter(|url| {
                !(self.is_hidden()
                    && self
                        .hidden_personal_urls
                        .iter()
                        .any(|h| h.eq_ignore_ascii_case(url)))
            })
            .map(|url| url.to_string())
            .collect()
    }
}

impl UiControl for SpecialPageControls {
    fn hide_login_logout_controls(&self) {
        self.hide_calls.fetch_add(1, Ordering::AcqRel);
        if !self.hidden.swap(true, Ordering::AcqRel) {
            tracing::info!(
                special_pages = ?self.hidden_special_pages,
                personal_urls = ?self.hidden_personal_urls,
                "native login/logout controls hidden"
            );
        }
    }
}
