//! Trusted header authentication.
//!
//! The upstream proxy has already authenticated the user and forwards the
//! identity in request headers. This module turns those headers into a bound
//! host session:
//!
//! - **Extraction**: parse and validate the identity headers
//! - **Session gate**: skip login/logout pages and already-bound sessions
//! - **Provisioning**: find or create the account for the email
//! - **Login**: run the host login handshake, retrying once on a token challenge
//!
//! ## Security Model
//!
//! - Identity headers are trusted as-is; the proxy must strip them from
//!   client requests
//! - An existing session is never replaced by a different header identity
//! - Every failure leaves the request anonymous
//!
//! ## Usage
//!
//! ```ignore
//! let resolver = IdentityResolver::install(config, sessions, accounts, login, ui);
//!
//! let resolution = resolver
//!     .resolve(InboundRequest {
//!         path: "/wiki/Main_Page",
//!         query: None,
//!         headers: &headers,
//!         session_key: None,
//!     })
//!     .await;
//! ```

mod context;
mod error;
mod extractor;
mod login;
mod provisioner;
mod resolver;
mod session;
mod user_store;

pub use context::UserContext;
pub use error::AuthError;
pub use extractor::{Identity, extract, is_address_shaped};
pub use login::{AttemptOutcome, LoginAttempt, LoginCoordinator, MAX_TOKEN_RETRIES};
pub use provisioner::AccountProvisioner;
pub use resolver::{IdentityResolver, InboundRequest, Resolution};
pub use session::{BypassReason, Gate, Session, SessionBinder};
pub(crate) use session::title_param;
pub use user_store::UserStore;
