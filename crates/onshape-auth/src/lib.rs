//! CAD-provider OAuth and session-credential library
//!
//! Implements the browser-facing half of the export gateway's security
//! model: the three-legged OAuth handshake with the CAD provider and the
//! signed session envelope the browser presents on every later call. This
//! crate is a standalone library with no dependency on the gateway binary —
//! it can be tested and used independently.
//!
//! Sign-in flow:
//! 1. Gateway calls `oauth::build_authorization_url()` with the panel's
//!    document context packed into `state::RedirectState`
//! 2. User consents in the browser; the provider redirects back with a
//!    one-time grant code and the untouched `state` value
//! 3. Gateway calls `oauth::complete_authorization()` to exchange the code,
//!    fetch the user's profile, and recover the document context
//! 4. Gateway signs the returned claims via `session::issue()` and hands
//!    the envelope to the browser as a cookie
//! 5. Every authenticated request re-verifies the envelope via
//!    `session::verify()`

pub mod error;
pub mod oauth;
pub mod profile;
pub mod session;
pub mod state;

pub use error::{AuthError, Error, Result};
pub use oauth::{
    OAuthConfig, TokenResponse, build_authorization_url, complete_authorization, exchange_code,
    fetch_user,
};
pub use profile::UserProfile;
pub use session::{MAX_SESSION_TTL, SessionClaims, issue, verify};
pub use state::RedirectState;
