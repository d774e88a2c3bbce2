//! # Identity & Token Lifecycle
//!
//! The OAuth subsystem of the PocketCanvas backend:
//!
//! - [`AuthCodeFlow`] builds the provider authorization URL and the
//!   anti-forgery state value for a login attempt.
//! - [`CallbackResolver`] turns a one-time authorization code into a
//!   confirmed local session: state check, code exchange, identity
//!   resolution, token persistence, session issue. Every transition has
//!   its own failure mode; any failure is terminal for the invocation and
//!   the client restarts the flow.
//! - [`SessionIssuer`] mints and resolves the opaque session handles the
//!   client holds instead of provider credentials.
//!
//! Provider tokens never leave this process: they flow from the
//! [`bridge_traits::DesignHost`] into the token store and back out only as
//! `Authorization` headers on provider calls.

pub mod authorize;
pub mod callback;
pub mod error;
pub mod session;
pub mod types;

pub use authorize::{check_redirect_uri, AuthCodeFlow, AuthorizeConfig, AuthorizationRequest, LoginState};
pub use callback::{AuthenticatedSession, CallbackRequest, CallbackResolver};
pub use error::{AuthError, Result};
pub use session::{SessionIssuer, SessionToken};
pub use types::{OAuthTokens, UserProfile};
