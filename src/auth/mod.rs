//! OAuth authentication
//!
//! Handles:
//! - Identity provider OAuth flow
//! - Session management
//! - Authentication extractors

mod middleware;
mod oauth;
pub mod session;

pub use middleware::{CurrentUser, MaybeUser, SESSION_COOKIE};
pub use oauth::auth_router;
pub use session::{create_session_token, verify_session_token, Session};
