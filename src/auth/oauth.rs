//! Identity provider OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow against the
//! configured OpenID Connect provider. On callback the user row is
//! upserted from the userinfo claims and a signed session cookie is set.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;

use super::middleware::SESSION_COOKIE;
use super::session::{create_session_token, Session};
use crate::data::UpsertUser;
use crate::error::AppError;
use crate::AppState;

const STATE_COOKIE: &str = "oauth_state";
const STATE_COOKIE_MAX_AGE_SECONDS: i64 = 600;

/// Create authentication router
///
/// Routes:
/// - GET /api/login - Redirect to the identity provider
/// - GET /api/callback - OAuth callback
/// - GET /api/logout - Clear session
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/api/login", get(login_redirect))
        .route("/api/callback", get(oauth_callback))
        .route("/api/logout", get(logout))
}

// =============================================================================
// Login
// =============================================================================

/// GET /api/login
///
/// Redirects to the identity provider's authorization page with a CSRF
/// state token pinned in a short-lived cookie.
async fn login_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let csrf_state = generate_csrf_state();

    let provider = &state.config.auth.provider;
    let mut authorize_url = url::Url::parse(&provider.authorize_url)
        .map_err(|e| AppError::Config(format!("invalid authorize_url: {}", e)))?;
    authorize_url
        .query_pairs_mut()
        .append_pair("client_id", &provider.client_id)
        .append_pair("redirect_uri", &callback_url(&state))
        .append_pair("response_type", "code")
        .append_pair("scope", "openid email profile")
        .append_pair("state", &csrf_state);

    let state_cookie = Cookie::build((STATE_COOKIE, csrf_state))
        .path("/")
        .http_only(true)
        .secure(state.config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(STATE_COOKIE_MAX_AGE_SECONDS))
        .build();

    Ok((jar.add(state_cookie), Redirect::to(authorize_url.as_str())))
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from provider callback
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    /// Authorization code
    code: String,
    /// CSRF state token
    state: String,
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Userinfo claims we care about
#[derive(Debug, Deserialize)]
struct UserinfoClaims {
    sub: String,
    email: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

/// GET /api/callback
///
/// Handles the OAuth callback from the identity provider.
///
/// # Steps
/// 1. Verify CSRF state against the pinned cookie
/// 2. Exchange code for an access token
/// 3. Fetch userinfo claims
/// 4. Upsert the user row
/// 5. Create session and set cookie
/// 6. Redirect to home
async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    verify_csrf_state(&query.state, &jar)?;
    let jar = jar.remove(Cookie::from(STATE_COOKIE));

    let provider = &state.config.auth.provider;
    let token_response = state
        .http_client
        .post(&provider.token_url)
        .form(&[
            ("client_id", provider.client_id.as_str()),
            ("client_secret", provider.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", query.code.as_str()),
            ("redirect_uri", callback_url(&state).as_str()),
        ])
        .send()
        .await?;

    if !token_response.status().is_success() {
        tracing::warn!(
            status = %token_response.status(),
            "OAuth code exchange rejected"
        );
        return Err(AppError::Unauthorized);
    }
    let token: TokenResponse = token_response.json().await?;

    let userinfo_response = state
        .http_client
        .get(&provider.userinfo_url)
        .bearer_auth(&token.access_token)
        .send()
        .await?;
    if !userinfo_response.status().is_success() {
        return Err(AppError::Unauthorized);
    }
    let claims: UserinfoClaims = userinfo_response.json().await?;

    let user = state
        .db
        .upsert_user(&UpsertUser {
            id: claims.sub,
            email: claims.email,
            first_name: claims.given_name,
            last_name: claims.family_name,
            profile_image_url: claims.picture,
        })
        .await?;
    tracing::info!(user_id = %user.id, "User signed in");

    let session = Session::new(user.id, state.config.auth.session_max_age);
    let token = create_session_token(&session, &state.config.auth.session_secret)?;

    let session_cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(state.config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(state.config.auth.session_max_age))
        .build();

    Ok((jar.add(session_cookie), Redirect::to("/")))
}

// =============================================================================
// Logout
// =============================================================================

/// GET /api/logout
///
/// Clears the session cookie and redirects to home.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    let expired = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();

    (jar.add(expired), Redirect::to("/"))
}

// =============================================================================
// Helpers
// =============================================================================

fn callback_url(state: &AppState) -> String {
    format!("{}/api/callback", state.config.server.base_url())
}

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Verify CSRF state from cookie matches callback state
fn verify_csrf_state(state: &str, jar: &CookieJar) -> Result<(), AppError> {
    match jar.get(STATE_COOKIE) {
        Some(cookie) if cookie.value() == state => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}
