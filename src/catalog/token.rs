//! OAuth client-credentials token cache
//!
//! The external catalog authenticates with short-lived bearer tokens.
//! The cache holds one token and refreshes it a minute before expiry.
//! The lock is held across the refresh call, so concurrent requests
//! that find the token expired trigger exactly one refresh.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::error::AppError;

/// Refresh this long before the provider-reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// A freshly minted token as returned by the token endpoint.
#[derive(Debug, Clone)]
pub struct FreshToken {
    pub access_token: String,
    /// Provider-reported lifetime in seconds
    pub expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Single-token cache with single-flight refresh.
#[derive(Debug, Default)]
pub struct TokenCache {
    state: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached token, refreshing it through `refresh` if it is
    /// missing or inside the expiry margin.
    ///
    /// A failed refresh leaves the cache empty so the next caller retries.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<String, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FreshToken, AppError>>,
    {
        let mut state = self.state.lock().await;

        if let Some(cached) = state.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        *state = None;
        let fresh = refresh().await?;
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
        *state = Some(CachedToken {
            token: fresh.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(fresh.access_token)
    }
}
