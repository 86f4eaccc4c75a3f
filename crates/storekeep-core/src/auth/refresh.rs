//! Single-flight access-token refresh.
//!
//! Any number of requests may notice a stale token at the same time; exactly
//! one refresh call reaches the server and every request waits on its
//! outcome. On success the new credential pair lands in the session store
//! before the in-flight slot is released, so a waiter re-reading the store
//! after the await always observes the renewed token. On failure the store
//! is untouched and the shared error reaches every waiter; the next stale
//! request opens a fresh flight. The refresh call itself is never retried.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::auth::expiry;
use crate::auth::session::{AuthTokens, SessionStore};
use crate::utils::SingleFlight;

#[derive(Clone)]
pub struct RefreshCoordinator {
    http: reqwest::Client,
    refresh_url: String,
    session: Arc<SessionStore>,
    inflight: SingleFlight<Result<(), Arc<ApiError>>>,
}

impl RefreshCoordinator {
    pub fn new(http: reqwest::Client, base_url: &str, session: Arc<SessionStore>) -> Self {
        Self {
            http,
            refresh_url: format!("{}/auth/refresh-token", base_url.trim_end_matches('/')),
            session,
            inflight: SingleFlight::new(),
        }
    }

    /// Renew the access token if it is about to expire.
    ///
    /// No-op when there is no access token, the token is not near expiry, or
    /// no refresh token is available. Otherwise joins the single in-flight
    /// refresh, starting one if needed.
    pub async fn ensure_fresh(&self) -> Result<(), Arc<ApiError>> {
        let Some(tokens) = self.session.tokens().await else {
            return Ok(());
        };
        if !expiry::is_near_expiry(&tokens.access_token, Utc::now().timestamp_millis()) {
            return Ok(());
        }
        if tokens.refresh_token.is_none() {
            debug!("access token is stale but no refresh token is available");
            return Ok(());
        }

        let http = self.http.clone();
        let url = self.refresh_url.clone();
        let session = Arc::clone(&self.session);
        self.inflight
            .run(move || refresh_flight(http, url, session))
            .await
    }
}

/// The body of one refresh flight. Runs once no matter how many requests are
/// waiting on it.
async fn refresh_flight(
    http: reqwest::Client,
    url: String,
    session: Arc<SessionStore>,
) -> Result<(), Arc<ApiError>> {
    // A flight that finished between our staleness check and this one
    // starting may already have renewed the token.
    let Some(tokens) = session.tokens().await else {
        return Ok(());
    };
    if !expiry::is_near_expiry(&tokens.access_token, Utc::now().timestamp_millis()) {
        debug!("token already renewed, skipping refresh call");
        return Ok(());
    }
    let Some(refresh_token) = tokens.refresh_token else {
        return Ok(());
    };

    debug!("refreshing access token");
    match request_refresh(&http, &url, &refresh_token).await {
        Ok(pair) => {
            // The store write lands before the in-flight slot is released.
            session.set_tokens(pair).await;
            debug!("access token refreshed");
            Ok(())
        }
        Err(err) => {
            warn!(error = %err, "token refresh call failed");
            Err(Arc::new(err))
        }
    }
}

async fn request_refresh(
    http: &reqwest::Client,
    url: &str,
    refresh_token: &str,
) -> Result<AuthTokens, ApiError> {
    let body = serde_json::json!({ "refreshToken": refresh_token });
    let response = http.post(url).json(&body).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::from_status(status, &body));
    }

    response
        .json::<AuthTokens>()
        .await
        .map_err(|err| ApiError::InvalidResponse(format!("refresh response: {}", err)))
}
