//! Authenticated API client.
//!
//! `ApiClient` owns the request path described in the auth module: before a
//! request leaves the process it reads the session store, waits for the
//! refresh coordinator, re-reads the store, and attaches the bearer token.
//! Requests issued without a signed-in session go out unauthenticated.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::refresh::RefreshCoordinator;
use crate::auth::session::{AuthTokens, SessionStore};
use crate::config::Config;
use crate::models::{
    ApiUser, Category, CategoryUpdate, NewCategory, NewProduct, NewUser, Product, ProductUpdate,
    UserUpdate,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds, applied to every request including the
/// token refresh call.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum number of retries for rate-limited (429) requests. Never applies
/// to the refresh call, which goes out at most once per stale window.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting, doubled per retry.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the storekeep catalog backend.
/// Clone is cheap - the connection pool, session store, and refresh
/// coordinator are all shared, so the single-flight guarantee spans clones.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<SessionStore>,
    refresh: RefreshCoordinator,
}

impl ApiClient {
    /// Create a client against the configured base URL, backed by the given
    /// session store.
    pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .default_headers(headers)
            .build()?;

        let base_url = config.api_base_url.trim_end_matches('/').to_string();
        let refresh = RefreshCoordinator::new(client.clone(), &base_url, Arc::clone(&session));

        Ok(Self {
            client,
            base_url,
            session,
            refresh,
        })
    }

    /// The session store backing this client.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    // ========================================================================
    // Request path
    // ========================================================================

    /// Attach a bearer token to an outgoing request.
    ///
    /// Requests without a signed-in session are forwarded unmodified. A
    /// failed refresh is not fatal here: the stale token is attached anyway
    /// and the server's 401 comes back to the caller.
    async fn authenticate(&self, request: RequestBuilder) -> RequestBuilder {
        if self.session.access_token().await.is_none() {
            return request;
        }

        if let Err(err) = self.refresh.ensure_fresh().await {
            warn!(error = %err, "token refresh failed, proceeding with stale token");
        }

        // Re-read after the await: the refresh flight stores the renewed
        // pair before it resolves.
        match self.session.access_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send an authenticated request, retrying on 429 with exponential
    /// backoff, and parse the JSON response.
    async fn send<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }
            let request = self.authenticate(request).await;
            let response = request.send().await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(url = %url, retry = retries, backoff_ms, "rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }

            let response = Self::check_response(response).await?;
            return response
                .json()
                .await
                .map_err(|err| ApiError::InvalidResponse(format!("{}: {}", url, err)));
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<T, serde_json::Value>(Method::GET, path, None)
            .await
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::PUT, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        // The API answers deletes with a bare boolean.
        let _: bool = self
            .send::<bool, serde_json::Value>(Method::DELETE, path, None)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Sign in with email and password, populating the session store with
    /// the credential pair and the account profile.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<ApiUser, ApiError> {
        let url = format!("{}/auth/login", self.base_url);
        let body = serde_json::json!({ "email": email, "password": password });

        // The login request itself is unauthenticated.
        let response = self.client.post(&url).json(&body).send().await?;
        let response = Self::check_response(response).await?;
        let tokens: AuthTokens = response
            .json()
            .await
            .map_err(|err| ApiError::InvalidResponse(format!("login response: {}", err)))?;

        self.session.set_tokens(tokens).await;
        debug!(email, "signed in, fetching profile");

        // The profile fetch rides the fresh token through the normal
        // authenticated path.
        let user = self.profile().await?;
        self.session.set_user(Some(user.clone())).await;
        Ok(user)
    }

    /// Fetch the profile of the signed-in account.
    pub async fn profile(&self) -> Result<ApiUser, ApiError> {
        self.get("/auth/profile").await
    }

    /// Sign out locally. The API keeps no server-side session to invalidate.
    pub async fn sign_out(&self) {
        self.session.clear().await;
    }

    // ========================================================================
    // Products
    // ========================================================================

    pub async fn fetch_products(&self) -> Result<Vec<Product>, ApiError> {
        self.get("/products").await
    }

    pub async fn fetch_product(&self, id: i64) -> Result<Product, ApiError> {
        self.get(&format!("/products/{}", id)).await
    }

    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, ApiError> {
        self.post("/products", product).await
    }

    pub async fn update_product(
        &self,
        id: i64,
        update: &ProductUpdate,
    ) -> Result<Product, ApiError> {
        self.put(&format!("/products/{}", id), update).await
    }

    pub async fn delete_product(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/products/{}", id)).await
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn fetch_users(&self) -> Result<Vec<ApiUser>, ApiError> {
        self.get("/users").await
    }

    pub async fn fetch_user(&self, id: i64) -> Result<ApiUser, ApiError> {
        self.get(&format!("/users/{}", id)).await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<ApiUser, ApiError> {
        self.post("/users", user).await
    }

    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<ApiUser, ApiError> {
        self.put(&format!("/users/{}", id), update).await
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/users/{}", id)).await
    }

    // ========================================================================
    // Categories
    // ========================================================================

    pub async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.get("/categories").await
    }

    pub async fn fetch_category(&self, id: i64) -> Result<Category, ApiError> {
        self.get(&format!("/categories/{}", id)).await
    }

    pub async fn create_category(&self, category: &NewCategory) -> Result<Category, ApiError> {
        self.post("/categories", category).await
    }

    pub async fn update_category(
        &self,
        id: i64,
        update: &CategoryUpdate,
    ) -> Result<Category, ApiError> {
        self.put(&format!("/categories/{}", id), update).await
    }

    pub async fn delete_category(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/categories/{}", id)).await
    }
}
