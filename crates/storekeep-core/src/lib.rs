//! Core library for storekeep, an admin client for a commerce-catalog API.
//!
//! The centerpiece is the authenticated HTTP client: every outgoing request
//! consults the session store, renews a near-expiry access token through a
//! single-flight refresh coordinator, and attaches the bearer header. Around
//! it sit the session persistence layer, the typed catalog endpoints, and a
//! small disk cache for listings.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthTokens, FileSessionStorage, SessionData, SessionStorage, SessionStore};
pub use config::Config;
