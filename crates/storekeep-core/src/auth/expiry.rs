//! Access-token expiry inspection.
//!
//! The access token is a JWT whose payload may carry an `exp` claim (seconds
//! since epoch). Decoding is deliberately narrow: only `exp` is read, and a
//! token that cannot be decoded is treated as non-expiring so a corrupt token
//! never blocks the request path. The server rejects it with a 401 instead.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

/// Refresh when the access token has less than this long left to live.
const REFRESH_WINDOW_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Extract the expiry instant from an access token, in milliseconds since
/// epoch. Returns `None` for malformed tokens and tokens without `exp`.
pub fn token_expiry_ms(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: Claims = serde_json::from_slice(&decoded).ok()?;
    claims.exp.map(|exp| exp * 1000)
}

/// Whether the token expires within the refresh window, measured against
/// `now_ms`. Undecodable tokens and tokens without `exp` are never near
/// expiry.
pub fn is_near_expiry(token: &str, now_ms: i64) -> bool {
    match token_expiry_ms(token) {
        Some(exp_ms) => exp_ms - now_ms < REFRESH_WINDOW_MS,
        None => false,
    }
}
