//! Authentication: session state, token expiry, single-flight refresh, and
//! credential storage.
//!
//! The pieces compose as follows: the session store holds the credential
//! pair, the expiry module decides when the access token needs renewal, and
//! the refresh coordinator guarantees that renewal happens at most once per
//! stale window no matter how many requests observe staleness concurrently.

pub mod credentials;
pub mod expiry;
pub mod refresh;
pub mod session;

pub use credentials::CredentialStore;
pub use refresh::RefreshCoordinator;
pub use session::{
    AuthTokens, FileSessionStorage, MemorySessionStorage, SessionData, SessionStorage,
    SessionStore,
};
