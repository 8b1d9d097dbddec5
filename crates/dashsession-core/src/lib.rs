//! dashsession-core - session/token lifecycle for the admin dashboard client.
//!
//! The [`SessionManager`] keeps an access/refresh token pair in a
//! [`SessionStore`], validates the access token on demand, refreshes it when
//! the server rejects it, and ends the session (broadcasting a logout on the
//! [`EventBus`]) when that is impossible. Pages issue requests through
//! [`SessionManager::authenticated_call`] instead of talking to the HTTP
//! client directly.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;

pub use api::{ApiError, AuthApi, AuthenticatedRequest};
pub use auth::{
    EventBus, FileStore, MemoryStore, SessionEvent, SessionManager, SessionState, SessionStore,
    Subscription, TokenPair, TokenSlot,
};
pub use config::Config;
pub use error::{SessionError, SessionResult};
