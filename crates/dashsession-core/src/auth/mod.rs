//! Session management for the dashboard client.
//!
//! This module provides:
//! - `SessionManager`: token validation, refresh, logout and authenticated calls
//! - `SessionStore`: the two persistent token slots (`MemoryStore`, `FileStore`)
//! - `EventBus`: `authChanged` notifications for route guards and other listeners

pub mod events;
pub mod manager;
pub mod store;
pub mod tokens;

pub use events::{EventBus, SessionEvent, Subscription, AUTH_CHANGED};
pub use manager::{SessionManager, SessionState};
pub use store::{FileStore, MemoryStore, SessionStore, StoreError};
pub use tokens::{TokenPair, TokenSlot};
