//! REST API access for the dashboard backend.
//!
//! The API uses JWT bearer tokens obtained from the login endpoint and
//! renewed through the refresh endpoint.

pub mod client;
pub mod error;
pub mod request;

pub use client::{AuthApi, Validation};
pub use error::ApiError;
pub use request::AuthenticatedRequest;
