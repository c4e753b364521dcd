//! Client for the hosted identity service.
//!
//! This module provides:
//! - `AuthClient`: password sign-in, refresh-token exchange, and logout
//!   against the service's REST auth endpoints
//! - `ApiError`: the error taxonomy for those calls
//!
//! `AuthClient` also implements `IdentityProvider`, so the session monitor
//! can supervise the session it holds.

pub mod client;
pub mod error;

pub use client::{AuthClient, AuthSession, AuthUser};
pub use error::ApiError;
