//! Session lifecycle core for the Plateful admin console.
//!
//! The hosted identity service owns session issuance; this crate supplies
//! the client-side policy around it:
//!
//! - `lockout`: failed sign-in throttling over a sliding window
//! - `activity`: remember-me preference and last-activity bookkeeping
//! - `session`: the periodic monitor that warns, auto-refreshes, or forces
//!   sign-out
//! - `api`: the identity service client
//! - `auth`: sign-in/sign-out orchestration over all of the above
//! - `storage`: the durable key-value layer behind the stores

pub mod activity;
pub mod api;
pub mod auth;
pub mod config;
pub mod lockout;
pub mod session;
pub mod storage;
pub mod utils;

pub use activity::{ActivityStore, RememberMe};
pub use api::{ApiError, AuthClient, AuthSession};
pub use auth::{Authenticator, SignInError};
pub use config::Config;
pub use lockout::{AttemptTracker, LockoutStatus};
pub use session::{
    IdentityProvider, MonitorHandle, SessionEvent, SessionInfo, SessionMonitor, SessionSnapshot,
    SignOutReason,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
