//! Session supervision.
//!
//! This module provides:
//! - `IdentityProvider`: the contract the identity service must satisfy
//! - `SessionSnapshot`: the per-check derived view of the current session
//! - `SessionMonitor`: the periodic supervisor that warns, auto-refreshes,
//!   or forces sign-out
//!
//! The monitor owns no persisted state; it reads the identity service and
//! the activity store fresh on every tick.

pub mod monitor;
pub mod provider;
pub mod snapshot;

pub use monitor::{
    MonitorHandle, SessionEvent, SessionMonitor, SignOutReason, CHECK_INTERVAL_SECS,
};
pub use provider::{IdentityProvider, SessionInfo};
pub use snapshot::{SessionSnapshot, AUTO_REFRESH_THRESHOLD_MINUTES, WARNING_THRESHOLD_MINUTES};
