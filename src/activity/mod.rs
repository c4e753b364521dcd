//! User activity and remember-me bookkeeping.
//!
//! Persists the last-interaction timestamp and the remember-me choice across
//! reloads, and derives the inactivity timeout the session monitor enforces.

pub mod store;

pub use store::{
    ActivityStore, RememberMe, SessionActivityInfo, INACTIVITY_DEFAULT_MINUTES,
    INACTIVITY_REMEMBERED_MINUTES,
};
