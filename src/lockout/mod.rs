//! Failed sign-in throttling.
//!
//! Tracks failed attempts per identifier (email and, best-effort, client IP)
//! over a sliding window and locks an identifier out after too many recent
//! failures. Records persist across reloads so a page refresh does not reset
//! the counter.

pub mod tracker;

pub use tracker::{
    AttemptContext, AttemptTracker, FailedAttempt, LockoutStatus, ATTEMPT_WINDOW_MINUTES,
    LOCKOUT_MINUTES, MAX_ATTEMPTS,
};
