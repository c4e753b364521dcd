//! Sign-in and sign-out orchestration.
//!
//! Wraps the identity client with the local policy around it: lockout checks
//! before an attempt, attempt bookkeeping after a failure, and preference
//! persistence on success and explicit sign-out.

pub mod flow;

pub use flow::{Authenticator, SignInError};
