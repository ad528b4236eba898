//! Session arbitration and live presence.

pub mod service;

pub use service::{AcquireOutcome, SessionError, SessionHandle, SessionLease, SessionService};
